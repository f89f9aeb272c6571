//! Typed repositories over the six collections.

pub mod queries;

use crate::models::{AppliedInstructor, CartItem, Class, EnrollmentRecord, PaymentRecord, User};
use crate::store::{DocumentStore, Filter, MemoryStore, Pipeline, Query, StoreError, Update, UpdateSummary};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::bson::{from_document, to_document, Bson, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

pub const USERS: &str = "users";
pub const CLASSES: &str = "classes";
pub const CART: &str = "cart";
pub const PAYMENTS: &str = "payments";
pub const ENROLLED: &str = "enrolled";
pub const APPLIED: &str = "applied";

/// Field sets that identify at most one document, enforced by every backend.
pub const UNIQUE_KEYS: &[(&str, &[&str])] = &[(USERS, &["email"]), (CART, &["userMail", "classId"])];

/// In-memory store carrying the same unique keys as the MongoDB indexes.
pub fn memory_store() -> MemoryStore {
    UNIQUE_KEYS
        .iter()
        .fold(MemoryStore::new(), |store, (collection, fields)| store.with_unique_key(collection, fields))
}

/// One collection, decoded into `T` on the way out.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection,
            _model: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(store: Arc<dyn DocumentStore>, collection: &'static str) -> Self {
        Self { store, collection, _model: PhantomData }
    }

    pub async fn insert(&self, model: &T) -> Result<Bson, StoreError> {
        self.store.insert_one(self.collection, to_document(model)?).await
    }

    pub async fn find_one(&self, filter: Filter) -> Result<Option<T>, StoreError> {
        match self.store.find_one(self.collection, filter).await? {
            Some(document) => Ok(Some(from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Lazily decoded results.
    pub async fn find_many(&self, query: impl Into<Query>) -> Result<BoxStream<'static, Result<T, StoreError>>, StoreError> {
        let stream = self.store.find_many(self.collection, query.into()).await?;
        Ok(stream
            .and_then(|document| async move { from_document::<T>(document).map_err(StoreError::from) })
            .boxed())
    }

    pub async fn collect(&self, query: impl Into<Query>) -> Result<Vec<T>, StoreError> {
        self.find_many(query).await?.try_collect().await
    }

    pub async fn update_one(&self, filter: Filter, update: Update, upsert: bool) -> Result<UpdateSummary, StoreError> {
        self.store.update_one(self.collection, filter, update, upsert).await
    }

    pub async fn delete_one(&self, filter: Filter) -> Result<u64, StoreError> {
        self.store.delete_one(self.collection, filter).await
    }

    pub async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
        self.store.count(self.collection, filter).await
    }

    /// Aggregation output is shaped by the pipeline, so it stays untyped.
    pub async fn aggregate(&self, pipeline: Pipeline) -> Result<Vec<Document>, StoreError> {
        self.store.aggregate(self.collection, pipeline).await?.try_collect().await
    }
}

/// One repository per collection, all sharing the same store handle.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn DocumentStore>,
    pub users: Repository<User>,
    pub classes: Repository<Class>,
    pub cart: Repository<CartItem>,
    pub payments: Repository<PaymentRecord>,
    pub enrolled: Repository<EnrollmentRecord>,
    pub applied: Repository<AppliedInstructor>,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: Repository::new(Arc::clone(&store), USERS),
            classes: Repository::new(Arc::clone(&store), CLASSES),
            cart: Repository::new(Arc::clone(&store), CART),
            payments: Repository::new(Arc::clone(&store), PAYMENTS),
            enrolled: Repository::new(Arc::clone(&store), ENROLLED),
            applied: Repository::new(Arc::clone(&store), APPLIED),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.users.find_one(Filter::eq("email", email)).await
    }
}
