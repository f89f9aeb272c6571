//! Document store port.
//!
//! Handlers and services talk to collections through `DocumentStore`, which is
//! implemented by the MongoDB adapter (`crate::database::MongoDB`) and by
//! `MemoryStore`. Every method is an independent round-trip; only
//! `apply_atomically` spans several documents.

pub mod batch;
pub mod filter;
pub mod memory;
pub mod pipeline;
pub mod update;
pub mod value;

pub use batch::{OpResult, WriteBatch, WriteOp};
pub use filter::Filter;
pub use memory::MemoryStore;
pub use pipeline::{Pipeline, Projection, SortOrder};
pub use update::Update;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mongodb::bson::{Bson, Document};

pub type DocumentStream = BoxStream<'static, Result<Document, StoreError>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or timed out; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A conditional write inside a batch matched no document.
    #[error("precondition failed at batch operation {index}")]
    PreconditionFailed { index: usize },
    /// An insert collided with a unique key.
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("document encoding error: {0}")]
    Serialization(String),
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(e: mongodb::bson::de::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Filter plus optional sort and limit for `find_many`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub sort: Option<(String, SortOrder)>,
    pub limit: Option<i64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self { filter, sort: None, limit: None }
    }

    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Query::new(filter)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted: bool,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError>;

    async fn find_one(&self, collection: &str, filter: Filter) -> Result<Option<Document>, StoreError>;

    async fn find_many(&self, collection: &str, query: Query) -> Result<DocumentStream, StoreError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Filter,
        update: Update,
        upsert: bool,
    ) -> Result<UpdateSummary, StoreError>;

    async fn update_many(
        &self,
        collection: &str,
        filter: Filter,
        update: Update,
        upsert: bool,
    ) -> Result<UpdateSummary, StoreError>;

    async fn delete_one(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;

    async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;

    async fn aggregate(&self, collection: &str, pipeline: Pipeline) -> Result<DocumentStream, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Applies every operation or none of them.
    ///
    /// The default runs the operations in order and compensates the applied
    /// prefix when one fails.
    async fn apply_atomically(&self, batch: WriteBatch) -> Result<Vec<OpResult>, StoreError> {
        batch::apply_with_compensation(self, batch).await
    }

    async fn shutdown(&self) {}
}
