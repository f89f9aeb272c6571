// In-process document store.
//
// Backs `STORE_BACKEND=memory` for local runs and every test in the crate.
// Each operation runs under one lock, and `apply_atomically` applies a batch
// to a snapshot that only replaces the live state when every step succeeds.
// Unique keys registered with `with_unique_key` are checked on every insert,
// including upserts and batch inserts, the way a unique index would be.

use super::batch::{OpResult, WriteBatch, WriteOp};
use super::value::sort_order;
use super::{DocumentStore, DocumentStream, Filter, Pipeline, Query, SortOrder, StoreError, Update, UpdateSummary};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

type Collections = HashMap<String, Vec<Document>>;

/// Collection and the fields that must be unique together within it.
type UniqueKey = (String, Vec<String>);

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    unique_keys: Vec<UniqueKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique_key(mut self, collection: &str, fields: &[&str]) -> Self {
        self.unique_keys
            .push((collection.to_string(), fields.iter().map(|f| f.to_string()).collect()));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        // A panic while holding the lock cannot leave a half-applied batch
        // behind (batches swap in a finished snapshot), so poisoning is ignored.
        self.collections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Missing fields count as null, as they do in a unique index.
fn key_values(document: &Document, fields: &[String]) -> Vec<Bson> {
    fields
        .iter()
        .map(|field| document.get(field).cloned().unwrap_or(Bson::Null))
        .collect()
}

fn check_unique(collections: &Collections, keys: &[UniqueKey], name: &str, document: &Document) -> Result<(), StoreError> {
    let Some(existing) = collections.get(name) else {
        return Ok(());
    };
    for (_, fields) in keys.iter().filter(|(collection, _)| collection == name) {
        let candidate = key_values(document, fields);
        if existing.iter().any(|d| key_values(d, fields) == candidate) {
            return Err(StoreError::Duplicate(format!("{}({})", name, fields.join(", "))));
        }
    }
    Ok(())
}

fn insert(collections: &mut Collections, keys: &[UniqueKey], name: &str, mut document: Document) -> Result<Bson, StoreError> {
    check_unique(collections, keys, name, &document)?;
    let id = match document.get("_id") {
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            document.insert("_id", id.clone());
            id
        }
    };
    collections.entry(name.to_string()).or_default().push(document);
    Ok(id)
}

fn find(collections: &Collections, name: &str, query: &Query) -> Vec<Document> {
    let mut found: Vec<Document> = collections
        .get(name)
        .map(|docs| docs.iter().filter(|d| query.filter.matches(d)).cloned().collect())
        .unwrap_or_default();
    if let Some((field, order)) = &query.sort {
        found.sort_by(|a, b| {
            let ordering = sort_order(a.get(field), b.get(field));
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }
    if let Some(limit) = query.limit {
        found.truncate(limit.max(0) as usize);
    }
    found
}

fn update(
    collections: &mut Collections,
    keys: &[UniqueKey],
    name: &str,
    filter: &Filter,
    update: &Update,
    upsert: bool,
    many: bool,
) -> Result<UpdateSummary, StoreError> {
    let docs = collections.entry(name.to_string()).or_default();
    let mut summary = UpdateSummary::default();
    for document in docs.iter_mut().filter(|d| filter.matches(d)) {
        summary.matched_count += 1;
        let before = document.clone();
        update.apply(document);
        if *document != before {
            summary.modified_count += 1;
        }
        if !many {
            break;
        }
    }
    if summary.matched_count == 0 && upsert {
        let mut seeded = Document::new();
        for (field, value) in filter.equality_fields() {
            seeded.insert(field, value);
        }
        update.apply(&mut seeded);
        insert(collections, keys, name, seeded)?;
        summary.upserted = true;
    }
    Ok(summary)
}

fn delete(collections: &mut Collections, name: &str, filter: &Filter, many: bool) -> u64 {
    let Some(docs) = collections.get_mut(name) else {
        return 0;
    };
    if many {
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        (before - docs.len()) as u64
    } else {
        match docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                docs.remove(index);
                1
            }
            None => 0,
        }
    }
}

fn into_stream(docs: Vec<Document>) -> DocumentStream {
    stream::iter(docs.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        insert(&mut self.lock(), &self.unique_keys, collection, document)
    }

    async fn find_one(&self, collection: &str, filter: Filter) -> Result<Option<Document>, StoreError> {
        let query = Query::new(filter).limit(1);
        Ok(find(&self.lock(), collection, &query).into_iter().next())
    }

    async fn find_many(&self, collection: &str, query: Query) -> Result<DocumentStream, StoreError> {
        Ok(into_stream(find(&self.lock(), collection, &query)))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Filter,
        change: Update,
        upsert: bool,
    ) -> Result<UpdateSummary, StoreError> {
        update(&mut self.lock(), &self.unique_keys, collection, &filter, &change, upsert, false)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Filter,
        change: Update,
        upsert: bool,
    ) -> Result<UpdateSummary, StoreError> {
        update(&mut self.lock(), &self.unique_keys, collection, &filter, &change, upsert, true)
    }

    async fn delete_one(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        Ok(delete(&mut self.lock(), collection, &filter, false))
    }

    async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        Ok(delete(&mut self.lock(), collection, &filter, true))
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        let guard = self.lock();
        let count = guard
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn aggregate(&self, collection: &str, pipeline: Pipeline) -> Result<DocumentStream, StoreError> {
        let guard = self.lock();
        let input = guard.get(collection).cloned().unwrap_or_default();
        Ok(into_stream(pipeline.evaluate(input, &guard)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn apply_atomically(&self, batch: WriteBatch) -> Result<Vec<OpResult>, StoreError> {
        let mut guard = self.lock();
        let mut snapshot = guard.clone();
        let mut results = Vec::with_capacity(batch.len());

        for (index, op) in batch.into_ops().into_iter().enumerate() {
            let result = match op {
                WriteOp::InsertOne { collection, document } => {
                    OpResult::Inserted(insert(&mut snapshot, &self.unique_keys, &collection, document)?)
                }
                WriteOp::UpdateOne { collection, filter, update: change, require_match } => {
                    let summary = update(&mut snapshot, &self.unique_keys, &collection, &filter, &change, false, false)?;
                    if require_match && summary.matched_count == 0 {
                        return Err(StoreError::PreconditionFailed { index });
                    }
                    OpResult::Updated { matched: summary.matched_count, modified: summary.modified_count }
                }
                WriteOp::DeleteMany { collection, filter } => {
                    OpResult::Deleted(delete(&mut snapshot, &collection, &filter, true))
                }
            };
            results.push(result);
        }

        *guard = snapshot;
        Ok(results)
    }
}
