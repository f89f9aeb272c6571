use super::{DocumentStore, Filter, Query, StoreError, Update};
use futures::stream::TryStreamExt;
use mongodb::bson::{oid::ObjectId, Bson, Document};

/// One write inside a `WriteBatch`.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    InsertOne { collection: String, document: Document },
    /// With `require_match`, matching no document aborts the whole batch with
    /// `StoreError::PreconditionFailed`.
    UpdateOne { collection: String, filter: Filter, update: Update, require_match: bool },
    DeleteMany { collection: String, filter: Filter },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpResult {
    Inserted(Bson),
    Updated { matched: u64, modified: u64 },
    Deleted(u64),
}

/// Ordered group of writes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `document`, assigning an `_id` up front so the insert can be
    /// undone by id.
    pub fn insert(mut self, collection: &str, mut document: Document) -> Self {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        self.ops.push(WriteOp::InsertOne { collection: collection.to_string(), document });
        self
    }

    pub fn update_one_required(mut self, collection: &str, filter: Filter, update: Update) -> Self {
        self.ops.push(WriteOp::UpdateOne {
            collection: collection.to_string(),
            filter,
            update,
            require_match: true,
        });
        self
    }

    pub fn delete_many(mut self, collection: &str, filter: Filter) -> Self {
        self.ops.push(WriteOp::DeleteMany { collection: collection.to_string(), filter });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Undo action recorded after a batch operation has been applied.
enum Compensation {
    DeleteById { collection: String, id: Bson },
    Restore { collection: String, id: Bson, update: Update },
    Reinsert { collection: String, documents: Vec<Document> },
}

/// Applies the batch step by step against a store without transactions.
///
/// Each applied step records its inverse; on the first failure the recorded
/// inverses run in reverse order and the original error is returned.
pub async fn apply_with_compensation<S>(store: &S, batch: WriteBatch) -> Result<Vec<OpResult>, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let mut results = Vec::with_capacity(batch.len());
    let mut undo: Vec<Compensation> = Vec::with_capacity(batch.len());

    for (index, op) in batch.into_ops().into_iter().enumerate() {
        match apply_step(store, index, op).await {
            Ok((result, compensation)) => {
                results.push(result);
                undo.extend(compensation);
            }
            Err(e) => {
                log::warn!("⚠️  Batch step {} failed ({}), compensating {} step(s)", index, e, undo.len());
                compensate(store, undo).await;
                return Err(e);
            }
        }
    }

    Ok(results)
}

async fn apply_step<S>(store: &S, index: usize, op: WriteOp) -> Result<(OpResult, Option<Compensation>), StoreError>
where
    S: DocumentStore + ?Sized,
{
    match op {
        WriteOp::InsertOne { collection, document } => {
            let id = store.insert_one(&collection, document).await?;
            Ok((OpResult::Inserted(id.clone()), Some(Compensation::DeleteById { collection, id })))
        }
        WriteOp::UpdateOne { collection, filter, update, require_match } => {
            let before = store.find_one(&collection, filter.clone()).await?;
            let Some(before) = before else {
                if require_match {
                    return Err(StoreError::PreconditionFailed { index });
                }
                return Ok((OpResult::Updated { matched: 0, modified: 0 }, None));
            };
            let id = before.get("_id").cloned().unwrap_or(Bson::Null);

            // Re-check the original filter on the write itself so a concurrent
            // writer that invalidated it makes this step fail.
            let guarded = filter.and(Filter::Eq("_id".to_string(), id.clone()));
            let summary = store.update_one(&collection, guarded, update.clone(), false).await?;
            if summary.matched_count == 0 {
                if require_match {
                    return Err(StoreError::PreconditionFailed { index });
                }
                return Ok((OpResult::Updated { matched: 0, modified: 0 }, None));
            }

            let restore = update.inverse(&before);
            Ok((
                OpResult::Updated { matched: summary.matched_count, modified: summary.modified_count },
                Some(Compensation::Restore { collection, id, update: restore }),
            ))
        }
        WriteOp::DeleteMany { collection, filter } => {
            let documents: Vec<Document> = store
                .find_many(&collection, Query::new(filter))
                .await?
                .try_collect()
                .await?;
            if documents.is_empty() {
                return Ok((OpResult::Deleted(0), None));
            }
            let ids: Vec<Bson> = documents.iter().filter_map(|d| d.get("_id").cloned()).collect();
            let deleted = store.delete_many(&collection, Filter::In("_id".to_string(), ids)).await?;
            Ok((OpResult::Deleted(deleted), Some(Compensation::Reinsert { collection, documents })))
        }
    }
}

async fn compensate<S>(store: &S, undo: Vec<Compensation>)
where
    S: DocumentStore + ?Sized,
{
    for step in undo.into_iter().rev() {
        let outcome = match step {
            Compensation::DeleteById { collection, id } => store
                .delete_one(&collection, Filter::Eq("_id".to_string(), id))
                .await
                .map(|_| ()),
            Compensation::Restore { collection, id, update } => store
                .update_one(&collection, Filter::Eq("_id".to_string(), id), update, false)
                .await
                .map(|_| ()),
            Compensation::Reinsert { collection, documents } => {
                let mut outcome = Ok(());
                for document in documents {
                    if let Err(e) = store.insert_one(&collection, document).await {
                        outcome = Err(e);
                    }
                }
                outcome
            }
        };
        if let Err(e) = outcome {
            log::error!("❌ Compensation step failed, manual repair may be needed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStream, MemoryStore, Pipeline, UpdateSummary};
    use async_trait::async_trait;
    use mongodb::bson::doc;

    /// Delegates to a `MemoryStore` but fails inserts into one collection and
    /// never overrides `apply_atomically`, so the compensation path runs.
    struct FailingInserts {
        inner: MemoryStore,
        fail_collection: &'static str,
    }

    #[async_trait]
    impl DocumentStore for FailingInserts {
        async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
            if collection == self.fail_collection {
                return Err(StoreError::Unavailable("simulated timeout".into()));
            }
            self.inner.insert_one(collection, document).await
        }
        async fn find_one(&self, c: &str, f: Filter) -> Result<Option<Document>, StoreError> {
            self.inner.find_one(c, f).await
        }
        async fn find_many(&self, c: &str, q: Query) -> Result<DocumentStream, StoreError> {
            self.inner.find_many(c, q).await
        }
        async fn update_one(&self, c: &str, f: Filter, u: Update, upsert: bool) -> Result<UpdateSummary, StoreError> {
            self.inner.update_one(c, f, u, upsert).await
        }
        async fn update_many(&self, c: &str, f: Filter, u: Update, upsert: bool) -> Result<UpdateSummary, StoreError> {
            self.inner.update_many(c, f, u, upsert).await
        }
        async fn delete_one(&self, c: &str, f: Filter) -> Result<u64, StoreError> {
            self.inner.delete_one(c, f).await
        }
        async fn delete_many(&self, c: &str, f: Filter) -> Result<u64, StoreError> {
            self.inner.delete_many(c, f).await
        }
        async fn count(&self, c: &str, f: Filter) -> Result<u64, StoreError> {
            self.inner.count(c, f).await
        }
        async fn aggregate(&self, c: &str, p: Pipeline) -> Result<DocumentStream, StoreError> {
            self.inner.aggregate(c, p).await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_compensates_applied_steps() {
        let inner = MemoryStore::new();
        let class_id = ObjectId::new();
        inner
            .insert_one("classes", doc! { "_id": class_id, "availableSeats": 5_i64, "totalEnrolled": 10_i64 })
            .await
            .unwrap();
        inner.insert_one("cart", doc! { "classId": class_id.to_hex(), "userMail": "u@yoga.io" }).await.unwrap();
        let store = FailingInserts { inner, fail_collection: "payments" };

        let batch = WriteBatch::new()
            .update_one_required(
                "classes",
                Filter::eq("_id", class_id).and(Filter::gt("availableSeats", 0)),
                Update::new().inc("availableSeats", -1).inc("totalEnrolled", 1),
            )
            .insert("enrolled", doc! { "userEmail": "u@yoga.io" })
            .delete_many("cart", Filter::eq("userMail", "u@yoga.io"))
            .insert("payments", doc! { "userEmail": "u@yoga.io" });

        let err = store.apply_atomically(batch).await.unwrap_err();
        assert!(err.is_retryable());

        let class = store.find_one("classes", Filter::eq("_id", class_id)).await.unwrap().unwrap();
        assert_eq!(class.get_i64("availableSeats").unwrap(), 5);
        assert_eq!(class.get_i64("totalEnrolled").unwrap(), 10);
        assert_eq!(store.count("enrolled", Filter::all()).await.unwrap(), 0);
        assert_eq!(store.count("cart", Filter::all()).await.unwrap(), 1);
        assert_eq!(store.count("payments", Filter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_required_update_without_match_fails_first() {
        let store = FailingInserts { inner: MemoryStore::new(), fail_collection: "none" };
        let batch = WriteBatch::new()
            .insert("enrolled", doc! { "userEmail": "u@yoga.io" })
            .update_one_required("classes", Filter::eq("_id", ObjectId::new()), Update::new().inc("totalEnrolled", 1));

        let err = store.apply_atomically(batch).await.unwrap_err();
        assert_eq!(err, StoreError::PreconditionFailed { index: 1 });
        assert_eq!(store.count("enrolled", Filter::all()).await.unwrap(), 0);
    }
}
