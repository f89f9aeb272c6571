use crate::store::{
    batch, DocumentStore, DocumentStream, Filter, OpResult, Pipeline, Query, StoreError, Update,
    UpdateSummary, WriteBatch, WriteOp,
};
use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use crate::catalog::UNIQUE_KEYS;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use std::time::Duration;

const DUPLICATE_KEY: i32 = 11000;

/// Attempts for a whole transaction, and separately for its commit.
const MAX_TRANSACTION_ATTEMPTS: usize = 3;

/// MongoDB adapter for the document store port.
#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
    transactions: bool,
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        classify(&e, |label| e.contains_label(label))
    }
}

/// Maps a driver error given its labels. Transient and unknown-commit labels
/// are only left on an error once the transaction retries are spent.
fn classify(e: &mongodb::error::Error, labelled: impl Fn(&str) -> bool) -> StoreError {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            StoreError::Duplicate(write.message.clone())
        }
        ErrorKind::Command(command) if command.code == DUPLICATE_KEY => StoreError::Duplicate(command.message.clone()),
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Unavailable(e.to_string())
        }
        _ if labelled(TRANSIENT_TRANSACTION_ERROR) || labelled(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

/// Replica set members report `setName` and mongos reports `msg: isdbgrid`;
/// a standalone server reports neither and cannot run transactions.
fn supports_transactions(hello: &Document) -> bool {
    hello.contains_key("setName") || hello.get_str("msg").map(|msg| msg == "isdbgrid").unwrap_or(false)
}

/// Why one transaction attempt stopped. Driver errors keep their labels so the
/// retry loop can inspect them.
enum TransactionFailure {
    Store(StoreError),
    Driver(mongodb::error::Error),
}

impl From<mongodb::error::Error> for TransactionFailure {
    fn from(e: mongodb::error::Error) -> Self {
        TransactionFailure::Driver(e)
    }
}

impl From<TransactionFailure> for StoreError {
    fn from(failure: TransactionFailure) -> Self {
        match failure {
            TransactionFailure::Store(e) => e,
            TransactionFailure::Driver(e) => e.into(),
        }
    }
}

impl MongoDB {
    /// Connects, verifies the deployment answers a ping and creates indexes.
    pub async fn connect(uri: &str, db_name: &str, transactions: bool) -> Result<Self, StoreError> {
        let mut client_options = ClientOptions::parse(uri).await?;

        client_options.app_name = Some("yoga-master-service".to_string());
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(Duration::from_secs(300));
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);

        let hello = db.run_command(doc! { "hello": 1 }).await?;
        log::info!("✅ Pinged MongoDB deployment, database: {}", db_name);

        let transactions = if transactions && !supports_transactions(&hello) {
            log::warn!("⚠️  Standalone MongoDB server has no transactions, batches will use compensation");
            false
        } else {
            transactions
        };

        let mongodb = Self { client, db, transactions };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        log::info!("🔧 Creating database indexes...");

        for (collection, fields) in UNIQUE_KEYS {
            let keys: Document = fields.iter().map(|field| (field.to_string(), Bson::Int32(1))).collect();
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            let name = format!("{}({})", collection, fields.join(", "));
            match self.collection(collection).create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {} unique", name),
                Err(e) => log::warn!("   ⚠️  Could not create {} unique index: {}", name, e),
            }
        }

        let plain = [
            ("classes", "instructorEmail"),
            ("classes", "status"),
            ("payments", "userEmail"),
            ("enrolled", "userEmail"),
            ("applied", "email"),
        ];
        for (collection, field) in plain {
            let index = IndexModel::builder().keys(doc! { field: 1 }).build();
            match self.collection(collection).create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {}({})", collection, field),
                Err(e) => log::debug!("   ℹ️  Index {}({}) not created: {}", collection, field, e),
            }
        }

        log::info!("✅ Database indexes ready");
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    /// Runs the batch in a transaction, retrying it from the start while the
    /// server labels the failure transient. A retried seat update that no
    /// longer matches fails its precondition like any other sold-out class.
    async fn apply_in_transaction(&self, batch: WriteBatch) -> Result<Vec<OpResult>, StoreError> {
        let mut session = self.client.start_session().await?;

        let mut attempt = 1;
        loop {
            match self.run_transaction(&mut session, batch.clone()).await {
                Ok(results) => return Ok(results),
                Err(TransactionFailure::Driver(e))
                    if e.contains_label(TRANSIENT_TRANSACTION_ERROR) && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    log::warn!("⚠️  Transient transaction error (attempt {}), retrying: {}", attempt, e);
                    attempt += 1;
                }
                Err(failure) => return Err(failure.into()),
            }
        }
    }

    async fn run_transaction(
        &self,
        session: &mut ClientSession,
        batch: WriteBatch,
    ) -> Result<Vec<OpResult>, TransactionFailure> {
        session.start_transaction().await?;

        let mut results = Vec::with_capacity(batch.len());
        for (index, op) in batch.into_ops().into_iter().enumerate() {
            match self.apply_in_session(session, index, op).await {
                Ok(result) => results.push(result),
                Err(failure) => {
                    if let Err(abort) = session.abort_transaction().await {
                        log::warn!("⚠️  Transaction abort failed: {}", abort);
                    }
                    return Err(failure);
                }
            }
        }

        commit_with_retry(session).await?;
        Ok(results)
    }

    async fn apply_in_session(
        &self,
        session: &mut ClientSession,
        index: usize,
        op: WriteOp,
    ) -> Result<OpResult, TransactionFailure> {
        match op {
            WriteOp::InsertOne { collection, document } => {
                let inserted = self.collection(&collection).insert_one(document).session(&mut *session).await?;
                Ok(OpResult::Inserted(inserted.inserted_id))
            }
            WriteOp::UpdateOne { collection, filter, update, require_match } => {
                let result = self
                    .collection(&collection)
                    .update_one(filter.to_document(), update.to_document())
                    .session(&mut *session)
                    .await?;
                if require_match && result.matched_count == 0 {
                    return Err(TransactionFailure::Store(StoreError::PreconditionFailed { index }));
                }
                Ok(OpResult::Updated { matched: result.matched_count, modified: result.modified_count })
            }
            WriteOp::DeleteMany { collection, filter } => {
                let result = self
                    .collection(&collection)
                    .delete_many(filter.to_document())
                    .session(&mut *session)
                    .await?;
                Ok(OpResult::Deleted(result.deleted_count))
            }
        }
    }
}

/// Commits, retrying only while the outcome of the commit is unknown.
async fn commit_with_retry(session: &mut ClientSession) -> Result<(), mongodb::error::Error> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                log::warn!("⚠️  Commit result unknown (attempt {}), retrying commit: {}", attempt, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn summary(result: mongodb::results::UpdateResult) -> UpdateSummary {
    UpdateSummary {
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted: result.upserted_id.is_some(),
    }
}

#[async_trait]
impl DocumentStore for MongoDB {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        let result = self.collection(collection).insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn find_one(&self, collection: &str, filter: Filter) -> Result<Option<Document>, StoreError> {
        Ok(self.collection(collection).find_one(filter.to_document()).await?)
    }

    async fn find_many(&self, collection: &str, query: Query) -> Result<DocumentStream, StoreError> {
        let coll = self.collection(collection);
        let mut find = coll.find(query.filter.to_document());
        if let Some((field, order)) = &query.sort {
            find = find.sort(doc! { field.as_str(): order.as_i32() });
        }
        if let Some(limit) = query.limit {
            find = find.limit(limit);
        }
        let cursor = find.await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Filter,
        update: Update,
        upsert: bool,
    ) -> Result<UpdateSummary, StoreError> {
        let result = self
            .collection(collection)
            .update_one(filter.to_document(), update.to_document())
            .upsert(upsert)
            .await?;
        Ok(summary(result))
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Filter,
        update: Update,
        upsert: bool,
    ) -> Result<UpdateSummary, StoreError> {
        let result = self
            .collection(collection)
            .update_many(filter.to_document(), update.to_document())
            .upsert(upsert)
            .await?;
        Ok(summary(result))
    }

    async fn delete_one(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        Ok(self.collection(collection).delete_one(filter.to_document()).await?.deleted_count)
    }

    async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        Ok(self.collection(collection).delete_many(filter.to_document()).await?.deleted_count)
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        Ok(self.collection(collection).count_documents(filter.to_document()).await?)
    }

    async fn aggregate(&self, collection: &str, pipeline: Pipeline) -> Result<DocumentStream, StoreError> {
        let cursor = self.collection(collection).aggregate(pipeline.to_documents()).await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn apply_atomically(&self, batch: WriteBatch) -> Result<Vec<OpResult>, StoreError> {
        if self.transactions {
            self.apply_in_transaction(batch).await
        } else {
            batch::apply_with_compensation(self, batch).await
        }
    }

    async fn shutdown(&self) {
        log::info!("🔌 Closing MongoDB connection pool");
        self.client.clone().shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn driver_error() -> mongodb::error::Error {
        // Parsing a malformed URI fails locally, with no labels attached.
        ClientOptions::parse("not-a-mongodb-uri").await.unwrap_err()
    }

    #[tokio::test]
    async fn test_transient_label_maps_to_unavailable() {
        let e = driver_error().await;
        let mapped = classify(&e, |label| label == TRANSIENT_TRANSACTION_ERROR);
        assert!(matches!(mapped, StoreError::Unavailable(_)));
        assert!(mapped.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_commit_label_maps_to_unavailable() {
        let e = driver_error().await;
        let mapped = classify(&e, |label| label == UNKNOWN_TRANSACTION_COMMIT_RESULT);
        assert!(matches!(mapped, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unlabelled_error_is_backend_failure() {
        let e = driver_error().await;
        assert!(!e.contains_label(TRANSIENT_TRANSACTION_ERROR));
        assert!(matches!(StoreError::from(e), StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_transaction_failure_keeps_precondition() {
        let failure = TransactionFailure::Store(StoreError::PreconditionFailed { index: 0 });
        assert_eq!(StoreError::from(failure), StoreError::PreconditionFailed { index: 0 });

        let failure = TransactionFailure::Driver(driver_error().await);
        assert!(matches!(StoreError::from(failure), StoreError::Backend(_)));
    }

    #[test]
    fn test_standalone_server_has_no_transactions() {
        assert!(!supports_transactions(&doc! { "isWritablePrimary": true, "ok": 1.0 }));
        assert!(supports_transactions(&doc! { "isWritablePrimary": true, "setName": "rs0" }));
        assert!(supports_transactions(&doc! { "isWritablePrimary": true, "msg": "isdbgrid" }));
    }
}
