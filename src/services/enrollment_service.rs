use crate::catalog::{Catalog, CART, CLASSES, ENROLLED, PAYMENTS};
use crate::models::{EnrollmentRecord, PaymentConfirmation, PaymentRecord};
use crate::store::{Filter, OpResult, Query, SortOrder, StoreError, Update, WriteBatch};
use crate::utils::AppError;
use chrono::DateTime;
use mongodb::bson::{oid::ObjectId, to_document, Bson, DateTime as BsonDateTime};
use serde::Serialize;

/// Outcome of a confirmed payment.
#[derive(Debug, Clone, Serialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentReceipt {
    pub transaction_id: String,
    pub classes_id: Vec<String>,
    pub enrollment_id: String,
    pub payment_id: String,
    pub cart_items_removed: u64,
}

/// Applies a completed payment: seats, enrollment, cart cleanup and payment
/// history change together or not at all.
#[derive(Clone)]
pub struct EnrollmentService {
    catalog: Catalog,
}

impl EnrollmentService {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub async fn confirm(&self, payment: PaymentConfirmation) -> Result<EnrollmentReceipt, AppError> {
        let ids = requested_ids(&payment)?;
        let class_ids = self.resolve_classes(&ids).await?;

        let mut batch = WriteBatch::new();
        for id in &class_ids {
            batch = batch.update_one_required(
                CLASSES,
                Filter::eq("_id", *id).and(Filter::gt("availableSeats", 0)),
                Update::new().inc("totalEnrolled", 1).inc("availableSeats", -1),
            );
        }

        let enrollment = EnrollmentRecord {
            id: None,
            user_email: payment.user_email.clone(),
            classes_id: class_ids.clone(),
            transaction_id: payment.transaction_id.clone(),
        };
        let record = PaymentRecord {
            id: None,
            user_name: payment.user_name,
            user_email: payment.user_email.clone(),
            classes_id: ids.clone(),
            transaction_id: payment.transaction_id.clone(),
            price: payment.price,
            amount: payment.amount,
            quantity: payment.quantity,
            payment_method: payment.payment_method,
            payment_status: payment.payment_status,
            date: payment_date(payment.date.as_deref()),
        };

        let seat_updates = class_ids.len();
        let batch = batch
            .insert(ENROLLED, to_document(&enrollment).map_err(StoreError::from)?)
            .delete_many(
                CART,
                Filter::eq("userMail", payment.user_email.as_str()).and(Filter::is_in("classId", ids.clone())),
            )
            .insert(PAYMENTS, to_document(&record).map_err(StoreError::from)?);

        let results = self
            .catalog
            .store()
            .apply_atomically(batch)
            .await
            .map_err(|e| match e {
                StoreError::PreconditionFailed { index } if index < seat_updates => {
                    AppError::CapacityError { class_id: ids[index].clone() }
                }
                other => AppError::from(other),
            })?;

        let receipt = EnrollmentReceipt {
            transaction_id: payment.transaction_id,
            enrollment_id: inserted_id(results.get(seat_updates)),
            cart_items_removed: match results.get(seat_updates + 1) {
                Some(OpResult::Deleted(n)) => *n,
                _ => 0,
            },
            payment_id: inserted_id(results.get(seat_updates + 2)),
            classes_id: ids,
        };
        log::info!(
            "✅ Enrolled {} in {} class(es), transaction {}",
            payment.user_email,
            receipt.classes_id.len(),
            receipt.transaction_id
        );
        Ok(receipt)
    }

    /// Payments of `email`, newest first.
    pub async fn history(&self, email: &str) -> Result<Vec<PaymentRecord>, AppError> {
        let query = Query::new(Filter::eq("userEmail", email)).sort("date", SortOrder::Descending);
        Ok(self.catalog.payments.collect(query).await?)
    }

    pub async fn history_len(&self, email: &str) -> Result<u64, AppError> {
        Ok(self.catalog.payments.count(Filter::eq("userEmail", email)).await?)
    }

    // Every id must name an existing class with at least one free seat.
    async fn resolve_classes(&self, ids: &[String]) -> Result<Vec<ObjectId>, AppError> {
        let mut parsed = Vec::with_capacity(ids.len());
        let mut unknown = Vec::new();
        for id in ids {
            match ObjectId::parse_str(id) {
                Ok(oid) => parsed.push(oid),
                Err(_) => unknown.push(id.clone()),
            }
        }
        if !unknown.is_empty() {
            return Err(AppError::ClassNotFound(unknown));
        }

        let found = self.catalog.classes.collect(Filter::is_in("_id", parsed.clone())).await?;
        let unknown: Vec<String> = parsed
            .iter()
            .filter(|oid| !found.iter().any(|c| c.id.as_ref() == Some(*oid)))
            .map(|oid| oid.to_hex())
            .collect();
        if !unknown.is_empty() {
            log::warn!("⚠️ Payment references unknown classes: {:?}", unknown);
            return Err(AppError::ClassNotFound(unknown));
        }

        if let Some(full) = found.iter().find(|c| c.available_seats <= 0) {
            let class_id = full.id.map(|oid| oid.to_hex()).unwrap_or_default();
            log::warn!("⚠️ Class {} has no seats left", class_id);
            return Err(AppError::CapacityError { class_id });
        }
        Ok(parsed)
    }
}

fn requested_ids(payment: &PaymentConfirmation) -> Result<Vec<String>, AppError> {
    let raw: Vec<String> = match (&payment.classes_id, &payment.class_id) {
        (Some(many), _) if !many.is_empty() => many.clone(),
        (_, Some(one)) => vec![one.clone()],
        _ => Vec::new(),
    };
    let mut ids: Vec<String> = Vec::with_capacity(raw.len());
    for id in raw {
        let id = id.trim().to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(AppError::InvalidRequest("classesId or classId is required".to_string()));
    }
    if payment.user_email.trim().is_empty() || payment.transaction_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("userEmail and transactionId are required".to_string()));
    }
    Ok(ids)
}

fn payment_date(raw: Option<&str>) -> BsonDateTime {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| BsonDateTime::from_millis(dt.timestamp_millis()))
        .unwrap_or_else(BsonDateTime::now)
}

fn inserted_id(result: Option<&OpResult>) -> String {
    match result {
        Some(OpResult::Inserted(Bson::ObjectId(oid))) => oid.to_hex(),
        Some(OpResult::Inserted(other)) => other.to_string(),
        _ => String::new(),
    }
}
