use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Append-only record in the "payments" collection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_name: Option<String>,
    pub user_email: String,
    pub classes_id: Vec<String>,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payment_status: Option<String>,
    pub date: BsonDateTime,
}

/// Body of `POST /payment-info`, sent once the provider confirmed the charge.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    #[serde(default)]
    pub classes_id: Option<Vec<String>>,
    #[serde(default)]
    pub class_id: Option<String>,
    pub user_email: String,
    pub transaction_id: String,
    pub user_name: Option<String>,
    pub price: Option<f64>,
    pub amount: Option<f64>,
    pub quantity: Option<i64>,
    pub payment_method: Option<String>,
    pub payment_status: Option<String>,
    /// RFC 3339; the server time is used when absent or unparsable.
    pub date: Option<String>,
}

/// Body of `POST /create-payment-intent`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PaymentIntentRequest {
    pub price: f64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}
