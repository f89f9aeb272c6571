use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Links a purchaser to the classes bought in one transaction. Immutable.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_email: String,
    pub classes_id: Vec<ObjectId>,
    pub transaction_id: String,
}
