use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Pending intent to purchase; removed once the class is paid for.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    #[schema(value_type = Option<String>)]
    pub id: Option<ObjectId>,
    /// Hex id of the class.
    pub class_id: String,
    pub user_mail: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub date: Option<String>,
}
