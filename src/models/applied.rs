use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Instructor application awaiting admin review ("applied" collection).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedInstructor {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    #[schema(value_type = Option<String>)]
    pub id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub date: Option<String>,
}
