use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ClassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Pending => "pending",
            ClassStatus::Approved => "approved",
            ClassStatus::Rejected => "rejected",
        }
    }
}

/// Document in the "classes" collection.
///
/// `available_seats` and `total_enrolled` only move through the enrollment
/// workflow, one seat per purchase.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video_link: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub available_seats: i64,
    #[serde(default)]
    pub total_enrolled: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instructor_name: Option<String>,
    pub instructor_email: String,
    #[serde(default)]
    pub status: ClassStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub submitted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

/// Body of `POST /new-class`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewClassRequest {
    pub name: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub video_link: Option<String>,
    pub price: f64,
    pub available_seats: i64,
    pub instructor_name: Option<String>,
    /// Overridden by the caller's token email.
    pub instructor_email: Option<String>,
    pub submitted: Option<String>,
}

/// Body of `PUT /update-class/{id}`; saving a class sends it back to review.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub available_seats: Option<i64>,
    pub video_link: Option<String>,
}

/// Body of `PATCH /change-status/{id}`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChangeStatusRequest {
    pub status: ClassStatus,
    pub reason: Option<String>,
}
