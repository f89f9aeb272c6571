use crate::store::StoreError;
use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

/// Seconds a client should wait before retrying after `StoreUnavailable`.
pub const RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    /// No token was presented.
    #[error("Unauthorized access")]
    Unauthenticated,
    /// A token was presented but did not verify.
    #[error("Forbidden access")]
    Forbidden,
    /// The caller is authenticated but lacks the required role.
    #[error("Unauthorized access")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unknown class ids: {}", .0.join(", "))]
    ClassNotFound(Vec<String>),
    #[error("Class {class_id} has no available seats")]
    CapacityError { class_id: String },
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Payment provider error: {0}")]
    PaymentProvider(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::ClassNotFound(_) => "class_not_found",
            AppError::CapacityError { .. } => "capacity",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::PaymentProvider(_) => "payment_provider",
            AppError::Internal(_) => "internal",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::StoreUnavailable(_) => "Database temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) | AppError::ClassNotFound(_) => StatusCode::BAD_REQUEST,
            AppError::CapacityError { .. } => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Internal(detail) = self {
            log::error!("❌ Internal error: {}", detail);
        }

        let mut builder = HttpResponse::build(self.status_code());
        if matches!(self, AppError::StoreUnavailable(_)) {
            builder.insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS.to_string()));
        }
        builder.json(json!({
            "success": false,
            "error": self.code(),
            "message": self.public_message(),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        if e.is_retryable() {
            log::warn!("⚠️ {}", e);
            return AppError::StoreUnavailable(e.to_string());
        }
        match e {
            StoreError::Duplicate(key) => AppError::InvalidRequest(format!("{} already exists", key)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(error: AppError) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = error.error_response();
        let status = response.status();
        let retry = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body()).await.unwrap();
        (status, retry, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn test_status_mapping() {
        assert_eq!(AppError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::ClassNotFound(vec!["x".into()]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::CapacityError { class_id: "c".into() }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::PaymentProvider("down".into()).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_unavailable_sets_retry_after() {
        let (status, retry, body) = body_json(StoreError::Unavailable("timeout".into()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(retry.as_deref(), Some("5"));
        assert_eq!(body["error"], "store_unavailable");
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_internal_details_are_redacted() {
        let (status, _, body) = body_json(StoreError::Backend("socket at 10.0.0.3".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[actix_web::test]
    async fn test_duplicate_key_is_a_bad_request() {
        let (status, _, body) = body_json(StoreError::Duplicate("users(email)".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }
}
