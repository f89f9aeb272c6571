use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: String,
    pub timestamp: i64,
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Yoga Master Server is running!")
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let (database, mut builder) = match state.catalog.store().ping().await {
        Ok(()) => ("connected", HttpResponse::Ok()),
        Err(e) => {
            log::warn!("⚠️ Health check: database ping failed: {}", e);
            ("unreachable", HttpResponse::ServiceUnavailable())
        }
    };

    builder.json(HealthResponse {
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        service: "yoga-master-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
