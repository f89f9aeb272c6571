use super::json;
use crate::catalog::queries::TOP_LISTING;
use crate::models::AppliedInstructor;
use crate::state::AppState;
use crate::store::Filter;
use crate::utils::AppError;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// POST /as-instructor - Files an application to teach
#[utoipa::path(
    post,
    path = "/as-instructor",
    tag = "Instructors",
    request_body = AppliedInstructor,
    responses((status = 200, description = "Application stored"), (status = 400, description = "Missing email"))
)]
pub async fn apply_as_instructor(
    state: web::Data<AppState>,
    application: web::Json<AppliedInstructor>,
) -> Result<HttpResponse, AppError> {
    let mut application = application.into_inner();
    if application.email.trim().is_empty() {
        return Err(AppError::InvalidRequest("email is required".to_string()));
    }
    application.id = None;

    let id = state.catalog.applied.insert(&application).await?;
    log::info!("📝 POST /as-instructor - {}", application.email);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "insertedId": json::bson_to_json(id) })))
}

/// GET /applied-instructors/{email}
#[utoipa::path(
    get,
    path = "/applied-instructors/{email}",
    tag = "Instructors",
    params(("email" = String, Path, description = "Applicant email")),
    responses((status = 200, description = "Application", body = AppliedInstructor), (status = 404, description = "No application"))
)]
pub async fn applied_instructor(state: web::Data<AppState>, email: web::Path<String>) -> Result<HttpResponse, AppError> {
    let application = state
        .catalog
        .applied
        .find_one(Filter::eq("email", email.as_str()))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no application from {}", email)))?;
    Ok(HttpResponse::Ok().json(json::model(&application)?))
}

/// GET /popular-instructors - Instructors ranked by total enrolments
#[utoipa::path(get, path = "/popular-instructors", tag = "Instructors", responses((status = 200, description = "Top instructors")))]
pub async fn popular_instructors(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let ranked = state.catalog.popular_instructors(TOP_LISTING).await?;
    Ok(HttpResponse::Ok().json(json::documents_to_json(ranked)))
}

/// GET /admin-stats - Admin only; catalogue totals
#[utoipa::path(
    get,
    path = "/admin-stats",
    tag = "Instructors",
    responses((status = 200, description = "Counts of classes, instructors and enrolments")),
    security(("bearer_auth" = []))
)]
pub async fn admin_stats(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let stats = state.catalog.admin_stats().await?;
    Ok(HttpResponse::Ok().json(json::document_to_json(stats)))
}
