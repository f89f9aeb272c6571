use super::{json, object_id, require_owner};
use crate::catalog::queries::TOP_LISTING;
use crate::models::{ChangeStatusRequest, Class, ClassStatus, NewClassRequest, UpdateClassRequest};
use crate::services::IdentityClaims;
use crate::state::AppState;
use crate::store::{Filter, Update};
use crate::utils::AppError;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// POST /new-class - Instructor only; the class starts out pending review
#[utoipa::path(
    post,
    path = "/new-class",
    tag = "Classes",
    request_body = NewClassRequest,
    responses((status = 200, description = "Class created"), (status = 400, description = "Invalid class")),
    security(("bearer_auth" = []))
)]
pub async fn create_class(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    request: web::Json<NewClassRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name is required".to_string()));
    }
    if !request.price.is_finite() || request.price < 0.0 || request.available_seats < 0 {
        return Err(AppError::InvalidRequest("price and availableSeats must not be negative".to_string()));
    }

    let class = Class {
        id: None,
        name: request.name,
        image: request.image,
        description: request.description,
        video_link: request.video_link,
        price: request.price,
        available_seats: request.available_seats,
        total_enrolled: 0,
        instructor_name: request.instructor_name,
        instructor_email: caller.email.clone(),
        status: ClassStatus::Pending,
        submitted: request.submitted,
        reason: None,
    };
    let id = state.catalog.classes.insert(&class).await?;
    log::info!("📝 POST /new-class - {} by {}", class.name, class.instructor_email);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "insertedId": json::bson_to_json(id) })))
}

/// GET /classes - Approved classes only
#[utoipa::path(get, path = "/classes", tag = "Classes", responses((status = 200, description = "Approved classes")))]
pub async fn list_classes(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    approved(&state).await
}

/// GET /approved-classes
#[utoipa::path(get, path = "/approved-classes", tag = "Classes", responses((status = 200, description = "Approved classes")))]
pub async fn approved_classes(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    approved(&state).await
}

async fn approved(state: &AppState) -> Result<HttpResponse, AppError> {
    let classes = state
        .catalog
        .classes
        .collect(Filter::eq("status", ClassStatus::Approved.as_str()))
        .await?;
    Ok(HttpResponse::Ok().json(json::models(&classes)?))
}

/// GET /classes/{email} - Instructor only, own classes
#[utoipa::path(
    get,
    path = "/classes/{email}",
    tag = "Classes",
    params(("email" = String, Path, description = "Instructor email")),
    responses((status = 200, description = "Classes of the instructor"), (status = 401, description = "Not the caller")),
    security(("bearer_auth" = []))
)]
pub async fn classes_by_instructor(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    email: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    require_owner(&caller, &email, "classes")?;
    let classes = state
        .catalog
        .classes
        .collect(Filter::eq("instructorEmail", email.as_str()))
        .await?;
    Ok(HttpResponse::Ok().json(json::models(&classes)?))
}

/// GET /classes-manage - Every class regardless of status
#[utoipa::path(get, path = "/classes-manage", tag = "Classes", responses((status = 200, description = "All classes")))]
pub async fn manage_classes(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let classes = state.catalog.classes.collect(Filter::all()).await?;
    Ok(HttpResponse::Ok().json(json::models(&classes)?))
}

/// PATCH /change-status/{id} - Admin only
#[utoipa::path(
    patch,
    path = "/change-status/{id}",
    tag = "Classes",
    params(("id" = String, Path, description = "Class id")),
    request_body = ChangeStatusRequest,
    responses((status = 200, description = "Update summary"), (status = 404, description = "No such class")),
    security(("bearer_auth" = []))
)]
pub async fn change_status(
    state: web::Data<AppState>,
    id: web::Path<String>,
    request: web::Json<ChangeStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let oid = object_id(&id)?;
    let request = request.into_inner();

    let mut update = Update::new().set("status", request.status.as_str());
    update = match request.reason {
        Some(reason) => update.set("reason", reason),
        None => update.unset("reason"),
    };
    let summary = state.catalog.classes.update_one(Filter::eq("_id", oid), update, false).await?;
    if summary.matched_count == 0 {
        return Err(AppError::NotFound(format!("class {}", id)));
    }
    log::info!("🔧 PATCH /change-status/{} - {}", id, request.status.as_str());
    Ok(HttpResponse::Ok().json(summary))
}

/// GET /class/{id}
#[utoipa::path(
    get,
    path = "/class/{id}",
    tag = "Classes",
    params(("id" = String, Path, description = "Class id")),
    responses((status = 200, description = "Class"), (status = 404, description = "No such class"))
)]
pub async fn get_class(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse, AppError> {
    let oid = object_id(&id)?;
    let class = state
        .catalog
        .classes
        .find_one(Filter::eq("_id", oid))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("class {}", id)))?;
    Ok(HttpResponse::Ok().json(json::model(&class)?))
}

/// PUT /update-class/{id} - Instructor only, own classes; resubmits for review
#[utoipa::path(
    put,
    path = "/update-class/{id}",
    tag = "Classes",
    params(("id" = String, Path, description = "Class id")),
    request_body = UpdateClassRequest,
    responses((status = 200, description = "Update summary"), (status = 404, description = "No such class of the caller")),
    security(("bearer_auth" = []))
)]
pub async fn update_class(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    id: web::Path<String>,
    request: web::Json<UpdateClassRequest>,
) -> Result<HttpResponse, AppError> {
    let oid = object_id(&id)?;
    let request = request.into_inner();

    let mut update = Update::new().set("status", ClassStatus::Pending.as_str());
    if let Some(name) = request.name {
        update = update.set("name", name);
    }
    if let Some(description) = request.description {
        update = update.set("description", description);
    }
    if let Some(video_link) = request.video_link {
        update = update.set("videoLink", video_link);
    }
    if let Some(price) = request.price {
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::InvalidRequest("price must not be negative".to_string()));
        }
        update = update.set("price", price);
    }
    if let Some(seats) = request.available_seats {
        if seats < 0 {
            return Err(AppError::InvalidRequest("availableSeats must not be negative".to_string()));
        }
        update = update.set("availableSeats", seats);
    }

    let filter = Filter::eq("_id", oid).and(Filter::eq("instructorEmail", caller.email.as_str()));
    let summary = state.catalog.classes.update_one(filter, update, false).await?;
    if summary.matched_count == 0 {
        return Err(AppError::NotFound(format!("class {}", id)));
    }
    log::info!("🔧 PUT /update-class/{} - resubmitted by {}", id, caller.email);
    Ok(HttpResponse::Ok().json(summary))
}

/// GET /popular_classes - Top classes by enrolment
#[utoipa::path(get, path = "/popular_classes", tag = "Classes", responses((status = 200, description = "Most enrolled classes")))]
pub async fn popular_classes(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let classes = state.catalog.popular_classes(TOP_LISTING).await?;
    Ok(HttpResponse::Ok().json(json::models(&classes)?))
}
