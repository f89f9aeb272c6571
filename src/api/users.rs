use super::{json, object_id};
use crate::models::{NewUserRequest, Role, UpdateUserRequest, User};
use crate::services::IdentityClaims;
use crate::state::AppState;
use crate::store::{Filter, StoreError, Update};
use crate::utils::AppError;
use actix_web::{web, HttpResponse};
use mongodb::bson::Bson;
use serde_json::json;

/// POST /new-user - Registers a user profile (role student)
#[utoipa::path(
    post,
    path = "/new-user",
    tag = "Users",
    request_body = NewUserRequest,
    responses(
        (status = 200, description = "User created"),
        (status = 400, description = "Email already registered")
    )
)]
pub async fn create_user(
    state: web::Data<AppState>,
    request: web::Json<NewUserRequest>,
) -> Result<HttpResponse, AppError> {
    let user = User::from(request.into_inner());
    log::info!("👤 POST /new-user - {}", user.email);

    if state.catalog.user_by_email(&user.email).await?.is_some() {
        log::warn!("⚠️ User {} already exists", user.email);
        return Err(AppError::InvalidRequest(format!("user {} already exists", user.email)));
    }

    // A concurrent registration can still win the race; the unique email key catches it.
    let id = state.catalog.users.insert(&user).await.map_err(|e| match e {
        StoreError::Duplicate(_) => {
            log::warn!("⚠️ User {} registered concurrently", user.email);
            AppError::InvalidRequest(format!("user {} already exists", user.email))
        }
        other => other.into(),
    })?;
    log::info!("✅ User created: {}", user.email);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "insertedId": json::bson_to_json(id) })))
}

/// GET /users - Lists every user
#[utoipa::path(get, path = "/users", tag = "Users", responses((status = 200, description = "All users")))]
pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let users = state.catalog.users.collect(Filter::all()).await?;
    log::info!("📋 GET /users - {} users", users.len());
    Ok(HttpResponse::Ok().json(json::models(&users)?))
}

/// GET /users/{id}
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, description = "User"), (status = 404, description = "No such user"))
)]
pub async fn get_user_by_id(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse, AppError> {
    let oid = object_id(&id)?;
    let user = state
        .catalog
        .users
        .find_one(Filter::eq("_id", oid))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", id)))?;
    Ok(HttpResponse::Ok().json(json::model(&user)?))
}

/// GET /user/{email} - Requires a token
#[utoipa::path(
    get,
    path = "/user/{email}",
    tag = "Users",
    params(("email" = String, Path, description = "User email")),
    responses((status = 200, description = "User"), (status = 404, description = "No such user")),
    security(("bearer_auth" = []))
)]
pub async fn get_user_by_email(
    state: web::Data<AppState>,
    _caller: web::ReqData<IdentityClaims>,
    email: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = state
        .catalog
        .user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", email)))?;
    Ok(HttpResponse::Ok().json(json::model(&user)?))
}

/// DELETE /delete-user/{id} - Admin only
#[utoipa::path(
    delete,
    path = "/delete-user/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, description = "Delete count")),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse, AppError> {
    let oid = object_id(&id)?;
    let deleted = state.catalog.users.delete_one(Filter::eq("_id", oid)).await?;
    log::info!("🗑️  DELETE /delete-user/{} - {} removed", id, deleted);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "deletedCount": deleted })))
}

/// PUT /update-user/{id} - Admin only; updates profile fields and role
#[utoipa::path(
    put,
    path = "/update-user/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Update summary"), (status = 404, description = "No such user")),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    state: web::Data<AppState>,
    id: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let oid = object_id(&id)?;
    let request = request.into_inner();

    let mut update = Update::new();
    let fields = [
        ("name", request.name),
        ("email", request.email),
        ("address", request.address),
        ("about", request.about),
        ("photoUrl", request.photo_url),
        ("phone", request.phone),
        ("skills", request.skills),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            update = update.set(field, value);
        }
    }
    if let Some(role) = request.role {
        update = update.set("role", role.as_str());
    }
    if update.is_empty() {
        return Err(AppError::InvalidRequest("nothing to update".to_string()));
    }

    let summary = state.catalog.users.update_one(Filter::eq("_id", oid), update, false).await?;
    if summary.matched_count == 0 {
        return Err(AppError::NotFound(format!("user {}", id)));
    }
    log::info!("🔧 PUT /update-user/{} - updated", id);
    Ok(HttpResponse::Ok().json(summary))
}

/// GET /instructors - Users with the instructor role
#[utoipa::path(get, path = "/instructors", tag = "Users", responses((status = 200, description = "Instructors")))]
pub async fn list_instructors(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let instructors = state
        .catalog
        .users
        .collect(Filter::eq("role", Bson::from(Role::Instructor.as_str())))
        .await?;
    Ok(HttpResponse::Ok().json(json::models(&instructors)?))
}
