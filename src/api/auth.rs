use crate::services::IdentityClaims;
use crate::state::AppState;
use crate::utils::AppError;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /api/set-token - Issues a token for the posted user object
///
/// The body must carry an `email`; every other field is embedded as a claim.
#[utoipa::path(
    post,
    path = "/api/set-token",
    tag = "Auth",
    request_body(content = Object, description = "User fields, `email` required"),
    responses(
        (status = 200, description = "Signed token", body = TokenResponse),
        (status = 400, description = "Missing email")
    )
)]
pub async fn set_token(state: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, AppError> {
    let mut fields = match body.into_inner() {
        Value::Object(fields) => fields,
        _ => return Err(AppError::InvalidRequest("expected a JSON object".to_string())),
    };
    let email = match fields.remove("email") {
        Some(Value::String(email)) if !email.trim().is_empty() => email,
        _ => return Err(AppError::InvalidRequest("email is required".to_string())),
    };

    log::info!("🔑 POST /api/set-token - Issuing token for {}", email);

    let token = state
        .tokens
        .issue(IdentityClaims { email, fields })
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::memory_state;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_issued_token_verifies() {
        let state = memory_state();
        let app = test::init_service(
            App::new().app_data(state.clone()).route("/api/set-token", web::post().to(set_token)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/set-token")
            .set_json(json!({ "email": "sam@yoga.io", "name": "Sam" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let claims = state.tokens.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.email, "sam@yoga.io");
        assert_eq!(claims.fields["name"], "Sam");

        let req = test::TestRequest::post()
            .uri("/api/set-token")
            .set_json(json!({ "name": "no email" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
