use super::{json, require_owner};
use crate::models::{PaymentConfirmation, PaymentIntentRequest, PaymentIntentResponse};
use crate::services::{amount_cents, EnrollmentReceipt, IdentityClaims, CURRENCY};
use crate::state::AppState;
use crate::utils::AppError;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// POST /create-payment-intent - Opens a payment intent for `price` dollars
#[utoipa::path(
    post,
    path = "/create-payment-intent",
    tag = "Payments",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Client secret", body = PaymentIntentResponse),
        (status = 400, description = "Invalid price"),
        (status = 502, description = "Payment provider failed")
    )
)]
pub async fn create_payment_intent(
    state: web::Data<AppState>,
    request: web::Json<PaymentIntentRequest>,
) -> Result<HttpResponse, AppError> {
    let amount = amount_cents(request.price)?;
    log::info!("💳 POST /create-payment-intent - {} cents", amount);

    let client_secret = state.payments.create_intent(amount, CURRENCY).await.map_err(|e| {
        log::error!("❌ Payment intent failed: {}", e);
        e
    })?;
    Ok(HttpResponse::Ok().json(PaymentIntentResponse { client_secret }))
}

/// POST /payment-info - Records a completed payment and enrols the purchaser
#[utoipa::path(
    post,
    path = "/payment-info",
    tag = "Payments",
    request_body = PaymentConfirmation,
    responses(
        (status = 200, description = "Enrolment applied", body = EnrollmentReceipt),
        (status = 400, description = "Unknown class"),
        (status = 409, description = "No seats left"),
        (status = 503, description = "Database unavailable, retry")
    ),
    security(("bearer_auth" = []))
)]
pub async fn payment_info(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    payment: web::Json<PaymentConfirmation>,
) -> Result<HttpResponse, AppError> {
    let payment = payment.into_inner();
    if payment.user_email != caller.email {
        log::warn!("🚫 {} tried to record a payment for {}", caller.email, payment.user_email);
        return Err(AppError::Unauthorized);
    }
    log::info!("💳 POST /payment-info - {} transaction {}", payment.user_email, payment.transaction_id);

    let receipt = state.enrollment.confirm(payment).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

/// GET /payment-history/{email} - Newest first
#[utoipa::path(
    get,
    path = "/payment-history/{email}",
    tag = "Payments",
    params(("email" = String, Path, description = "Purchaser email")),
    responses((status = 200, description = "Payments"))
)]
pub async fn payment_history(state: web::Data<AppState>, email: web::Path<String>) -> Result<HttpResponse, AppError> {
    let payments = state.enrollment.history(&email).await?;
    Ok(HttpResponse::Ok().json(json::models(&payments)?))
}

/// GET /payment-history-length/{email}
#[utoipa::path(
    get,
    path = "/payment-history-length/{email}",
    tag = "Payments",
    params(("email" = String, Path, description = "Purchaser email")),
    responses((status = 200, description = "Number of payments"))
)]
pub async fn payment_history_length(
    state: web::Data<AppState>,
    email: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let total = state.enrollment.history_len(&email).await?;
    Ok(HttpResponse::Ok().json(json!({ "total": total })))
}

/// GET /enrolled-classes/{email} - Purchased classes with instructor details
#[utoipa::path(
    get,
    path = "/enrolled-classes/{email}",
    tag = "Payments",
    params(("email" = String, Path, description = "Student email")),
    responses((status = 200, description = "Enrolled classes"), (status = 401, description = "Another user's enrolments")),
    security(("bearer_auth" = []))
)]
pub async fn enrolled_classes(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    email: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    require_owner(&caller, &email, "enrolments")?;
    let rows = state.catalog.enrolled_classes(&email).await?;
    log::info!("📚 GET /enrolled-classes/{} - {} classes", email, rows.len());
    Ok(HttpResponse::Ok().json(json::documents_to_json(rows)))
}

#[cfg(test)]
mod tests {
    use crate::api;
    use crate::models::{CartItem, Class, ClassStatus, Role, User};
    use crate::services::payment_service::testing::FakeProvider;
    use crate::services::IdentityClaims;
    use crate::state::testing::{memory_state, memory_state_with};
    use actix_web::{http::header::AUTHORIZATION, http::StatusCode, test, App};
    use mongodb::bson::Bson;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn class(seats: i64, enrolled: i64) -> Class {
        Class {
            id: None,
            name: "Vinyasa".into(),
            image: None,
            description: None,
            video_link: None,
            price: 30.0,
            available_seats: seats,
            total_enrolled: enrolled,
            instructor_name: Some("Ana".into()),
            instructor_email: "ana@yoga.io".into(),
            status: ClassStatus::Approved,
            submitted: None,
            reason: None,
        }
    }

    #[actix_web::test]
    async fn test_payment_intent_amount() {
        let provider = Arc::new(FakeProvider::default());
        let state = memory_state_with(provider.clone());
        let app = test::init_service(App::new().app_data(state).configure(api::routes)).await;

        let req = test::TestRequest::post()
            .uri("/create-payment-intent")
            .set_json(json!({ "price": 49.99 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["clientSecret"], "pi_test_4999_secret");
        assert_eq!(provider.requests.lock().unwrap()[0], (4999, "usd".to_string()));

        let req = test::TestRequest::post()
            .uri("/create-payment-intent")
            .set_json(json!({ "price": -1.0 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_purchase_flow_over_http() {
        let state = memory_state();
        state.catalog.users.insert(&User::new("ana@yoga.io", Role::Instructor)).await.unwrap();
        let class_id = match state.catalog.classes.insert(&class(5, 10)).await.unwrap() {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => panic!("unexpected id {other:?}"),
        };
        let item = CartItem { id: None, class_id: class_id.clone(), user_mail: "sam@yoga.io".into(), date: None };
        state.catalog.cart.insert(&item).await.unwrap();
        let sam = format!("Bearer {}", state.tokens.issue(IdentityClaims::new("sam@yoga.io")).unwrap());
        let app = test::init_service(App::new().app_data(state.clone()).configure(api::routes)).await;

        let payment = json!({
            "classesId": [class_id],
            "userEmail": "sam@yoga.io",
            "transactionId": "pi_123",
            "price": 30.0,
            "paymentStatus": "succeeded",
        });

        let req = test::TestRequest::post().uri("/payment-info").set_json(&payment).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.catalog.payments.count(crate::store::Filter::all()).await.unwrap(), 0);

        let req = test::TestRequest::post()
            .uri("/payment-info")
            .insert_header((AUTHORIZATION, sam.clone()))
            .set_json(&payment)
            .to_request();
        let receipt: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt["transactionId"], "pi_123");
        assert_eq!(receipt["cartItemsRemoved"], 1);

        let req = test::TestRequest::get().uri(&format!("/class/{class_id}")).to_request();
        let stored: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stored["availableSeats"], 4);
        assert_eq!(stored["totalEnrolled"], 11);

        let req = test::TestRequest::get().uri("/payment-history/sam@yoga.io").to_request();
        let history: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history[0]["transactionId"], "pi_123");
        assert!(history[0]["date"].is_string());

        let req = test::TestRequest::get().uri("/payment-history-length/sam@yoga.io").to_request();
        let length: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(length["total"], 1);

        let req = test::TestRequest::get()
            .uri("/enrolled-classes/sam@yoga.io")
            .insert_header((AUTHORIZATION, sam.clone()))
            .to_request();
        let enrolled: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(enrolled[0]["classes"]["_id"], class_id.as_str());
        assert_eq!(enrolled[0]["instructor"]["email"], "ana@yoga.io");

        let eve = format!("Bearer {}", state.tokens.issue(IdentityClaims::new("eve@yoga.io")).unwrap());
        let req = test::TestRequest::get()
            .uri("/enrolled-classes/sam@yoga.io")
            .insert_header((AUTHORIZATION, eve))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let mut other = payment.clone();
        other["userEmail"] = json!("eve@yoga.io");
        let req = test::TestRequest::post()
            .uri("/payment-info")
            .insert_header((AUTHORIZATION, sam))
            .set_json(&other)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_sold_out_class_conflicts() {
        let state = memory_state();
        let class_id = match state.catalog.classes.insert(&class(0, 8)).await.unwrap() {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => panic!("unexpected id {other:?}"),
        };
        let sam = format!("Bearer {}", state.tokens.issue(IdentityClaims::new("sam@yoga.io")).unwrap());
        let app = test::init_service(App::new().app_data(state.clone()).configure(api::routes)).await;

        let req = test::TestRequest::post()
            .uri("/payment-info")
            .insert_header((AUTHORIZATION, sam))
            .set_json(json!({ "classId": class_id, "userEmail": "sam@yoga.io", "transactionId": "pi_9" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "capacity");
        assert_eq!(body["success"], false);
    }
}
