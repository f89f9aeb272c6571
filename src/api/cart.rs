use super::{json, require_owner};
use crate::models::CartItem;
use crate::services::IdentityClaims;
use crate::state::AppState;
use crate::store::{Filter, StoreError};
use crate::utils::AppError;
use actix_web::{web, HttpResponse};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub class_id: String,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CartItemQuery {
    pub email: Option<String>,
}

/// POST /add-to-cart - Adds a class to the caller's cart
#[utoipa::path(
    post,
    path = "/add-to-cart",
    tag = "Cart",
    request_body = AddToCartRequest,
    responses((status = 200, description = "Item stored (or already present)")),
    security(("bearer_auth" = []))
)]
pub async fn add_to_cart(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    request: web::Json<AddToCartRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    if ObjectId::parse_str(&request.class_id).is_err() {
        return Err(AppError::InvalidRequest(format!("invalid class id {}", request.class_id)));
    }

    let existing = Filter::eq("classId", request.class_id.as_str()).and(Filter::eq("userMail", caller.email.as_str()));
    if state.catalog.cart.find_one(existing).await?.is_some() {
        log::info!("🛒 {} already has {} in cart", caller.email, request.class_id);
        return Ok(HttpResponse::Ok().json(json!({ "success": true, "alreadyInCart": true })));
    }

    let item = CartItem {
        id: None,
        class_id: request.class_id,
        user_mail: caller.email.clone(),
        date: request.date,
    };
    let id = match state.catalog.cart.insert(&item).await {
        Ok(id) => id,
        Err(StoreError::Duplicate(_)) => {
            log::info!("🛒 {} already has {} in cart", item.user_mail, item.class_id);
            return Ok(HttpResponse::Ok().json(json!({ "success": true, "alreadyInCart": true })));
        }
        Err(e) => return Err(e.into()),
    };
    log::info!("🛒 POST /add-to-cart - {} added {}", item.user_mail, item.class_id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "alreadyInCart": false,
        "insertedId": json::bson_to_json(id),
    })))
}

/// GET /cart-item/{id}?email= - Cart entry for one class
#[utoipa::path(
    get,
    path = "/cart-item/{id}",
    tag = "Cart",
    params(("id" = String, Path, description = "Class id"), CartItemQuery),
    responses(
        (status = 200, description = "Cart item"),
        (status = 401, description = "Another user's cart"),
        (status = 404, description = "Not in cart")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_cart_item(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    id: web::Path<String>,
    query: web::Query<CartItemQuery>,
) -> Result<HttpResponse, AppError> {
    let email = query.email.as_deref().unwrap_or(caller.email.as_str());
    require_owner(&caller, email, "cart")?;
    let filter = Filter::eq("classId", id.as_str()).and(Filter::eq("userMail", email));
    let item = state
        .catalog
        .cart
        .find_one(filter)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("class {} is not in the cart", id)))?;
    Ok(HttpResponse::Ok().json(json::model(&item)?))
}

/// GET /cart/{email} - Classes currently in the user's cart
#[utoipa::path(
    get,
    path = "/cart/{email}",
    tag = "Cart",
    params(("email" = String, Path, description = "Cart owner")),
    responses((status = 200, description = "Classes in the cart"), (status = 401, description = "Another user's cart")),
    security(("bearer_auth" = []))
)]
pub async fn get_cart(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    email: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    require_owner(&caller, &email, "cart")?;
    let items = state.catalog.cart.collect(Filter::eq("userMail", email.as_str())).await?;
    let ids: Vec<ObjectId> = items
        .iter()
        .filter_map(|item| ObjectId::parse_str(&item.class_id).ok())
        .collect();
    if ids.is_empty() {
        return Ok(HttpResponse::Ok().json(json!([])));
    }
    let classes = state.catalog.classes.collect(Filter::is_in("_id", ids)).await?;
    log::info!("🛒 GET /cart/{} - {} classes", email, classes.len());
    Ok(HttpResponse::Ok().json(json::models(&classes)?))
}

/// DELETE /delete-cart-item/{id} - Removes a class from the caller's cart
#[utoipa::path(
    delete,
    path = "/delete-cart-item/{id}",
    tag = "Cart",
    params(("id" = String, Path, description = "Class id")),
    responses((status = 200, description = "Delete count")),
    security(("bearer_auth" = []))
)]
pub async fn delete_cart_item(
    state: web::Data<AppState>,
    caller: web::ReqData<IdentityClaims>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let filter = Filter::eq("classId", id.as_str()).and(Filter::eq("userMail", caller.email.as_str()));
    let deleted = state.catalog.cart.delete_one(filter).await?;
    log::info!("🗑️  DELETE /delete-cart-item/{} - {} removed", id, deleted);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "deletedCount": deleted })))
}

#[cfg(test)]
mod tests {
    use crate::api;
    use crate::models::{Class, ClassStatus};
    use crate::services::IdentityClaims;
    use crate::state::testing::memory_state;
    use actix_web::{http::header::AUTHORIZATION, http::StatusCode, test, App};
    use mongodb::bson::Bson;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_cart_is_scoped_to_caller() {
        let state = memory_state();
        let class = Class {
            id: None,
            name: "Hatha".into(),
            image: None,
            description: None,
            video_link: None,
            price: 15.0,
            available_seats: 4,
            total_enrolled: 0,
            instructor_name: None,
            instructor_email: "ana@yoga.io".into(),
            status: ClassStatus::Approved,
            submitted: None,
            reason: None,
        };
        let class_id = match state.catalog.classes.insert(&class).await.unwrap() {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => panic!("unexpected id {other:?}"),
        };
        let sam = format!("Bearer {}", state.tokens.issue(IdentityClaims::new("sam@yoga.io")).unwrap());
        let eve = format!("Bearer {}", state.tokens.issue(IdentityClaims::new("eve@yoga.io")).unwrap());
        let app = test::init_service(App::new().app_data(state.clone()).configure(api::routes)).await;

        for expected in [false, true] {
            let req = test::TestRequest::post()
                .uri("/add-to-cart")
                .insert_header((AUTHORIZATION, sam.clone()))
                .set_json(json!({ "classId": class_id }))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["alreadyInCart"], expected);
        }

        let req = test::TestRequest::get()
            .uri("/cart/sam@yoga.io")
            .insert_header((AUTHORIZATION, sam.clone()))
            .to_request();
        let classes: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(classes[0]["name"], "Hatha");

        let req = test::TestRequest::get()
            .uri(&format!("/cart-item/{class_id}?email=sam@yoga.io"))
            .insert_header((AUTHORIZATION, sam.clone()))
            .to_request();
        let item: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(item["userMail"], "sam@yoga.io");

        let req = test::TestRequest::get()
            .uri("/cart/sam@yoga.io")
            .insert_header((AUTHORIZATION, eve.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri(&format!("/cart-item/{class_id}?email=sam@yoga.io"))
            .insert_header((AUTHORIZATION, eve.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::delete()
            .uri(&format!("/delete-cart-item/{class_id}"))
            .insert_header((AUTHORIZATION, eve))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["deletedCount"], 0);

        let req = test::TestRequest::delete()
            .uri(&format!("/delete-cart-item/{class_id}"))
            .insert_header((AUTHORIZATION, sam.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["deletedCount"], 1);

        let req = test::TestRequest::get()
            .uri(&format!("/cart-item/{class_id}"))
            .insert_header((AUTHORIZATION, sam))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_concurrent_adds_store_one_item() {
        let state = memory_state();
        let class_id = mongodb::bson::oid::ObjectId::new().to_hex();
        let sam = format!("Bearer {}", state.tokens.issue(IdentityClaims::new("sam@yoga.io")).unwrap());
        let app = test::init_service(App::new().app_data(state.clone()).configure(api::routes)).await;

        let calls = (0..4).map(|_| {
            let req = test::TestRequest::post()
                .uri("/add-to-cart")
                .insert_header((AUTHORIZATION, sam.clone()))
                .set_json(json!({ "classId": class_id }))
                .to_request();
            test::call_service(&app, req)
        });
        for res in futures::future::join_all(calls).await {
            assert_eq!(res.status(), StatusCode::OK);
        }

        let stored = state.catalog.cart.count(crate::store::Filter::eq("userMail", "sam@yoga.io")).await.unwrap();
        assert_eq!(stored, 1);
    }
}
