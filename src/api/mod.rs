pub mod auth;
pub mod cart;
pub mod classes;
pub mod health;
pub mod instructors;
pub mod json;
pub mod payments;
pub mod swagger;
pub mod users;

use crate::middleware::Authorize;
use crate::services::IdentityClaims;
use crate::utils::AppError;
use actix_web::web;
use mongodb::bson::oid::ObjectId;

pub(crate) fn object_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::InvalidRequest(format!("invalid id {}", raw)))
}

/// Per-user resources are only served to the user they belong to.
pub(crate) fn require_owner(caller: &IdentityClaims, email: &str, resource: &str) -> Result<(), AppError> {
    if caller.email != email {
        log::warn!("🚫 {} asked for the {} of {}", caller.email, resource, email);
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Every route of the service; guarded routes wrap `Authorize` per resource.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health
        .route("/", web::get().to(health::index))
        .route("/health", web::get().to(health::health_check))
        // Auth
        .route("/api/set-token", web::post().to(auth::set_token))
        // Users
        .route("/new-user", web::post().to(users::create_user))
        .route("/users", web::get().to(users::list_users))
        .route("/users/{id}", web::get().to(users::get_user_by_id))
        .route("/instructors", web::get().to(users::list_instructors))
        .service(
            web::resource("/user/{email}")
                .wrap(Authorize::authenticated())
                .route(web::get().to(users::get_user_by_email)),
        )
        .service(
            web::resource("/delete-user/{id}")
                .wrap(Authorize::admin())
                .route(web::delete().to(users::delete_user)),
        )
        .service(
            web::resource("/update-user/{id}")
                .wrap(Authorize::admin())
                .route(web::put().to(users::update_user)),
        )
        // Classes
        .service(
            web::resource("/new-class")
                .wrap(Authorize::instructor())
                .route(web::post().to(classes::create_class)),
        )
        .route("/classes", web::get().to(classes::list_classes))
        .service(
            web::resource("/classes/{email}")
                .wrap(Authorize::instructor())
                .route(web::get().to(classes::classes_by_instructor)),
        )
        .route("/classes-manage", web::get().to(classes::manage_classes))
        .service(
            web::resource("/change-status/{id}")
                .wrap(Authorize::admin())
                .route(web::patch().to(classes::change_status)),
        )
        .route("/approved-classes", web::get().to(classes::approved_classes))
        .route("/class/{id}", web::get().to(classes::get_class))
        .service(
            web::resource("/update-class/{id}")
                .wrap(Authorize::instructor())
                .route(web::put().to(classes::update_class)),
        )
        .route("/popular_classes", web::get().to(classes::popular_classes))
        // Cart
        .service(
            web::resource("/add-to-cart")
                .wrap(Authorize::authenticated())
                .route(web::post().to(cart::add_to_cart)),
        )
        .service(
            web::resource("/cart-item/{id}")
                .wrap(Authorize::authenticated())
                .route(web::get().to(cart::get_cart_item)),
        )
        .service(
            web::resource("/cart/{email}")
                .wrap(Authorize::authenticated())
                .route(web::get().to(cart::get_cart)),
        )
        .service(
            web::resource("/delete-cart-item/{id}")
                .wrap(Authorize::authenticated())
                .route(web::delete().to(cart::delete_cart_item)),
        )
        // Payments and enrolments
        .route("/create-payment-intent", web::post().to(payments::create_payment_intent))
        .service(
            web::resource("/payment-info")
                .wrap(Authorize::authenticated())
                .route(web::post().to(payments::payment_info)),
        )
        .route("/payment-history/{email}", web::get().to(payments::payment_history))
        .route("/payment-history-length/{email}", web::get().to(payments::payment_history_length))
        .service(
            web::resource("/enrolled-classes/{email}")
                .wrap(Authorize::authenticated())
                .route(web::get().to(payments::enrolled_classes)),
        )
        // Instructors
        .route("/popular-instructors", web::get().to(instructors::popular_instructors))
        .service(
            web::resource("/admin-stats")
                .wrap(Authorize::admin())
                .route(web::get().to(instructors::admin_stats)),
        )
        .route("/as-instructor", web::post().to(instructors::apply_as_instructor))
        // Path the first web client was released against.
        .route("/ass-instructor", web::post().to(instructors::apply_as_instructor))
        .route("/applied-instructors/{email}", web::get().to(instructors::applied_instructor));
}
