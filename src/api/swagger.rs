use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Yoga Master API",
        version = "1.0.0",
        description = "Yoga class marketplace backend.\n\n**Authentication:** protected endpoints expect `Authorization: Bearer <token>` issued by `/api/set-token`.\n\n**Roles:** student, instructor and admin. Admin routes manage users, class reviews and statistics; instructor routes manage the caller's own classes."
    ),
    paths(
        // Health & Auth
        crate::api::health::health_check,
        crate::api::auth::set_token,

        // Users
        crate::api::users::create_user,
        crate::api::users::list_users,
        crate::api::users::get_user_by_id,
        crate::api::users::get_user_by_email,
        crate::api::users::delete_user,
        crate::api::users::update_user,
        crate::api::users::list_instructors,

        // Classes
        crate::api::classes::create_class,
        crate::api::classes::list_classes,
        crate::api::classes::approved_classes,
        crate::api::classes::classes_by_instructor,
        crate::api::classes::manage_classes,
        crate::api::classes::change_status,
        crate::api::classes::get_class,
        crate::api::classes::update_class,
        crate::api::classes::popular_classes,

        // Cart
        crate::api::cart::add_to_cart,
        crate::api::cart::get_cart_item,
        crate::api::cart::get_cart,
        crate::api::cart::delete_cart_item,

        // Payments
        crate::api::payments::create_payment_intent,
        crate::api::payments::payment_info,
        crate::api::payments::payment_history,
        crate::api::payments::payment_history_length,
        crate::api::payments::enrolled_classes,

        // Instructors
        crate::api::instructors::apply_as_instructor,
        crate::api::instructors::applied_instructor,
        crate::api::instructors::popular_instructors,
        crate::api::instructors::admin_stats,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::api::auth::TokenResponse,
            crate::api::cart::AddToCartRequest,
            crate::models::Role,
            crate::models::ClassStatus,
            crate::models::NewUserRequest,
            crate::models::UpdateUserRequest,
            crate::models::NewClassRequest,
            crate::models::UpdateClassRequest,
            crate::models::ChangeStatusRequest,
            crate::models::CartItem,
            crate::models::AppliedInstructor,
            crate::models::PaymentConfirmation,
            crate::models::PaymentIntentRequest,
            crate::models::PaymentIntentResponse,
            crate::services::EnrollmentReceipt,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and database connectivity."),
        (name = "Auth", description = "Token issuance."),
        (name = "Users", description = "User profiles and role management."),
        (name = "Classes", description = "Class catalogue and the admin review workflow."),
        (name = "Cart", description = "Classes a student intends to buy."),
        (name = "Payments", description = "Payment intents, payment confirmation, history and enrolments."),
        (name = "Instructors", description = "Instructor applications, rankings and admin statistics."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from /api/set-token"))
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_guarded_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/payment-info"));
        assert!(doc.paths.paths.contains_key("/popular_classes"));
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
