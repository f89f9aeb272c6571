use crate::models::Role;
use crate::services::auth_service::IdentityClaims;
use crate::state::AppState;
use crate::utils::AppError;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

/// Verifies the bearer token and, when a role is set, the caller's role.
///
/// On success the caller's `IdentityClaims` are available to handlers as
/// `web::ReqData<IdentityClaims>`.
#[derive(Clone, Copy)]
pub struct Authorize {
    role: Option<Role>,
}

impl Authorize {
    pub fn authenticated() -> Self {
        Self { role: None }
    }

    pub fn admin() -> Self {
        Self { role: Some(Role::Admin) }
    }

    pub fn instructor() -> Self {
        Self { role: Some(Role::Instructor) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authorize
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthorizeMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthorizeMiddleware { service: Rc::new(service), role: self.role }))
    }
}

pub struct AuthorizeMiddleware<S> {
    service: Rc<S>,
    role: Option<Role>,
}

impl<S, B> Service<ServiceRequest> for AuthorizeMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let role = self.role;

        Box::pin(async move {
            match authorize(&req, role).await {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(e) => {
                    log::warn!("🔒 {} {} rejected: {}", req.method(), req.path(), e);
                    Ok(req.error_response(e).map_into_right_body())
                }
            }
        })
    }
}

async fn authorize(req: &ServiceRequest, role: Option<Role>) -> Result<IdentityClaims, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("application state not registered".to_string()))?;

    // A header that is not valid UTF-8 counts as a bad token.
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());

    let claims = state.guard.require_authenticated(header)?;
    if let Some(role) = role {
        state.guard.require_role(&claims, role).await?;
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::state::testing::memory_state;
    use actix_web::{http::StatusCode, test, App, HttpResponse};

    async fn whoami(claims: web::ReqData<IdentityClaims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.email.clone())
    }

    #[actix_web::test]
    async fn test_guard_order_and_statuses() {
        let state = memory_state();
        state.catalog.users.insert(&User::new("kim@yoga.io", Role::Admin)).await.unwrap();
        state.catalog.users.insert(&User::new("sam@yoga.io", Role::Student)).await.unwrap();
        let admin_token = state.tokens.issue(IdentityClaims::new("kim@yoga.io")).unwrap();
        let student_token = state.tokens.issue(IdentityClaims::new("sam@yoga.io")).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(web::resource("/me").wrap(Authorize::authenticated()).route(web::get().to(whoami)))
                .service(web::resource("/admin").wrap(Authorize::admin()).route(web::get().to(whoami))),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((AUTHORIZATION, "Bearer forged"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((AUTHORIZATION, format!("Bearer {student_token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "sam@yoga.io");

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {student_token}")))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {admin_token}")))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
}
