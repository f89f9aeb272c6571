use crate::catalog::Catalog;
use crate::services::{AccessGuard, EnrollmentService, PaymentProvider, TokenService};
use crate::store::DocumentStore;
use std::sync::Arc;

/// Shared by every worker through `web::Data`.
pub struct AppState {
    pub catalog: Catalog,
    pub tokens: TokenService,
    pub guard: AccessGuard,
    pub enrollment: EnrollmentService,
    pub payments: Arc<dyn PaymentProvider>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: TokenService, payments: Arc<dyn PaymentProvider>) -> Self {
        let catalog = Catalog::new(store);
        Self {
            guard: AccessGuard::new(tokens.clone(), catalog.clone()),
            enrollment: EnrollmentService::new(catalog.clone()),
            catalog,
            tokens,
            payments,
        }
    }
}
