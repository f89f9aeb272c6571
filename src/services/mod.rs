pub mod access_guard;
pub mod auth_service;
pub mod enrollment_service;
pub mod payment_service;

pub use access_guard::AccessGuard;
pub use auth_service::{IdentityClaims, TokenService};
pub use enrollment_service::{EnrollmentReceipt, EnrollmentService};
pub use payment_service::{amount_cents, DisabledProvider, PaymentProvider, StripeProvider, CURRENCY};
