pub mod auth;
pub mod security_headers;

pub use auth::Authorize;
pub use security_headers::SecurityHeaders;
