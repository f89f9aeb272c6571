use crate::catalog::Catalog;
use crate::models::{Role, User};
use crate::services::auth_service::{IdentityClaims, TokenService};
use crate::utils::AppError;

/// Resolves the caller behind a request and checks their role.
#[derive(Clone)]
pub struct AccessGuard {
    tokens: TokenService,
    catalog: Catalog,
}

impl AccessGuard {
    pub fn new(tokens: TokenService, catalog: Catalog) -> Self {
        Self { tokens, catalog }
    }

    /// Verifies the `Authorization` header; never touches the store.
    pub fn require_authenticated(&self, header: Option<&str>) -> Result<IdentityClaims, AppError> {
        let header = header.ok_or(AppError::Unauthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Forbidden)?;
        self.tokens.verify(token).map_err(|_| AppError::Forbidden)
    }

    /// Looks the caller up by email and requires `role`.
    pub async fn require_role(&self, claims: &IdentityClaims, role: Role) -> Result<User, AppError> {
        match self.catalog.user_by_email(&claims.email).await? {
            Some(user) if user.role == role => Ok(user),
            Some(user) => {
                log::warn!("🚫 {} has role {}, {} required", claims.email, user.role, role);
                Err(AppError::Unauthorized)
            }
            None => {
                log::warn!("🚫 No user record for {}", claims.email);
                Err(AppError::Unauthorized)
            }
        }
    }
}
