/**
 * Identity Resolver
 *
 * Turns an `Authorization` header into an active `User`. Resolution has no
 * side effects and runs once per protected request (auth middleware) and
 * once per live connection attempt.
 *
 * # Failure Cases
 *
 * - No header: `AuthError::Missing`
 * - No `Bearer ` prefix or empty token: `AuthError::Malformed`
 * - Bad signature or expired token: `AuthError::Invalid`
 * - Subject unknown, deactivated or soft-deleted: `AuthError::Inactive`
 */
use std::sync::Arc;

use crate::backend::auth::sessions::{AuthError, CredentialVerifier};
use crate::backend::store::AccountStore;
use crate::shared::User;

#[derive(Clone)]
pub struct IdentityResolver {
    verifier: Arc<dyn CredentialVerifier>,
    accounts: Arc<dyn AccountStore>,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { verifier, accounts }
    }

    /// Resolve the raw `Authorization` header value.
    pub async fn resolve(&self, header: Option<&str>) -> Result<User, AuthError> {
        let header = header.ok_or(AuthError::Missing)?;
        let token = bearer_token(header)?;
        self.resolve_token(token).await
    }

    pub async fn resolve_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.verifier.verify(token).await?;
        let user_id = claims.user_id()?;
        let user = self
            .accounts
            .load_active_user(user_id)
            .await?
            .ok_or(AuthError::Inactive)?;
        tracing::debug!("[Auth] resolved user {} ({})", user.id, user.role);
        Ok(user)
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Malformed)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(token)
}
