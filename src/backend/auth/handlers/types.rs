/**
 * Authentication Handler Types
 *
 * Request and response bodies for the login and current-user handlers.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::User;

/// Login request
#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    /// Verified against the stored bcrypt hash, never logged
    pub password: String,
}

/// Auth response
///
/// Returned by the login handler. Contains the JWT token, its expiry and the
/// resolved account.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}
