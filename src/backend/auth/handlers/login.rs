/**
 * Login Handler
 *
 * This module implements the user authentication handler for POST /api/auth/login.
 *
 * # Authentication Process
 *
 * 1. Look up the account by username
 * 2. Reject deactivated or soft-deleted accounts
 * 3. Verify the password using bcrypt
 * 4. Issue a JWT and record a `LOGIN` audit entry
 *
 * Every credential failure returns the same `AUTH_INVALID` response so the
 * caller cannot tell unknown usernames from wrong passwords.
 */
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};

use crate::backend::auth::handlers::types::{AuthResponse, LoginRequest};
use crate::backend::auth::users::verify_password;
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use crate::shared::{ApiResponse, AuditAction, EntityType, NewAuditEntry};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Login handler
///
/// # Example Request
///
/// ```http
/// POST /api/auth/login HTTP/1.1
/// Content-Type: application/json
///
/// { "username": "ana", "password": "correct horse" }
/// ```
///
/// # Example Response
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
///     "expires_at": "2025-01-02T10:00:00Z",
///     "user": { "id": 1, "username": "ana", "role": "editor", "department_id": 2, "is_active": true }
///   }
/// }
/// ```
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthResponse>>, BackendError> {
    let Json(request) = body?;
    tracing::info!("[Auth] Login request for: {}", request.username);

    let record = state
        .accounts
        .find_by_username(request.username.trim())
        .await?
        .filter(|record| record.is_usable())
        .ok_or_else(|| {
            tracing::warn!("[Auth] Unknown or inactive account: {}", request.username);
            BackendError::auth_invalid(INVALID_CREDENTIALS)
        })?;

    if !verify_password(&request.password, &record.password_hash) {
        tracing::warn!("[Auth] Invalid password for user: {}", request.username);
        return Err(BackendError::auth_invalid(INVALID_CREDENTIALS));
    }

    let user = record.user;
    let issued = state.sessions.create_token(&user).map_err(|e| {
        BackendError::internal(format!("Failed to create token: {}", e))
    })?;

    state.audit.record(NewAuditEntry::new(
        Some(user.id),
        AuditAction::Login,
        EntityType::User,
        user.id,
    ));
    tracing::info!("[Auth] User logged in successfully: {} ({})", user.username, user.role);

    Ok(Json(ApiResponse::ok(AuthResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    })))
}
