/**
 * Authentication Middleware
 *
 * This module provides middleware for protecting routes that require
 * user authentication. It resolves the `Authorization` header through the
 * `IdentityResolver` and attaches the active `User` to the request.
 */
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::backend::auth::identity::IdentityResolver;
use crate::backend::error::BackendError;
use crate::shared::User;

/// Authentication middleware
///
/// This middleware:
/// 1. Reads the `Authorization: Bearer <token>` header
/// 2. Verifies the token and loads the active account
/// 3. Attaches the `User` to request extensions for use in handlers
///
/// Returns `AUTH_REQUIRED` when the header is missing and `AUTH_INVALID`
/// for any other identity failure.
pub async fn auth_middleware(
    State(identity): State<IdentityResolver>,
    mut request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let user = identity.resolve(header).await.map_err(|e| {
        tracing::warn!("[Auth] Rejected request to {}: {}", request.uri().path(), e);
        BackendError::from(e)
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated user
///
/// Only valid behind `auth_middleware`; without it every request is
/// rejected with `AUTH_REQUIRED`.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                tracing::warn!("[Auth] User not found in request extensions");
                BackendError::AuthRequired
            })
    }
}
