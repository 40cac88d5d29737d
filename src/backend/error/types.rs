/**
 * Backend Error Types
 *
 * This module defines the error type returned by every HTTP handler. Each
 * variant maps onto one envelope code and HTTP status.
 *
 * # Error Categories
 *
 * ## Identity
 *
 * - `AuthRequired` - no credentials were sent (401)
 * - `AuthInvalid` - credentials were sent but did not resolve to an active user (401)
 *
 * ## Access
 *
 * - `Forbidden` - role gate or permission engine denied, with the deny reason (403)
 * - `RowLocked` - another user holds the row lock (409)
 *
 * ## Everything Else
 *
 * - `NotFound`, `BadRequest` - caller-facing lookups and validation
 * - `Store`, `Internal` - logged and reported as `SERVER_ERROR` without detail
 */
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::access::AccessError;
use crate::backend::auth::sessions::AuthError;
use crate::backend::store::StoreError;
use crate::shared::{DenyReason, ErrorCode, LockHolder, RowId, SharedError};

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use stockroom::backend::error::BackendError;
/// use stockroom::shared::DenyReason;
///
/// let err = BackendError::forbidden(DenyReason::ViewerReadOnly);
/// assert_eq!(err.status_code().as_u16(), 403);
///
/// let err = BackendError::not_found("File not found");
/// assert_eq!(err.status_code().as_u16(), 404);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// No credentials on a protected route
    #[error("Authentication required")]
    AuthRequired,

    /// Credentials present but unusable
    #[error("Invalid credentials: {message}")]
    AuthInvalid {
        /// Human-readable error message
        message: String,
    },

    /// Access denied by the role gate or the permission engine
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Why access was denied
        reason: DenyReason,
    },

    /// Referenced entity does not exist or is not visible
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message
        message: String,
    },

    /// Write rejected because another user holds the row lock
    #[error("Row {row_id} is locked by {}", .holder.username)]
    RowLocked {
        row_id: RowId,
        holder: LockHolder,
    },

    /// Invalid request body or parameters
    #[error("Bad request: {message}")]
    BadRequest {
        /// Human-readable error message
        message: String,
    },

    /// Unexpected server-side failure
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message, logged only
        message: String,
    },

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),
}

impl BackendError {
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::AuthInvalid {
            message: message.into(),
        }
    }

    pub fn forbidden(reason: DenyReason) -> Self {
        Self::Forbidden { reason }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Envelope code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthRequired => ErrorCode::AuthRequired,
            Self::AuthInvalid { .. } => ErrorCode::AuthInvalid,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::RowLocked { .. } => ErrorCode::RowLocked,
            Self::BadRequest { .. } => ErrorCode::BadRequest,
            Self::Internal { .. } => ErrorCode::ServerError,
            Self::Store(err) => match err {
                StoreError::NotFound(_) => ErrorCode::NotFound,
                StoreError::Conflict(_) => ErrorCode::BadRequest,
                _ => ErrorCode::ServerError,
            },
            Self::SharedError(_) => ErrorCode::BadRequest,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Deny reason carried by forbidden responses
    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Self::Forbidden { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Message sent to the caller. Server errors never expose details.
    pub fn message(&self) -> String {
        match self {
            Self::AuthRequired => "Authentication required".to_string(),
            Self::AuthInvalid { message } => message.clone(),
            Self::Forbidden { reason } => reason.message().to_string(),
            Self::NotFound { message } | Self::BadRequest { message } => message.clone(),
            Self::RowLocked { row_id, holder } => {
                format!("Row {} is locked by {}", row_id, holder.username)
            }
            Self::Store(StoreError::NotFound(what)) => format!("Not found: {}", what),
            Self::Store(StoreError::Conflict(what)) => format!("Conflict: {}", what),
            Self::SharedError(err) => err.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<AuthError> for BackendError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => Self::AuthRequired,
            AuthError::Malformed => Self::auth_invalid("Malformed authorization header"),
            AuthError::Invalid(_) => Self::auth_invalid("Invalid or expired token"),
            AuthError::Inactive => Self::auth_invalid("Account is inactive or unknown"),
            AuthError::Store(err) => Self::Store(err),
        }
    }
}

impl From<AccessError> for BackendError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound(file_id) => Self::not_found(format!("File {} not found", file_id)),
            AccessError::Denied(reason) => Self::forbidden(reason),
            AccessError::Store(err) => Self::Store(err),
        }
    }
}

impl From<DenyReason> for BackendError {
    fn from(reason: DenyReason) -> Self {
        Self::forbidden(reason)
    }
}

impl From<JsonRejection> for BackendError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
