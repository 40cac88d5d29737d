/**
 * Error Conversion
 *
 * `IntoResponse` for `BackendError`, producing the JSON error envelope:
 *
 * ```json
 * { "success": false, "error": { "code": "FORBIDDEN", "message": "...", "reason": "viewer-read-only" } }
 * ```
 *
 * Server errors are logged here with their full detail; the caller only sees
 * a generic message.
 */
use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;
use crate::shared::{ErrorCode, ErrorEnvelope};

impl BackendError {
    /// Build the envelope sent for this error
    pub fn envelope(&self) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(self.code(), self.message());
        if let Some(reason) = self.reason() {
            envelope = envelope.with_reason(reason);
        }
        if let Self::RowLocked { row_id, holder } = self {
            envelope = envelope.with_details(serde_json::json!({
                "row_id": row_id,
                "holder": holder,
            }));
        }
        envelope
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        if self.code() == ErrorCode::ServerError {
            tracing::error!("Request failed: {}", self);
        }
        (self.status_code(), Json(self.envelope())).into_response()
    }
}
