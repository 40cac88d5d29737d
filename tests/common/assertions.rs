//! Assertions over the JSON response envelope

use axum::http::StatusCode;
use serde_json::Value;

/// Assert an error envelope with the given status and code
pub fn assert_error(status: StatusCode, body: &Value, expected: StatusCode, code: &str) {
    assert_eq!(status, expected, "unexpected status, body: {}", body);
    assert_eq!(body["success"], false, "expected an error envelope: {}", body);
    assert_eq!(body["error"]["code"], code, "unexpected error code: {}", body);
}

/// Assert a 403 envelope carrying the given deny reason
pub fn assert_forbidden(status: StatusCode, body: &Value, reason: &str) {
    assert_error(status, body, StatusCode::FORBIDDEN, "FORBIDDEN");
    assert_eq!(body["error"]["reason"], reason, "unexpected deny reason: {}", body);
}

/// Assert a success envelope and return its `data`
pub fn assert_success(status: StatusCode, body: &Value) -> Value {
    assert!(status.is_success(), "expected success, got {}: {}", status, body);
    assert_eq!(body["success"], true, "expected a success envelope: {}", body);
    body["data"].clone()
}
