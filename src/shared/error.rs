//! Shared Error Types
//!
//! This module defines error types that are shared between the server and
//! its clients. These errors represent parsing and validation failures on
//! the shared data model.
//!
//! # Error Categories
//!
//! - `ValidationError` - Data validation failures
//! - `UnknownVariant` - A string did not name a known role, level or entity
//!
//! # Usage
//!
//! ```rust
//! use stockroom::shared::error::SharedError;
//!
//! let error = SharedError::validation("values", "row values must be a JSON object");
//! ```
use thiserror::Error;

/// Shared error types that can occur in both server and client code
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// A string that should name an enum variant did not match any
    #[error("unknown {kind}: '{value}'")]
    UnknownVariant {
        /// What was being parsed (role, permission level, ...)
        kind: &'static str,
        /// The rejected input
        value: String,
    },
}

impl SharedError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new unknown-variant error
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
