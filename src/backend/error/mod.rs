//! Backend Error Module
//!
//! This module defines the error type returned by HTTP handlers and its
//! conversion into the JSON error envelope.
//!
//! # Architecture
//!
//! - **`types`** - `BackendError` definition, constructors and code mapping
//! - **`conversion`** - `IntoResponse` implementation
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - Error conversion implementations
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use stockroom::backend::error::BackendError;
//! use axum::response::Response;
//!
//! # async fn example() -> Result<Response, BackendError> {
//! // Handler can return BackendError directly
//! Err(BackendError::not_found("File 3 not found"))
//! # }
//! ```

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::BackendError;
