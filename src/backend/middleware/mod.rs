//! Middleware Module
//!
//! This module contains all HTTP middleware for the backend server.
//!
//! # Architecture
//!
//! - **`auth`** - Bearer token authentication and the `AuthUser` extractor
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use stockroom::backend::auth::get_me;
//! use stockroom::backend::middleware::auth_middleware;
//! use stockroom::backend::server::state::AppState;
//!
//! fn protected(state: AppState) -> Router<AppState> {
//!     Router::new()
//!         .route("/api/auth/me", get(get_me))
//!         .route_layer(from_fn_with_state(state, auth_middleware))
//! }
//! ```

pub mod auth;

pub use auth::{auth_middleware, AuthUser};
