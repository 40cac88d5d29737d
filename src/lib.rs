//! Stockroom - Access Control and Live Collaboration Core
//!
//! Stockroom is the backend core of a sales/inventory application. Files hold
//! rows of tabular data, users belong to departments, and several people can
//! edit the same file at once.
//!
//! # Overview
//!
//! This library provides:
//! - Identity resolution from bearer credentials (JWT)
//! - A permission engine combining role, ownership, department and explicit grants
//! - An append-only audit recorder with field-level row diffs
//! - A presence and row-lock coordinator with live fan-out over Server-Sent Events
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between server and clients
//!   - Roles, permission levels, deny reasons
//!   - Users, files, grants, rows, audit entries
//!   - Live collaboration events and the REST response envelope
//!
//! - **`backend`** - Server-side code (only compiled with the `server` feature)
//!   - Axum HTTP server, routes and middleware
//!   - Identity, access, audit and collaboration components
//!   - Postgres and in-memory stores
//!
//! # Feature Flags
//!
//! - **`server`** (default) - Enables the backend modules and the
//!   `stockroom-server` binary.
//!
//! # Usage
//!
//! ```rust,no_run
//! use stockroom::backend::server::{config::ServerConfig, init::create_app};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load()?;
//! let app = create_app(config).await;
//! // Serve `app` with axum::serve
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! - Per-file collaboration rooms live behind their own mutex, sharded by file id
//! - Stores are `Send + Sync` trait objects shared through `Arc`
//! - Audit writes are spawned onto the tokio runtime and never block a request

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "server")]
pub mod backend;
