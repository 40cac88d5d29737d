//! Backend Module
//!
//! This module contains all server-side code for Stockroom: the Axum HTTP
//! server, the access-control components and live collaboration.
//!
//! This module is only compiled when the `server` feature is enabled.
//!
//! # Architecture
//!
//! The backend is organized into focused submodules:
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`auth`** - Password login, JWT sessions, identity resolution
//! - **`access`** - Permission engine and role gate
//! - **`audit`** - Audit recorder and history routes
//! - **`collab`** - Presence, row locks and the live event stream
//! - **`files`** - File, row and grant handlers
//! - **`store`** - Persistence traits with Postgres and in-memory backends
//! - **`middleware`** - Request authentication
//! - **`error`** - Backend error type and JSON envelope
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - `stockroom-server` binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── auth/           - Authentication
//! ├── access/         - Authorization
//! ├── audit/          - Audit log
//! ├── collab/         - Live collaboration
//! ├── files/          - File, row and grant handlers
//! ├── store/          - Persistence
//! ├── middleware/     - Request middleware
//! └── error/          - Error types
//! ```
//!
//! # Request Flow
//!
//! 1. `auth_middleware` resolves the bearer token to an active `User`
//! 2. The handler checks the route capability with `RoleGate`
//! 3. The handler resolves the file through `PermissionEngine`
//! 4. Row writes pass the coordinator's lock guard, hit the store, then get
//!    audited and broadcast to the file's room
//!
//! # Error Handling
//!
//! Handlers return `Result<_, BackendError>`; every error becomes the JSON
//! envelope `{ "success": false, "error": { "code": ..., "message": ... } }`.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Backend error types
pub mod error;

/// Authentication and identity
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Permission engine and role gate
pub mod access;

/// Audit recorder
pub mod audit;

/// Presence and row locks
pub mod collab;

/// File, row and grant handlers
pub mod files;

/// Persistence
pub mod store;

pub use collab::CollabState;
pub use error::BackendError;
pub use server::create_app;
