//! Authentication Handlers Module
//!
//! # Module Structure
//!
//! ```text
//! handlers/
//! ├── mod.rs      - Module exports and documentation
//! ├── types.rs    - Request and response types
//! ├── login.rs    - User authentication handler
//! └── me.rs       - Get current user handler
//! ```
//!
//! # Handlers
//!
//! - **`login`** - POST /api/auth/login - exchange username and password for a JWT
//! - **`get_me`** - GET /api/auth/me - account behind the bearer token

/// Request and response types
pub mod types;

/// Login handler
pub mod login;

/// Get current user handler
pub mod me;

pub use types::{AuthResponse, LoginRequest};

pub use login::login;
pub use me::get_me;
