//! Authentication Module
//!
//! This module turns credentials into a `User`: password login, JWT issue
//! and verification, and the identity resolver used by the auth middleware.
//!
//! # Architecture
//!
//! - **`users`** - bcrypt password hashing and verification
//! - **`sessions`** - JWT claims, `CredentialVerifier` and `JwtSessions`
//! - **`identity`** - `IdentityResolver`: bearer header to active user
//! - **`handlers`** - HTTP handlers for authentication endpoints
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! ├── users.rs        - Password hashing
//! ├── sessions.rs     - JWT token management
//! ├── identity.rs     - Identity resolution
//! └── handlers/       - HTTP handlers
//!     ├── mod.rs      - Handler exports
//!     ├── types.rs    - Request/response types
//!     ├── login.rs    - User authentication handler
//!     └── me.rs       - Get current user handler
//! ```
//!
//! # Security
//!
//! - Passwords are hashed using bcrypt and only read on the login path
//! - Tokens are HS256 JWTs; the subject is re-checked against the account
//!   store on every request, so deactivation takes effect immediately
//! - Invalid credentials return 401 without saying which part was wrong

/// Password hashing
pub mod users;

/// JWT token generation and validation
pub mod sessions;

/// Bearer header to active user
pub mod identity;

/// HTTP handlers for authentication endpoints
pub mod handlers;

pub use handlers::types::{AuthResponse, LoginRequest};
pub use handlers::{get_me, login};
pub use identity::IdentityResolver;
pub use sessions::{AuthError, Claims, CredentialVerifier, JwtSessions};
