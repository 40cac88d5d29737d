//! Server Module
//!
//! This module contains all server-side code for initializing and configuring
//! the Axum HTTP server.
//!
//! # Architecture
//!
//! - **`state`** - `AppState`, the `Stores` bundle and `FromRef` implementations
//! - **`config`** - `ServerConfig` loading, validation and the database pool
//! - **`init`** - Server initialization and app creation
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Configuration loading (env, TOML, database)
//! └── init.rs         - Server initialization and app creation
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration Loading**: defaults, TOML file, then environment
//! 2. **Database**: optional pool with migrations; in-memory stores otherwise
//! 3. **State Creation**: sessions, identity, access, audit and collaboration
//! 4. **Router Creation**: public and authenticated routes with tracing
//!
//! # Example
//!
//! ```rust,no_run
//! use stockroom::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_app(ServerConfig::load()?).await;
//! # Ok(())
//! # }
//! ```

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::{ConfigError, ServerConfig, ServerConfigBuilder};
pub use init::create_app;
pub use state::{AppState, Stores};
