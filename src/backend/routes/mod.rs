//! Route Configuration Module
//!
//! This module configures all HTTP routes for the backend server.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation and layers
//! └── api_routes.rs   - Route tables and the health handler
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use stockroom::backend::routes::create_router;
//! use stockroom::backend::server::config::ServerConfig;
//! use stockroom::backend::server::state::{AppState, Stores};
//! use stockroom::backend::store::MemoryStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::builder().build()?;
//! let state = AppState::new(config, Stores::memory(MemoryStore::new()), None);
//! let app = create_router(state);
//! # Ok(())
//! # }
//! ```

/// Main router creation
pub mod router;

/// Route tables
pub mod api_routes;

pub use router::create_router;
