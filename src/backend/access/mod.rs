//! Access Module
//!
//! Permission decisions for file data.
//!
//! - **`engine`** - Ordered rule list, `authorize` and the store-backed `PermissionEngine`
//! - **`gate`** - Coarse role gate per route capability

/// Permission resolution engine
pub mod engine;

/// Route-level role gate
pub mod gate;

pub use engine::{authorize, AccessError, PermissionEngine};
pub use gate::RoleGate;
