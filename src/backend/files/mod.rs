//! Files Module
//!
//! HTTP handlers for files, their rows and their explicit grants. Every
//! handler runs the role gate first and the permission engine second.
//!
//! # Module Structure
//!
//! ```text
//! files/
//! ├── mod.rs      - Module exports and documentation
//! ├── handlers.rs - List, create and delete files
//! ├── rows.rs     - Row CRUD and the shared row write path
//! └── grants.rs   - Grant management
//! ```

/// File handlers
pub mod handlers;

/// Row handlers
pub mod rows;

/// Grant handlers
pub mod grants;

pub use handlers::{create_file, delete_file, list_files, CreateFileRequest};
pub use grants::{delete_grant, list_grants, put_grant, GrantRequest};
pub use rows::{apply_row_update, create_row, delete_row, list_rows, update_row, RowRequest};
