//! Live Collaboration Module
//!
//! This module tracks who has a file open and which rows they are editing,
//! and pushes changes to everyone else in real time.
//!
//! # Architecture
//!
//! - **`state`** - `CollabState`: per-file rooms, presence, row locks and fan-out
//! - **`handlers`** - SSE stream, connection commands, presence and force-unlock routes
//!
//! # Example
//!
//! ```rust,no_run
//! use stockroom::backend::collab::CollabState;
//! use stockroom::shared::{Role, User};
//! use tokio::sync::mpsc;
//!
//! let state = CollabState::new();
//! let user = User {
//!     id: 1,
//!     username: "ana".to_string(),
//!     role: Role::Editor,
//!     department_id: Some(1),
//!     is_active: true,
//! };
//! let (tx, _rx) = mpsc::unbounded_channel();
//! let conn = state.join(3, &user, Box::new(tx));
//! state.acquire(3, conn, 7);
//! ```

/// Rooms, presence and row locks
pub mod state;

/// HTTP and SSE handlers
pub mod handlers;

pub use state::{
    CollabState, DeliveryError, EventSink, LockOutcome, ReleaseOutcome, RowWriteGuard,
};
