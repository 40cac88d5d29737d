//! Audit Module
//!
//! Append-only record of who changed what.
//!
//! - **`recorder`** - `AuditRecorder`: fire-and-forget writes, row diffs, history reads
//! - **`handlers`** - admin-only HTTP views over the log

pub mod recorder;

pub mod handlers;

pub use recorder::{diff, AuditRecorder};
