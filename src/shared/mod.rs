//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the server and its clients. These types are used for serialization over
//! the REST API and the live event stream.
//!
//! # Overview
//!
//! The shared module provides platform-agnostic types that can be used
//! in both server and client code. All types are designed for serialization
//! and transmission over HTTP.

/// Roles, permission levels and access decisions
pub mod access;

/// Users, files, grants, rows and audit entries
pub mod model;

/// Live collaboration events
pub mod event;

/// REST response envelope
pub mod api;

/// Shared error types
pub mod error;

/// Re-export commonly used types for convenience
pub use access::{Capability, Decision, DenyReason, PermissionLevel, Role};
pub use api::{ApiResponse, ErrorBody, ErrorCode, ErrorEnvelope};
pub use error::SharedError;
pub use event::{ActiveUser, CollabEvent, ConnectionId, LockHolder, RowLock};
pub use model::{
    AuditAction, AuditLogEntry, DepartmentId, EntityType, FieldChange, File, FileId,
    FilePermission, NewAuditEntry, Row, RowId, RowValues, User, UserId,
};
