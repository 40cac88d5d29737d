//! Store Module
//!
//! Narrow persistence traits used by the identity, access, audit and row
//! services. Every trait has an in-memory implementation (tests and
//! database-less runs) and a Postgres implementation.
//!
//! # Module Structure
//!
//! ```text
//! store/
//! ├── mod.rs       - Traits, StoreError, shared records
//! ├── memory.rs    - MemoryStore (tokio RwLock maps)
//! └── postgres.rs  - PostgresStore (sqlx)
//! ```
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::shared::{
    AuditLogEntry, DepartmentId, EntityType, File, FileId, FilePermission, NewAuditEntry,
    PermissionLevel, Row, RowId, RowValues, User, UserId,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// A stored value could not be mapped back onto the domain model.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Account row including credentials; only the login path sees this.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Active and not soft-deleted.
    pub fn is_usable(&self) -> bool {
        self.user.is_active && self.deleted_at.is_none()
    }
}

/// File about to be created; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub department_id: DepartmentId,
    pub created_by: UserId,
}

/// Grant about to be written; replaces any existing grant for the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantUpdate {
    pub file_id: FileId,
    pub user_id: UserId,
    pub level: PermissionLevel,
    pub granted_by: UserId,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// `None` for unknown, deactivated or soft-deleted accounts.
    async fn load_active_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn get_file(&self, id: FileId) -> StoreResult<Option<File>>;
    async fn get_grant(&self, file_id: FileId, user_id: UserId)
        -> StoreResult<Option<FilePermission>>;
    /// Every file paired with the caller's grant on it, if any.
    async fn list_files_for(
        &self,
        user_id: UserId,
    ) -> StoreResult<Vec<(File, Option<FilePermission>)>>;
    async fn create_file(&self, file: NewFile) -> StoreResult<File>;
    /// Removes the file together with its rows and grants.
    async fn delete_file(&self, id: FileId) -> StoreResult<()>;
    async fn list_grants(&self, file_id: FileId) -> StoreResult<Vec<FilePermission>>;
    async fn upsert_grant(&self, grant: GrantUpdate) -> StoreResult<FilePermission>;
    async fn delete_grant(&self, file_id: FileId, user_id: UserId) -> StoreResult<()>;
}

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn list_rows(&self, file_id: FileId) -> StoreResult<Vec<Row>>;
    async fn get_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<Option<Row>>;
    async fn insert_row(&self, file_id: FileId, values: RowValues) -> StoreResult<Row>;
    async fn update_row(&self, file_id: FileId, row_id: RowId, values: RowValues)
        -> StoreResult<Row>;
    async fn delete_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<()>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry>;
    /// Newest first.
    async fn history(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>>;
    /// Newest first, across all entities.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>>;
}
