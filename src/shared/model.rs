//! Data model shared by the REST API, the stores and the live channel.
use crate::shared::access::{PermissionLevel, Role};
use crate::shared::error::SharedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type DepartmentId = i64;
pub type FileId = i64;
pub type RowId = i64;

/// Ordered named field values of one row.
pub type RowValues = serde_json::Map<String, serde_json::Value>;

/// Account as seen by the access-control core. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
    pub is_active: bool,
}

impl User {
    /// Whether the user belongs to the given department.
    pub fn in_department(&self, department_id: DepartmentId) -> bool {
        self.department_id == Some(department_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub name: String,
    pub department_id: DepartmentId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Explicit grant of a level on one file to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePermission {
    pub file_id: FileId,
    pub user_id: UserId,
    pub level: PermissionLevel,
    pub granted_by: Option<UserId>,
    pub granted_at: DateTime<Utc>,
}

/// One row of a file's tabular data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub file_id: FileId,
    pub row_id: RowId,
    pub values: RowValues,
    pub updated_at: DateTime<Utc>,
}

/// Change of a single field between two row snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    ForceUnlock,
    Grant,
    Revoke,
    Login,
}

impl AuditAction {
    pub const ALL: [AuditAction; 7] = [
        AuditAction::Create,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::ForceUnlock,
        AuditAction::Grant,
        AuditAction::Revoke,
        AuditAction::Login,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::ForceUnlock => "FORCE_UNLOCK",
            AuditAction::Grant => "GRANT",
            AuditAction::Revoke => "REVOKE",
            AuditAction::Login => "LOGIN",
        }
    }
}

impl FromStr for AuditAction {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| SharedError::unknown("audit action", s))
    }
}

/// Kind of entity an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    User,
    File,
    Row,
    Grant,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::File => "file",
            EntityType::Row => "row",
            EntityType::Grant => "grant",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(EntityType::User),
            "file" => Ok(EntityType::File),
            "row" => Ok(EntityType::Row),
            "grant" => Ok(EntityType::Grant),
            _ => Err(SharedError::unknown("entity type", s)),
        }
    }
}

/// Audit entry before the store assigns an id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub actor_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub file_id: Option<FileId>,
    pub row_id: Option<RowId>,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(
        actor_id: Option<UserId>,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: i64,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_type,
            entity_id,
            file_id: None,
            row_id: None,
            field: None,
            old_value: None,
            new_value: None,
            metadata: None,
        }
    }

    /// `UPDATE` entry for one changed field of a row.
    pub fn field_update(actor_id: UserId, file_id: FileId, row_id: RowId, change: &FieldChange) -> Self {
        Self::new(Some(actor_id), AuditAction::Update, EntityType::Row, row_id)
            .in_file(file_id)
            .on_row(row_id)
            .with_change(change)
    }

    pub fn in_file(mut self, file_id: FileId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn on_row(mut self, row_id: RowId) -> Self {
        self.row_id = Some(row_id);
        self
    }

    pub fn with_change(mut self, change: &FieldChange) -> Self {
        self.field = Some(change.field.clone());
        self.old_value = Some(change.old_value.clone());
        self.new_value = Some(change.new_value.clone());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Persisted, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub file_id: Option<FileId>,
    pub row_id: Option<RowId>,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn from_new(id: i64, entry: NewAuditEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            actor_id: entry.actor_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            file_id: entry.file_id,
            row_id: entry.row_id,
            field: entry.field,
            old_value: entry.old_value,
            new_value: entry.new_value,
            metadata: entry.metadata,
            created_at,
        }
    }
}
