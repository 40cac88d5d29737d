//! Postgres-backed implementation of every store trait.
//!
//! # Row values
//! `file_data.row_data` is a `json` column (not `jsonb`) so field order is kept
//! exactly as written. Values are bound as text and read back as text, then
//! parsed with `serde_json` which preserves insertion order.
//!
//! # Errors
//! Unique violations map to `StoreError::Conflict`, foreign key violations to
//! `StoreError::NotFound`; anything else surfaces as `StoreError::Database`.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use super::{
    AccountStore, AuditStore, FileStore, GrantUpdate, NewFile, RowStore, StoreError,
    StoreResult, UserRecord,
};
use crate::shared::{
    AuditLogEntry, EntityType, File, FileId, FilePermission, NewAuditEntry, PermissionLevel,
    Row, RowId, RowValues, User, UserId,
};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: i64,
    username: String,
    role: String,
    department_id: Option<i64>,
    is_active: bool,
    password_hash: String,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbUser> for UserRecord {
    type Error = StoreError;

    fn try_from(row: DbUser) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {}", row.id, e)))?;
        Ok(UserRecord {
            user: User {
                id: row.id,
                username: row.username,
                role,
                department_id: row.department_id,
                is_active: row.is_active,
            },
            password_hash: row.password_hash,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbFile {
    id: i64,
    name: String,
    department_id: i64,
    created_by: i64,
    created_at: DateTime<Utc>,
}

impl From<DbFile> for File {
    fn from(row: DbFile) -> Self {
        File {
            id: row.id,
            name: row.name,
            department_id: row.department_id,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbGrant {
    file_id: i64,
    user_id: i64,
    level: i16,
    granted_by: Option<i64>,
    granted_at: DateTime<Utc>,
}

impl TryFrom<DbGrant> for FilePermission {
    type Error = StoreError;

    fn try_from(row: DbGrant) -> Result<Self, Self::Error> {
        Ok(FilePermission {
            file_id: row.file_id,
            user_id: row.user_id,
            level: level_from_db(row.level)?,
            granted_by: row.granted_by,
            granted_at: row.granted_at,
        })
    }
}

/// A file LEFT JOINed with one user's grant.
#[derive(Debug, Clone, FromRow)]
struct DbFileWithGrant {
    id: i64,
    name: String,
    department_id: i64,
    created_by: i64,
    created_at: DateTime<Utc>,
    grant_user_id: Option<i64>,
    grant_level: Option<i16>,
    grant_granted_by: Option<i64>,
    grant_granted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbFileWithGrant> for (File, Option<FilePermission>) {
    type Error = StoreError;

    fn try_from(row: DbFileWithGrant) -> Result<Self, Self::Error> {
        let grant = match (row.grant_user_id, row.grant_level, row.grant_granted_at) {
            (Some(user_id), Some(level), Some(granted_at)) => Some(FilePermission {
                file_id: row.id,
                user_id,
                level: level_from_db(level)?,
                granted_by: row.grant_granted_by,
                granted_at,
            }),
            _ => None,
        };
        let file = File {
            id: row.id,
            name: row.name,
            department_id: row.department_id,
            created_by: row.created_by,
            created_at: row.created_at,
        };
        Ok((file, grant))
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbRow {
    id: i64,
    file_id: i64,
    row_data: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbRow> for Row {
    type Error = StoreError;

    fn try_from(row: DbRow) -> Result<Self, Self::Error> {
        let values: RowValues = serde_json::from_str(&row.row_data)
            .map_err(|e| StoreError::Corrupt(format!("row {}: {}", row.id, e)))?;
        Ok(Row {
            file_id: row.file_id,
            row_id: row.id,
            values,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbAuditEntry {
    id: i64,
    actor_id: Option<i64>,
    action: String,
    entity_type: String,
    entity_id: i64,
    file_id: Option<i64>,
    row_id: Option<i64>,
    field: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    metadata: Option<Json<serde_json::Value>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbAuditEntry> for AuditLogEntry {
    type Error = StoreError;

    fn try_from(row: DbAuditEntry) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::shared::SharedError| {
            StoreError::Corrupt(format!("audit entry {}: {}", row.id, e))
        };
        Ok(AuditLogEntry {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action.parse().map_err(corrupt)?,
            entity_type: row.entity_type.parse().map_err(corrupt)?,
            entity_id: row.entity_id,
            file_id: row.file_id,
            row_id: row.row_id,
            field: row.field,
            old_value: row.old_value,
            new_value: row.new_value,
            metadata: row.metadata.map(|json| json.0),
            created_at: row.created_at,
        })
    }
}

fn level_from_db(level: i16) -> StoreResult<PermissionLevel> {
    PermissionLevel::from_i16(level).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn map_write_error(err: sqlx::Error, what: String) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(what);
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::NotFound(what);
        }
    }
    StoreError::Database(err)
}

fn encode_values(values: &RowValues) -> StoreResult<String> {
    serde_json::to_string(values).map_err(|e| StoreError::Corrupt(e.to_string()))
}

const USER_COLUMNS: &str =
    "id, username, role, department_id, is_active, password_hash, deleted_at";
const FILE_COLUMNS: &str = "id, name, department_id, created_by, created_at";
const GRANT_COLUMNS: &str = "file_id, user_id, level, granted_by, granted_at";
const ROW_COLUMNS: &str = "id, file_id, row_data::text AS row_data, updated_at";
const AUDIT_COLUMNS: &str = "id, actor_id, action, entity_type, entity_id, file_id, row_id, \
     field, old_value, new_value, metadata, created_at";

#[async_trait]
impl AccountStore for PostgresStore {
    async fn load_active_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id = $1 AND is_active = TRUE AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| UserRecord::try_from(row).map(|record| record.user))
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }
}

#[async_trait]
impl FileStore for PostgresStore {
    async fn get_file(&self, id: FileId) -> StoreResult<Option<File>> {
        let row = sqlx::query_as::<_, DbFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(File::from))
    }

    async fn get_grant(
        &self,
        file_id: FileId,
        user_id: UserId,
    ) -> StoreResult<Option<FilePermission>> {
        let row = sqlx::query_as::<_, DbGrant>(&format!(
            "SELECT {GRANT_COLUMNS} FROM file_permissions WHERE file_id = $1 AND user_id = $2"
        ))
        .bind(file_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(FilePermission::try_from).transpose()
    }

    async fn list_files_for(
        &self,
        user_id: UserId,
    ) -> StoreResult<Vec<(File, Option<FilePermission>)>> {
        let rows = sqlx::query_as::<_, DbFileWithGrant>(
            r#"
            SELECT f.id, f.name, f.department_id, f.created_by, f.created_at,
                   p.user_id AS grant_user_id,
                   p.level AS grant_level,
                   p.granted_by AS grant_granted_by,
                   p.granted_at AS grant_granted_at
            FROM files f
            LEFT JOIN file_permissions p ON p.file_id = f.id AND p.user_id = $1
            ORDER BY f.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(<(File, Option<FilePermission>)>::try_from)
            .collect()
    }

    async fn create_file(&self, file: NewFile) -> StoreResult<File> {
        let row = sqlx::query_as::<_, DbFile>(&format!(
            "INSERT INTO files (name, department_id, created_by) VALUES ($1, $2, $3) \
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(&file.name)
        .bind(file.department_id)
        .bind(file.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, format!("department {}", file.department_id)))?;
        Ok(row.into())
    }

    async fn delete_file(&self, id: FileId) -> StoreResult<()> {
        // file_data and file_permissions cascade on delete.
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("file {}", id)));
        }
        Ok(())
    }

    async fn list_grants(&self, file_id: FileId) -> StoreResult<Vec<FilePermission>> {
        let rows = sqlx::query_as::<_, DbGrant>(&format!(
            "SELECT {GRANT_COLUMNS} FROM file_permissions WHERE file_id = $1 ORDER BY user_id"
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FilePermission::try_from).collect()
    }

    async fn upsert_grant(&self, grant: GrantUpdate) -> StoreResult<FilePermission> {
        let row = sqlx::query_as::<_, DbGrant>(&format!(
            "INSERT INTO file_permissions (file_id, user_id, level, granted_by) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (file_id, user_id) DO UPDATE \
             SET level = EXCLUDED.level, granted_by = EXCLUDED.granted_by, granted_at = NOW() \
             RETURNING {GRANT_COLUMNS}"
        ))
        .bind(grant.file_id)
        .bind(grant.user_id)
        .bind(grant.level.as_i16())
        .bind(grant.granted_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, format!("grant {}/{}", grant.file_id, grant.user_id))
        })?;
        row.try_into()
    }

    async fn delete_grant(&self, file_id: FileId, user_id: UserId) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM file_permissions WHERE file_id = $1 AND user_id = $2")
                .bind(file_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("grant {}/{}", file_id, user_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for PostgresStore {
    async fn list_rows(&self, file_id: FileId) -> StoreResult<Vec<Row>> {
        let rows = sqlx::query_as::<_, DbRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM file_data WHERE file_id = $1 ORDER BY id"
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Row::try_from).collect()
    }

    async fn get_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<Option<Row>> {
        let row = sqlx::query_as::<_, DbRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM file_data WHERE file_id = $1 AND id = $2"
        ))
        .bind(file_id)
        .bind(row_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Row::try_from).transpose()
    }

    async fn insert_row(&self, file_id: FileId, values: RowValues) -> StoreResult<Row> {
        let row = sqlx::query_as::<_, DbRow>(&format!(
            "INSERT INTO file_data (file_id, row_data) VALUES ($1, $2::json) \
             RETURNING {ROW_COLUMNS}"
        ))
        .bind(file_id)
        .bind(encode_values(&values)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, format!("file {}", file_id)))?;
        row.try_into()
    }

    async fn update_row(
        &self,
        file_id: FileId,
        row_id: RowId,
        values: RowValues,
    ) -> StoreResult<Row> {
        let row = sqlx::query_as::<_, DbRow>(&format!(
            "UPDATE file_data SET row_data = $3::json, updated_at = NOW() \
             WHERE file_id = $1 AND id = $2 RETURNING {ROW_COLUMNS}"
        ))
        .bind(file_id)
        .bind(row_id)
        .bind(encode_values(&values)?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("row {}/{}", file_id, row_id)))?;
        row.try_into()
    }

    async fn delete_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM file_data WHERE file_id = $1 AND id = $2")
            .bind(file_id)
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("row {}/{}", file_id, row_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PostgresStore {
    async fn append(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        let row = sqlx::query_as::<_, DbAuditEntry>(&format!(
            "INSERT INTO audit_logs \
             (actor_id, action, entity_type, entity_id, file_id, row_id, field, old_value, new_value, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {AUDIT_COLUMNS}"
        ))
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(entry.file_id)
        .bind(entry.row_id)
        .bind(&entry.field)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(entry.metadata.clone().map(Json))
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn history(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, DbAuditEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs \
             WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY created_at DESC, id DESC LIMIT $3"
        ))
        .bind(entity_type.as_str())
        .bind(entity_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, DbAuditEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}
