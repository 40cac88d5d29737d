//! In-memory implementation of every store trait.
//!
//! All state lives in one `tokio::sync::RwLock` so cascading deletes and id
//! assignment stay consistent. Nothing is durable; this backs the test suite
//! and runs without `DATABASE_URL`.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    AccountStore, AuditStore, FileStore, GrantUpdate, NewFile, RowStore, StoreError,
    StoreResult, UserRecord,
};
use crate::shared::{
    AuditLogEntry, EntityType, File, FileId, FilePermission, NewAuditEntry, Row, RowId,
    RowValues, User, UserId,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, UserRecord>,
    files: BTreeMap<FileId, File>,
    grants: BTreeMap<(FileId, UserId), FilePermission>,
    rows: BTreeMap<(FileId, RowId), Row>,
    audit: Vec<AuditLogEntry>,
    next_file_id: FileId,
    next_row_id: RowId,
    next_audit_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace an account.
    pub async fn insert_user(&self, record: UserRecord) {
        let mut state = self.state.write().await;
        state.users.insert(record.user.id, record);
    }

    /// Seed a file with a fixed id.
    pub async fn insert_file(&self, file: File) {
        let mut state = self.state.write().await;
        state.next_file_id = state.next_file_id.max(file.id);
        state.files.insert(file.id, file);
    }

    /// Seed a row with a fixed id.
    pub async fn insert_row_with_id(&self, file_id: FileId, row_id: RowId, values: RowValues) -> Row {
        let mut state = self.state.write().await;
        state.next_row_id = state.next_row_id.max(row_id);
        let row = Row {
            file_id,
            row_id,
            values,
            updated_at: Utc::now(),
        };
        state.rows.insert((file_id, row_id), row.clone());
        row
    }

    /// Every audit entry in insertion order.
    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state.read().await.audit.clone()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn load_active_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .get(&id)
            .filter(|record| record.is_usable())
            .map(|record| record.user.clone()))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|record| record.user.username == username)
            .cloned())
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn get_file(&self, id: FileId) -> StoreResult<Option<File>> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn get_grant(
        &self,
        file_id: FileId,
        user_id: UserId,
    ) -> StoreResult<Option<FilePermission>> {
        Ok(self
            .state
            .read()
            .await
            .grants
            .get(&(file_id, user_id))
            .cloned())
    }

    async fn list_files_for(
        &self,
        user_id: UserId,
    ) -> StoreResult<Vec<(File, Option<FilePermission>)>> {
        let state = self.state.read().await;
        Ok(state
            .files
            .values()
            .map(|file| {
                let grant = state.grants.get(&(file.id, user_id)).cloned();
                (file.clone(), grant)
            })
            .collect())
    }

    async fn create_file(&self, file: NewFile) -> StoreResult<File> {
        let mut state = self.state.write().await;
        state.next_file_id += 1;
        let created = File {
            id: state.next_file_id,
            name: file.name,
            department_id: file.department_id,
            created_by: file.created_by,
            created_at: Utc::now(),
        };
        state.files.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_file(&self, id: FileId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.files.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("file {}", id)));
        }
        state.grants.retain(|(file_id, _), _| *file_id != id);
        state.rows.retain(|(file_id, _), _| *file_id != id);
        Ok(())
    }

    async fn list_grants(&self, file_id: FileId) -> StoreResult<Vec<FilePermission>> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .range((file_id, UserId::MIN)..=(file_id, UserId::MAX))
            .map(|(_, grant)| grant.clone())
            .collect())
    }

    async fn upsert_grant(&self, grant: GrantUpdate) -> StoreResult<FilePermission> {
        let mut state = self.state.write().await;
        if !state.files.contains_key(&grant.file_id) {
            return Err(StoreError::NotFound(format!("file {}", grant.file_id)));
        }
        if !state.users.contains_key(&grant.user_id) {
            return Err(StoreError::NotFound(format!("user {}", grant.user_id)));
        }
        let permission = FilePermission {
            file_id: grant.file_id,
            user_id: grant.user_id,
            level: grant.level,
            granted_by: Some(grant.granted_by),
            granted_at: Utc::now(),
        };
        state
            .grants
            .insert((grant.file_id, grant.user_id), permission.clone());
        Ok(permission)
    }

    async fn delete_grant(&self, file_id: FileId, user_id: UserId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .grants
            .remove(&(file_id, user_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("grant {}/{}", file_id, user_id)))
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn list_rows(&self, file_id: FileId) -> StoreResult<Vec<Row>> {
        let state = self.state.read().await;
        Ok(state
            .rows
            .range((file_id, RowId::MIN)..=(file_id, RowId::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn get_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<Option<Row>> {
        Ok(self.state.read().await.rows.get(&(file_id, row_id)).cloned())
    }

    async fn insert_row(&self, file_id: FileId, values: RowValues) -> StoreResult<Row> {
        let mut state = self.state.write().await;
        if !state.files.contains_key(&file_id) {
            return Err(StoreError::NotFound(format!("file {}", file_id)));
        }
        state.next_row_id += 1;
        let row = Row {
            file_id,
            row_id: state.next_row_id,
            values,
            updated_at: Utc::now(),
        };
        state.rows.insert((file_id, row.row_id), row.clone());
        Ok(row)
    }

    async fn update_row(
        &self,
        file_id: FileId,
        row_id: RowId,
        values: RowValues,
    ) -> StoreResult<Row> {
        let mut state = self.state.write().await;
        let row = state
            .rows
            .get_mut(&(file_id, row_id))
            .ok_or_else(|| StoreError::NotFound(format!("row {}/{}", file_id, row_id)))?;
        row.values = values;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_row(&self, file_id: FileId, row_id: RowId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .rows
            .remove(&(file_id, row_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("row {}/{}", file_id, row_id)))
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        let mut state = self.state.write().await;
        state.next_audit_id += 1;
        let stored = AuditLogEntry::from_new(state.next_audit_id, entry, Utc::now());
        state.audit.push(stored.clone());
        Ok(stored)
    }

    async fn history(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|entry| entry.entity_type == entity_type && entry.entity_id == entity_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        let state = self.state.read().await;
        Ok(state.audit.iter().rev().take(limit).cloned().collect())
    }
}
