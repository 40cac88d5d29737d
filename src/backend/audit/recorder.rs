/**
 * Audit Recorder
 *
 * Append-only log of mutating actions and field-level row changes.
 *
 * Writes are fire-and-forget: `record` spawns the append onto the tokio
 * runtime and returns immediately. A failed append is logged with `warn!`
 * and dropped; the action being audited never fails because of it.
 */
use std::sync::Arc;

use serde_json::Value;

use crate::backend::store::{AuditStore, StoreResult};
use crate::shared::{
    AuditLogEntry, EntityType, FieldChange, FileId, NewAuditEntry, RowId, RowValues, UserId,
};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    default_limit: usize,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Limit used when a read accessor gets none; clamped to `[1, MAX_LIMIT]`.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    /// Fire-and-forget append.
    pub fn record(&self, entry: NewAuditEntry) {
        self.record_all(vec![entry]);
    }

    /// Fire-and-forget append of several entries, written in order.
    pub fn record_all(&self, entries: Vec<NewAuditEntry>) {
        if entries.is_empty() {
            return;
        }
        let store = self.store.clone();
        tokio::spawn(async move {
            for entry in entries {
                append_logged(store.as_ref(), entry).await;
            }
        });
    }

    /// One `UPDATE` entry per changed field between `old` and `new`.
    pub fn record_diff(
        &self,
        actor_id: UserId,
        file_id: FileId,
        row_id: RowId,
        old: &RowValues,
        new: &RowValues,
    ) -> Vec<FieldChange> {
        let changes = diff(old, new);
        self.record_all(
            changes
                .iter()
                .map(|change| NewAuditEntry::field_update(actor_id, file_id, row_id, change))
                .collect(),
        );
        changes
    }

    /// Entries for one entity, newest first.
    pub async fn history(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        limit: Option<i64>,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        self.store
            .history(entity_type, entity_id, self.clamp_limit(limit))
            .await
    }

    /// Latest entries across all entities, newest first.
    pub async fn recent_activity(&self, limit: Option<i64>) -> StoreResult<Vec<AuditLogEntry>> {
        self.store.recent(self.clamp_limit(limit)).await
    }

    pub fn clamp_limit(&self, limit: Option<i64>) -> usize {
        match limit {
            None => self.default_limit,
            Some(n) if n < 1 => 1,
            Some(n) => usize::try_from(n).unwrap_or(MAX_LIMIT).min(MAX_LIMIT),
        }
    }
}

async fn append_logged(store: &dyn AuditStore, entry: NewAuditEntry) {
    let action = entry.action;
    let entity = (entry.entity_type, entry.entity_id);
    if let Err(e) = store.append(entry).await {
        tracing::warn!(
            "[Audit] dropped {} entry for {} {}: {}",
            action.as_str(),
            entity.0,
            entity.1,
            e
        );
    }
}

/// Field-level changes between two row snapshots.
///
/// Absent and null fields compare as `""`; strings compare by content and
/// other values by their JSON text. Fields of `old` come first in their
/// order, then fields only present in `new`.
pub fn diff(old: &RowValues, new: &RowValues) -> Vec<FieldChange> {
    let old_fields = old.iter().map(|(field, value)| (field, Some(value), new.get(field)));
    let new_only = new
        .iter()
        .filter(|(field, _)| !old.contains_key(*field))
        .map(|(field, value)| (field, None, Some(value)));

    old_fields
        .chain(new_only)
        .filter_map(|(field, before, after)| {
            let old_value = render(before);
            let new_value = render(after);
            (old_value != new_value).then(|| FieldChange {
                field: field.clone(),
                old_value,
                new_value,
            })
        })
        .collect()
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
