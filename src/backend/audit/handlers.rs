/**
 * Audit Handlers
 *
 * Read-only views over the audit log. Both routes are admin-only through
 * the `ViewAudit` capability.
 *
 * - `GET /api/audit/recent?limit=N` - latest entries across all entities
 * - `GET /api/audit/{entity_type}/{entity_id}?limit=N` - history of one entity
 */
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::backend::access::RoleGate;
use crate::backend::audit::recorder::AuditRecorder;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::shared::{ApiResponse, AuditLogEntry, Capability, EntityType};

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn recent_activity(
    State(audit): State<AuditRecorder>,
    AuthUser(user): AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<AuditLogEntry>>>, BackendError> {
    RoleGate::require(&user, Capability::ViewAudit)?;
    let entries = audit.recent_activity(query.limit).await?;
    Ok(Json(ApiResponse::ok(entries)))
}

pub async fn entity_history(
    State(audit): State<AuditRecorder>,
    AuthUser(user): AuthUser,
    Path((entity_type, entity_id)): Path<(String, i64)>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<AuditLogEntry>>>, BackendError> {
    RoleGate::require(&user, Capability::ViewAudit)?;
    let entity_type: EntityType = entity_type.parse()?;
    let entries = audit
        .history(entity_type, entity_id, query.limit)
        .await?;
    Ok(Json(ApiResponse::ok(entries)))
}
