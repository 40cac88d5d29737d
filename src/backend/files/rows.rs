/**
 * Row Handlers
 *
 * CRUD over a file's rows. Every write is checked against the permission
 * engine, then against the row lock table, and is audited and broadcast to
 * the file's live room after it is persisted.
 *
 * # Write Path
 *
 * 1. Role gate (`WriteRows`) and file permission (`write`)
 * 2. Row reservation: a row held by another user rejects with `ROW_LOCKED`;
 *    otherwise the row is reserved so no other user can lock it mid-write
 * 3. Store write, then the reservation is dropped
 * 4. Audit (fire-and-forget) and `row_updated` / `row_deleted` fan-out
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::backend::access::RoleGate;
use crate::backend::collab::RowWriteGuard;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::{
    ApiResponse, AuditAction, Capability, ConnectionId, EntityType, FileId, NewAuditEntry,
    PermissionLevel, Row, RowId, RowValues, User,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RowRequest {
    pub values: RowValues,
}

/// List a file's rows (GET /api/files/{file_id}/rows)
pub async fn list_rows(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<FileId>,
) -> Result<Json<ApiResponse<Vec<Row>>>, BackendError> {
    RoleGate::require(&user, Capability::ReadFiles)?;
    state
        .access
        .resolve(&user, file_id, PermissionLevel::Read)
        .await?;

    let rows = state.rows.list_rows(file_id).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// Append a row (POST /api/files/{file_id}/rows)
pub async fn create_row(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<FileId>,
    body: Result<Json<RowRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Row>>), BackendError> {
    let Json(request) = body?;
    RoleGate::require(&user, Capability::WriteRows)?;
    state
        .access
        .resolve(&user, file_id, PermissionLevel::Write)
        .await?;

    let row = state.rows.insert_row(file_id, request.values).await?;

    state.audit.record(
        NewAuditEntry::new(Some(user.id), AuditAction::Create, EntityType::Row, row.row_id)
            .in_file(file_id)
            .on_row(row.row_id)
            .with_metadata(serde_json::Value::Object(row.values.clone())),
    );
    state
        .collab
        .broadcast_row_update(file_id, None, row.row_id, row.values.clone(), user.id);

    tracing::info!("Row {}/{} created by {}", file_id, row.row_id, user.username);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(row))))
}

/// Replace a row's values (PUT /api/files/{file_id}/rows/{row_id})
pub async fn update_row(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((file_id, row_id)): Path<(FileId, RowId)>,
    body: Result<Json<RowRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Row>>, BackendError> {
    let Json(request) = body?;
    RoleGate::require(&user, Capability::WriteRows)?;

    let row = apply_row_update(&state, &user, file_id, row_id, request.values, None).await?;
    Ok(Json(ApiResponse::ok(row)))
}

/// Delete a row (DELETE /api/files/{file_id}/rows/{row_id})
pub async fn delete_row(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((file_id, row_id)): Path<(FileId, RowId)>,
) -> Result<Json<ApiResponse<RowId>>, BackendError> {
    RoleGate::require(&user, Capability::WriteRows)?;
    state
        .access
        .resolve(&user, file_id, PermissionLevel::Write)
        .await?;
    let reservation = reserve_row(&state, file_id, row_id, &user, None)?;

    let old = state
        .rows
        .get_row(file_id, row_id)
        .await?
        .ok_or_else(|| row_not_found(file_id, row_id))?;
    state.rows.delete_row(file_id, row_id).await?;
    state.collab.drop_row_lock(file_id, row_id);
    drop(reservation);

    state.audit.record(
        NewAuditEntry::new(Some(user.id), AuditAction::Delete, EntityType::Row, row_id)
            .in_file(file_id)
            .on_row(row_id)
            .with_metadata(serde_json::Value::Object(old.values)),
    );
    state
        .collab
        .broadcast_row_deleted(file_id, None, row_id, user.id);

    tracing::info!("Row {}/{} deleted by {}", file_id, row_id, user.username);
    Ok(Json(ApiResponse::ok(row_id)))
}

/// Write path shared by the REST update and the live `update_row` command.
///
/// `origin` is the live connection that made the change; it does not receive
/// its own `row_updated` event.
pub async fn apply_row_update(
    state: &AppState,
    user: &User,
    file_id: FileId,
    row_id: RowId,
    values: RowValues,
    origin: Option<ConnectionId>,
) -> Result<Row, BackendError> {
    state
        .access
        .resolve(user, file_id, PermissionLevel::Write)
        .await?;
    let reservation = reserve_row(state, file_id, row_id, user, origin)?;

    let old = state
        .rows
        .get_row(file_id, row_id)
        .await?
        .ok_or_else(|| row_not_found(file_id, row_id))?;
    let row = state.rows.update_row(file_id, row_id, values).await?;
    drop(reservation);

    let changes = state
        .audit
        .record_diff(user.id, file_id, row_id, &old.values, &row.values);
    state
        .collab
        .broadcast_row_update(file_id, origin, row_id, row.values.clone(), user.id);

    tracing::debug!(
        "Row {}/{} updated by {} ({} fields changed)",
        file_id,
        row_id,
        user.username,
        changes.len()
    );
    Ok(row)
}

fn reserve_row(
    state: &AppState,
    file_id: FileId,
    row_id: RowId,
    user: &User,
    origin: Option<ConnectionId>,
) -> Result<RowWriteGuard, BackendError> {
    state
        .collab
        .reserve_row_write(file_id, row_id, user, origin)
        .map_err(|holder| {
            tracing::warn!(
                "[Collab] Write to row {}/{} by {} rejected, locked by {}",
                file_id,
                row_id,
                user.username,
                holder.username
            );
            BackendError::RowLocked { row_id, holder }
        })
}

fn row_not_found(file_id: FileId, row_id: RowId) -> BackendError {
    BackendError::not_found(format!("Row {} not found in file {}", row_id, file_id))
}
