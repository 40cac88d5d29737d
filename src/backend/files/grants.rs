/**
 * Grant Handlers
 *
 * Explicit per-user permissions on a file. Managing grants needs the
 * `ManageGrants` capability and `admin` level on the file.
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::backend::access::RoleGate;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::backend::store::GrantUpdate;
use crate::shared::{
    ApiResponse, AuditAction, Capability, EntityType, FileId, FilePermission, NewAuditEntry,
    PermissionLevel, User, UserId,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrantRequest {
    pub level: PermissionLevel,
}

async fn authorize_grant_admin(
    state: &AppState,
    user: &User,
    file_id: FileId,
) -> Result<(), BackendError> {
    RoleGate::require(user, Capability::ManageGrants)?;
    state
        .access
        .resolve(user, file_id, PermissionLevel::Admin)
        .await?;
    Ok(())
}

/// List grants on a file (GET /api/files/{file_id}/grants)
pub async fn list_grants(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<FileId>,
) -> Result<Json<ApiResponse<Vec<FilePermission>>>, BackendError> {
    authorize_grant_admin(&state, &user, file_id).await?;
    let grants = state.files.list_grants(file_id).await?;
    Ok(Json(ApiResponse::ok(grants)))
}

/// Create or replace a grant (PUT /api/files/{file_id}/grants/{user_id})
pub async fn put_grant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((file_id, target_id)): Path<(FileId, UserId)>,
    body: Result<Json<GrantRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<FilePermission>>, BackendError> {
    let Json(request) = body?;
    authorize_grant_admin(&state, &user, file_id).await?;

    let target = state
        .accounts
        .load_active_user(target_id)
        .await?
        .ok_or_else(|| BackendError::not_found(format!("User {} not found", target_id)))?;

    let grant = state
        .files
        .upsert_grant(GrantUpdate {
            file_id,
            user_id: target.id,
            level: request.level,
            granted_by: user.id,
        })
        .await?;

    state.audit.record(
        NewAuditEntry::new(Some(user.id), AuditAction::Grant, EntityType::Grant, target.id)
            .in_file(file_id)
            .with_metadata(serde_json::json!({ "level": request.level })),
    );
    tracing::info!(
        "[Access] {} granted {} on file {} to {}",
        user.username,
        request.level,
        file_id,
        target.username
    );

    Ok(Json(ApiResponse::ok(grant)))
}

/// Remove a grant (DELETE /api/files/{file_id}/grants/{user_id})
pub async fn delete_grant(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((file_id, target_id)): Path<(FileId, UserId)>,
) -> Result<Json<ApiResponse<UserId>>, BackendError> {
    authorize_grant_admin(&state, &user, file_id).await?;
    state.files.delete_grant(file_id, target_id).await?;

    state.audit.record(
        NewAuditEntry::new(Some(user.id), AuditAction::Revoke, EntityType::Grant, target_id)
            .in_file(file_id),
    );
    tracing::info!(
        "[Access] {} revoked grant on file {} from user {}",
        user.username,
        file_id,
        target_id
    );

    Ok(Json(ApiResponse::ok(target_id)))
}
