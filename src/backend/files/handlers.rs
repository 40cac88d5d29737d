/**
 * File Handlers
 *
 * - `GET /api/files` - files the caller can read
 * - `POST /api/files` - create a file in a department
 * - `DELETE /api/files/{file_id}` - delete a file with its rows and grants
 *
 * Non-admins create files in their own department only. Only the creator or
 * an admin may delete a file.
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::backend::access::RoleGate;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::backend::store::NewFile;
use crate::shared::{
    ApiResponse, AuditAction, Capability, DenyReason, DepartmentId, EntityType, File, FileId,
    NewAuditEntry, PermissionLevel, SharedError,
};

/// Create file request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateFileRequest {
    pub name: String,
    /// Defaults to the caller's department
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

/// List readable files (GET /api/files)
pub async fn list_files(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<File>>>, BackendError> {
    RoleGate::require(&user, Capability::ReadFiles)?;
    let files = state.access.readable_files(&user).await?;
    tracing::debug!("{} can read {} files", user.username, files.len());
    Ok(Json(ApiResponse::ok(files)))
}

/// Create a file (POST /api/files)
pub async fn create_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<CreateFileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<File>>), BackendError> {
    let Json(request) = body?;
    RoleGate::require(&user, Capability::CreateFiles)?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(SharedError::validation("name", "must not be empty").into());
    }

    let department_id = request
        .department_id
        .or(user.department_id)
        .ok_or_else(|| BackendError::bad_request("A department is required"))?;
    if !user.role.is_admin() && !user.in_department(department_id) {
        tracing::warn!(
            "[Access] {} tried to create a file in department {}",
            user.username,
            department_id
        );
        return Err(BackendError::forbidden(DenyReason::CrossDepartment));
    }

    let file = state
        .files
        .create_file(NewFile {
            name: name.to_string(),
            department_id,
            created_by: user.id,
        })
        .await?;

    state.audit.record(
        NewAuditEntry::new(Some(user.id), AuditAction::Create, EntityType::File, file.id)
            .in_file(file.id)
            .with_metadata(serde_json::json!({
                "name": file.name,
                "department_id": file.department_id,
            })),
    );
    tracing::info!("File {} ({}) created by {}", file.id, file.name, user.username);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(file))))
}

/// Delete a file (DELETE /api/files/{file_id})
pub async fn delete_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<FileId>,
) -> Result<Json<ApiResponse<FileId>>, BackendError> {
    RoleGate::require(&user, Capability::WriteRows)?;
    let file = state
        .access
        .resolve(&user, file_id, PermissionLevel::Read)
        .await?;
    if !user.role.is_admin() && file.created_by != user.id {
        return Err(BackendError::forbidden(DenyReason::InsufficientPermission));
    }

    state.files.delete_file(file_id).await?;
    state.collab.close_room(file_id);

    state.audit.record(
        NewAuditEntry::new(Some(user.id), AuditAction::Delete, EntityType::File, file_id)
            .in_file(file_id)
            .with_metadata(serde_json::json!({ "name": file.name })),
    );
    tracing::info!("File {} deleted by {}", file_id, user.username);

    Ok(Json(ApiResponse::ok(file_id)))
}
