/**
 * Live Collaboration Handlers
 *
 * This module exposes the coordinator over HTTP:
 *
 * - `GET /api/files/{file_id}/live` - Server-Sent Events stream. The first
 *   event is `welcome` carrying the connection id; dropping the stream is the
 *   disconnect signal and releases every lock the connection held.
 * - `POST /api/files/{file_id}/live/{conn_id}` - commands for that
 *   connection: `lock`, `unlock`, `update_row`, `leave`.
 * - `GET /api/files/{file_id}/presence` - current members and locks.
 * - `DELETE /api/files/{file_id}/locks/{row_id}` - admin force-unlock.
 *
 * # Example Stream
 *
 * ```http
 * event: welcome
 * data: {"type":"welcome","connection_id":"...","file_id":3,"locks":[]}
 *
 * event: presence
 * data: {"type":"presence","file_id":3,"users":[...]}
 * ```
 */
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::backend::access::RoleGate;
use crate::backend::collab::state::{CollabState, LockOutcome, ReleaseOutcome};
use crate::backend::error::BackendError;
use crate::backend::files::rows::apply_row_update;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::{
    ActiveUser, ApiResponse, AuditAction, Capability, CollabEvent, ConnectionId, EntityType,
    FileId, LockHolder, NewAuditEntry, PermissionLevel, Row, RowId, RowLock, RowValues,
};

/// Command posted by a live client for its own connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveCommand {
    Lock { row_id: RowId },
    Unlock { row_id: RowId },
    UpdateRow { row_id: RowId, values: RowValues },
    Leave,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandResult {
    Granted { holder: LockHolder },
    AlreadyHeld { holder: LockHolder },
    AlreadyLocked { holder: LockHolder },
    Released,
    NotHolder { holder: LockHolder },
    NotLocked,
    Updated { row: Row },
    Left { released: Vec<RowId> },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresenceSnapshot {
    pub users: Vec<ActiveUser>,
    pub locks: Vec<RowLock>,
}

/// Leaves the room when the live stream is dropped.
struct PresenceGuard {
    collab: Arc<CollabState>,
    file_id: FileId,
    connection_id: ConnectionId,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        if self.collab.leave(self.file_id, self.connection_id).is_some() {
            tracing::debug!(
                "[Collab] Stream for {} closed, connection removed",
                self.connection_id
            );
        }
    }
}

struct LiveSession {
    rx: mpsc::UnboundedReceiver<CollabEvent>,
    _guard: PresenceGuard,
}

/// Open the live stream for a file (GET /api/files/{file_id}/live)
pub async fn open_live_stream(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<FileId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, BackendError> {
    RoleGate::require(&user, Capability::ReadFiles)?;
    state
        .access
        .resolve(&user, file_id, PermissionLevel::Read)
        .await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = state.collab.join(file_id, &user, Box::new(tx));
    let session = LiveSession {
        rx,
        _guard: PresenceGuard {
            collab: state.collab.clone(),
            file_id,
            connection_id,
        },
    };

    let stream = stream::unfold(session, |mut session| async move {
        loop {
            let event = session.rx.recv().await?;
            match Event::default().event(event.name()).json_data(&event) {
                Ok(sse_event) => return Some((Ok::<_, Infallible>(sse_event), session)),
                Err(e) => {
                    tracing::error!("[Collab] Failed to encode {} event: {}", event.name(), e);
                    continue;
                }
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    ))
}

/// Apply a command for one live connection (POST /api/files/{file_id}/live/{conn_id})
///
/// The connection must belong to the caller. Lock and row updates need
/// write access to the file; everything else needs read access.
pub async fn handle_live_command(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((file_id, connection_id)): Path<(FileId, ConnectionId)>,
    body: Result<Json<LiveCommand>, JsonRejection>,
) -> Result<Json<ApiResponse<CommandResult>>, BackendError> {
    let Json(command) = body?;
    RoleGate::require(&user, Capability::ReadFiles)?;

    let owned = state
        .collab
        .member(file_id, connection_id)
        .is_some_and(|member| member.user_id == user.id);
    if !owned {
        return Err(connection_not_found(connection_id));
    }

    let result = match command {
        LiveCommand::Lock { row_id } => {
            RoleGate::require(&user, Capability::WriteRows)?;
            state
                .access
                .resolve(&user, file_id, PermissionLevel::Write)
                .await?;
            match state.collab.acquire(file_id, connection_id, row_id) {
                LockOutcome::Granted(holder) => CommandResult::Granted { holder },
                LockOutcome::AlreadyHeld(holder) => CommandResult::AlreadyHeld { holder },
                LockOutcome::AlreadyLocked { holder } => CommandResult::AlreadyLocked { holder },
                LockOutcome::NotMember => return Err(connection_not_found(connection_id)),
            }
        }
        LiveCommand::Unlock { row_id } => {
            match state.collab.release(file_id, connection_id, row_id) {
                ReleaseOutcome::Released => CommandResult::Released,
                ReleaseOutcome::NotHolder { holder } => CommandResult::NotHolder { holder },
                ReleaseOutcome::NotLocked => CommandResult::NotLocked,
                ReleaseOutcome::NotMember => return Err(connection_not_found(connection_id)),
            }
        }
        LiveCommand::UpdateRow { row_id, values } => {
            RoleGate::require(&user, Capability::WriteRows)?;
            let row =
                apply_row_update(&state, &user, file_id, row_id, values, Some(connection_id))
                    .await?;
            CommandResult::Updated { row }
        }
        LiveCommand::Leave => CommandResult::Left {
            released: state
                .collab
                .leave(file_id, connection_id)
                .unwrap_or_default(),
        },
    };

    Ok(Json(ApiResponse::ok(result)))
}

/// Members and locks of a file's room (GET /api/files/{file_id}/presence)
pub async fn get_presence(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<FileId>,
) -> Result<Json<ApiResponse<PresenceSnapshot>>, BackendError> {
    RoleGate::require(&user, Capability::ReadFiles)?;
    state
        .access
        .resolve(&user, file_id, PermissionLevel::Read)
        .await?;

    Ok(Json(ApiResponse::ok(PresenceSnapshot {
        users: state.collab.active_users(file_id),
        locks: state.collab.locks(file_id),
    })))
}

/// Admin override for a stuck lock (DELETE /api/files/{file_id}/locks/{row_id})
pub async fn force_unlock(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((file_id, row_id)): Path<(FileId, RowId)>,
) -> Result<Json<ApiResponse<LockHolder>>, BackendError> {
    RoleGate::require(&user, Capability::ForceUnlock)?;
    state
        .access
        .resolve(&user, file_id, PermissionLevel::Admin)
        .await?;

    let holder = state
        .collab
        .force_release(file_id, row_id)
        .ok_or_else(|| BackendError::not_found(format!("Row {} is not locked", row_id)))?;

    state.audit.record(
        NewAuditEntry::new(Some(user.id), AuditAction::ForceUnlock, EntityType::Row, row_id)
            .in_file(file_id)
            .on_row(row_id)
            .with_metadata(serde_json::json!({
                "holder_id": holder.user_id,
                "holder": holder.username,
            })),
    );
    tracing::info!(
        "[Collab] {} force-unlocked row {}/{} held by {}",
        user.username,
        file_id,
        row_id,
        holder.username
    );

    Ok(Json(ApiResponse::ok(holder)))
}

fn connection_not_found(connection_id: ConnectionId) -> BackendError {
    BackendError::not_found(format!("Connection {} not found", connection_id))
}
