/**
 * Live Collaboration Events
 *
 * This module defines the events pushed to every participant of a file's
 * room over the live stream: presence changes, row lock transitions and
 * row mutations made by other editors.
 *
 * Each event is serialized as JSON with a `type` tag; the same tag is used
 * as the Server-Sent Events `event:` name.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::access::Role;
use crate::shared::model::{FileId, RowId, RowValues, UserId};

/// Identifier of one live connection. A user may hold several.
pub type ConnectionId = Uuid;

/// One connection present in a file's room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// Owner of a row lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub user_id: UserId,
    pub username: String,
    pub connection_id: ConnectionId,
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    pub fn for_member(member: &ActiveUser) -> Self {
        Self {
            user_id: member.user_id,
            username: member.username.clone(),
            connection_id: member.connection_id,
            acquired_at: Utc::now(),
        }
    }
}

/// A currently held row lock, as listed by the presence endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLock {
    pub row_id: RowId,
    pub holder: LockHolder,
}

/// Event delivered to room members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollabEvent {
    /// First event on a new connection, sent to the joiner only.
    Welcome {
        connection_id: ConnectionId,
        file_id: FileId,
        locks: Vec<RowLock>,
    },
    /// Full current member set of the room.
    Presence {
        file_id: FileId,
        users: Vec<ActiveUser>,
    },
    LockGranted {
        file_id: FileId,
        row_id: RowId,
        holder: LockHolder,
    },
    /// Sent to the requester only when the row is held by someone else.
    LockDenied {
        file_id: FileId,
        row_id: RowId,
        holder: LockHolder,
    },
    LockReleased {
        file_id: FileId,
        row_id: RowId,
        holder: LockHolder,
        #[serde(default)]
        forced: bool,
    },
    RowUpdated {
        file_id: FileId,
        row_id: RowId,
        values: RowValues,
        updated_by: UserId,
    },
    RowDeleted {
        file_id: FileId,
        row_id: RowId,
        deleted_by: UserId,
    },
}

impl CollabEvent {
    /// Wire name of the event, identical to the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            CollabEvent::Welcome { .. } => "welcome",
            CollabEvent::Presence { .. } => "presence",
            CollabEvent::LockGranted { .. } => "lock_granted",
            CollabEvent::LockDenied { .. } => "lock_denied",
            CollabEvent::LockReleased { .. } => "lock_released",
            CollabEvent::RowUpdated { .. } => "row_updated",
            CollabEvent::RowDeleted { .. } => "row_deleted",
        }
    }

    pub fn file_id(&self) -> FileId {
        match self {
            CollabEvent::Welcome { file_id, .. }
            | CollabEvent::Presence { file_id, .. }
            | CollabEvent::LockGranted { file_id, .. }
            | CollabEvent::LockDenied { file_id, .. }
            | CollabEvent::LockReleased { file_id, .. }
            | CollabEvent::RowUpdated { file_id, .. }
            | CollabEvent::RowDeleted { file_id, .. } => *file_id,
        }
    }
}
