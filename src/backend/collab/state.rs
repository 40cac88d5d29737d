/**
 * Presence and Row-Lock Coordination
 *
 * This module keeps one room per open file: who is connected, which rows
 * they hold, and the sink each connection receives events on.
 *
 * # Locking
 *
 * Rooms live in a fixed array of shards keyed by file id. Joining, leaving
 * and write reservations take the shard write lock because they may create
 * or drop a room; every other operation takes the shard read lock and then
 * the room mutex.
 * Two requests on the same file therefore serialize on that file's mutex,
 * while different files only share a shard read lock.
 *
 * Nothing here awaits. Sinks are unbounded channels, so delivery under the
 * room mutex never blocks.
 *
 * # Row writes
 *
 * A row write reserves its row under the room mutex before touching the
 * store and keeps the reservation until the store call returns. While a
 * reservation is pending, `acquire` by any other user is denied with the
 * writer as holder. A room with pending writes stays alive even with no
 * members.
 */
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::shared::{
    ActiveUser, CollabEvent, ConnectionId, FileId, LockHolder, RowId, RowLock, RowValues, User,
    UserId,
};

const SHARD_COUNT: usize = 16;

/// Receiving side of one live connection was dropped.
#[derive(Debug, Error)]
#[error("event sink is closed")]
pub struct DeliveryError;

/// Per-connection event delivery.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &CollabEvent) -> Result<(), DeliveryError>;
}

impl EventSink for mpsc::UnboundedSender<CollabEvent> {
    fn deliver(&self, event: &CollabEvent) -> Result<(), DeliveryError> {
        self.send(event.clone()).map_err(|_| DeliveryError)
    }
}

/// Result of a lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Granted(LockHolder),
    /// The requesting connection already holds the row; nothing is broadcast.
    AlreadyHeld(LockHolder),
    AlreadyLocked { holder: LockHolder },
    NotMember,
}

/// Result of a release request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotHolder { holder: LockHolder },
    NotLocked,
    NotMember,
}

struct Member {
    user: ActiveUser,
    sink: Box<dyn EventSink>,
}

struct PendingWrite {
    id: u64,
    row_id: RowId,
    writer: LockHolder,
}

#[derive(Default)]
struct Room {
    members: Vec<Member>,
    locks: BTreeMap<RowId, LockHolder>,
    writes: Vec<PendingWrite>,
}

impl Room {
    fn is_idle(&self) -> bool {
        self.members.is_empty() && self.writes.is_empty()
    }

    /// Pending writer on `row_id` that is not `user_id`.
    fn foreign_writer(&self, row_id: RowId, user_id: UserId) -> Option<&LockHolder> {
        self.writes
            .iter()
            .find(|w| w.row_id == row_id && w.writer.user_id != user_id)
            .map(|w| &w.writer)
    }

    fn member(&self, connection_id: ConnectionId) -> Option<&ActiveUser> {
        self.members
            .iter()
            .find(|m| m.user.connection_id == connection_id)
            .map(|m| &m.user)
    }

    fn active_users(&self) -> Vec<ActiveUser> {
        self.members.iter().map(|m| m.user.clone()).collect()
    }

    fn lock_list(&self) -> Vec<RowLock> {
        self.locks
            .iter()
            .map(|(row_id, holder)| RowLock {
                row_id: *row_id,
                holder: holder.clone(),
            })
            .collect()
    }

    fn presence(&self, file_id: FileId) -> CollabEvent {
        CollabEvent::Presence {
            file_id,
            users: self.active_users(),
        }
    }

    fn send_to(&self, connection_id: ConnectionId, event: &CollabEvent) {
        if let Some(member) = self
            .members
            .iter()
            .find(|m| m.user.connection_id == connection_id)
        {
            deliver(member, event);
        }
    }

    /// Deliver to every member except `skip`.
    fn broadcast(&self, event: &CollabEvent, skip: Option<ConnectionId>) {
        for member in &self.members {
            if Some(member.user.connection_id) != skip {
                deliver(member, event);
            }
        }
    }
}

fn deliver(member: &Member, event: &CollabEvent) {
    if member.sink.deliver(event).is_err() {
        tracing::debug!(
            "[Collab] Skipping closed sink for connection {} ({})",
            member.user.connection_id,
            event.name()
        );
    }
}

type RoomMap = HashMap<FileId, Arc<Mutex<Room>>>;

/// Reservation on a row for the duration of one store write.
///
/// Dropping it clears the reservation and drops the room if nothing else
/// keeps it alive.
#[must_use = "the reservation is released as soon as it is dropped"]
pub struct RowWriteGuard {
    collab: Arc<CollabState>,
    file_id: FileId,
    write_id: u64,
}

impl Drop for RowWriteGuard {
    fn drop(&mut self) {
        self.collab.finish_write(self.file_id, self.write_id);
    }
}

/// Presence and row-lock coordinator shared by every live connection.
pub struct CollabState {
    shards: [RwLock<RoomMap>; SHARD_COUNT],
    next_write: AtomicU64,
}

impl CollabState {
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
            next_write: AtomicU64::new(1),
        }
    }

    fn shard(&self, file_id: FileId) -> &RwLock<RoomMap> {
        // rem_euclid keeps negative ids in range
        &self.shards[file_id.rem_euclid(SHARD_COUNT as i64) as usize]
    }

    /// Run `f` on the room for `file_id` under its mutex, if the room exists.
    fn with_room<T>(&self, file_id: FileId, f: impl FnOnce(&mut Room) -> T) -> Option<T> {
        let rooms = self
            .shard(file_id)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let room = rooms.get(&file_id)?;
        let mut room = room.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut room))
    }

    /// Add a connection to the file's room.
    ///
    /// The joiner receives `welcome` with the current locks, then every
    /// member (joiner included) receives the new presence set.
    pub fn join(&self, file_id: FileId, user: &User, sink: Box<dyn EventSink>) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        let active = ActiveUser {
            connection_id,
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            joined_at: Utc::now(),
        };

        let mut rooms = self
            .shard(file_id)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let room = rooms.entry(file_id).or_default();
        let mut room = room.lock().unwrap_or_else(PoisonError::into_inner);

        room.members.push(Member { user: active, sink });
        room.send_to(
            connection_id,
            &CollabEvent::Welcome {
                connection_id,
                file_id,
                locks: room.lock_list(),
            },
        );
        room.broadcast(&room.presence(file_id), None);

        tracing::info!(
            "[Collab] {} joined file {} as {} ({} present)",
            user.username,
            file_id,
            connection_id,
            room.members.len()
        );
        connection_id
    }

    /// Remove a connection and free every lock it held.
    ///
    /// Emits one `lock_released` per freed row, then one `presence`. Returns
    /// the freed rows, or `None` if the connection was not in the room.
    pub fn leave(&self, file_id: FileId, connection_id: ConnectionId) -> Option<Vec<RowId>> {
        let mut rooms = self
            .shard(file_id)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let room_arc = rooms.get(&file_id)?.clone();
        let mut room = room_arc.lock().unwrap_or_else(PoisonError::into_inner);

        let position = room
            .members
            .iter()
            .position(|m| m.user.connection_id == connection_id)?;
        let member = room.members.remove(position);

        let freed: Vec<(RowId, LockHolder)> = {
            let rows: Vec<RowId> = room
                .locks
                .iter()
                .filter(|(_, holder)| holder.connection_id == connection_id)
                .map(|(row_id, _)| *row_id)
                .collect();
            rows.into_iter()
                .filter_map(|row_id| room.locks.remove(&row_id).map(|h| (row_id, h)))
                .collect()
        };

        for (row_id, holder) in &freed {
            room.broadcast(
                &CollabEvent::LockReleased {
                    file_id,
                    row_id: *row_id,
                    holder: holder.clone(),
                    forced: false,
                },
                None,
            );
        }
        room.broadcast(&room.presence(file_id), None);

        tracing::info!(
            "[Collab] {} left file {} ({} locks released, {} present)",
            member.user.username,
            file_id,
            freed.len(),
            room.members.len()
        );

        if room.is_idle() {
            drop(room);
            rooms.remove(&file_id);
            tracing::debug!("[Collab] Dropped empty room for file {}", file_id);
        }
        Some(freed.into_iter().map(|(row_id, _)| row_id).collect())
    }

    /// Request the lock on `row_id` for a connection.
    ///
    /// First writer wins. A row with a pending write by another user counts
    /// as held by that writer. A contested request leaves the room unchanged
    /// and sends `lock_denied` to the requester only.
    pub fn acquire(&self, file_id: FileId, connection_id: ConnectionId, row_id: RowId) -> LockOutcome {
        self.with_room(file_id, |room| {
            let Some(member) = room.member(connection_id).cloned() else {
                return LockOutcome::NotMember;
            };

            let contested = match room.locks.get(&row_id) {
                Some(holder) if holder.connection_id == connection_id => {
                    return LockOutcome::AlreadyHeld(holder.clone());
                }
                Some(holder) => Some(holder.clone()),
                None => room.foreign_writer(row_id, member.user_id).cloned(),
            };

            if let Some(holder) = contested {
                room.send_to(
                    connection_id,
                    &CollabEvent::LockDenied {
                        file_id,
                        row_id,
                        holder: holder.clone(),
                    },
                );
                tracing::debug!(
                    "[Collab] Row {}/{} denied to {}, held by {}",
                    file_id,
                    row_id,
                    member.username,
                    holder.username
                );
                return LockOutcome::AlreadyLocked { holder };
            }

            let holder = LockHolder::for_member(&member);
            room.locks.insert(row_id, holder.clone());
            room.broadcast(
                &CollabEvent::LockGranted {
                    file_id,
                    row_id,
                    holder: holder.clone(),
                },
                None,
            );
            tracing::debug!("[Collab] Row {}/{} locked by {}", file_id, row_id, member.username);
            LockOutcome::Granted(holder)
        })
        .unwrap_or(LockOutcome::NotMember)
    }

    /// Release a lock held by this connection.
    pub fn release(
        &self,
        file_id: FileId,
        connection_id: ConnectionId,
        row_id: RowId,
    ) -> ReleaseOutcome {
        self.with_room(file_id, |room| {
            if room.member(connection_id).is_none() {
                return ReleaseOutcome::NotMember;
            }
            match room.locks.get(&row_id) {
                None => ReleaseOutcome::NotLocked,
                Some(holder) if holder.connection_id != connection_id => ReleaseOutcome::NotHolder {
                    holder: holder.clone(),
                },
                Some(_) => {
                    if let Some(holder) = room.locks.remove(&row_id) {
                        room.broadcast(
                            &CollabEvent::LockReleased {
                                file_id,
                                row_id,
                                holder,
                                forced: false,
                            },
                            None,
                        );
                    }
                    ReleaseOutcome::Released
                }
            }
        })
        .unwrap_or(ReleaseOutcome::NotMember)
    }

    /// Drop a lock regardless of holder. Returns the previous holder.
    pub fn force_release(&self, file_id: FileId, row_id: RowId) -> Option<LockHolder> {
        self.with_room(file_id, |room| {
            let holder = room.locks.remove(&row_id)?;
            room.broadcast(
                &CollabEvent::LockReleased {
                    file_id,
                    row_id,
                    holder: holder.clone(),
                    forced: true,
                },
                None,
            );
            tracing::info!(
                "[Collab] Row {}/{} force-released from {}",
                file_id,
                row_id,
                holder.username
            );
            Some(holder)
        })
        .flatten()
    }

    /// Free the lock on a row that no longer exists.
    ///
    /// Emits `lock_released` (not forced) if the row was held.
    pub fn drop_row_lock(&self, file_id: FileId, row_id: RowId) -> Option<LockHolder> {
        self.with_room(file_id, |room| {
            let holder = room.locks.remove(&row_id)?;
            room.broadcast(
                &CollabEvent::LockReleased {
                    file_id,
                    row_id,
                    holder: holder.clone(),
                    forced: false,
                },
                None,
            );
            tracing::debug!(
                "[Collab] Row {}/{} deleted while held by {}",
                file_id,
                row_id,
                holder.username
            );
            Some(holder)
        })
        .flatten()
    }

    /// Close the room of a deleted file.
    ///
    /// Every held lock is released with a `lock_released` event, then the
    /// room and its member sinks are dropped, which ends each live stream.
    /// Returns the rows that were held.
    pub fn close_room(&self, file_id: FileId) -> Vec<RowId> {
        let room = {
            let mut rooms = self
                .shard(file_id)
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            match rooms.remove(&file_id) {
                Some(room) => room,
                None => return Vec::new(),
            }
        };
        let mut room = room.lock().unwrap_or_else(PoisonError::into_inner);

        let locks = std::mem::take(&mut room.locks);
        for (row_id, holder) in &locks {
            room.broadcast(
                &CollabEvent::LockReleased {
                    file_id,
                    row_id: *row_id,
                    holder: holder.clone(),
                    forced: false,
                },
                None,
            );
        }
        let members = std::mem::take(&mut room.members);

        tracing::info!(
            "[Collab] Closed room for deleted file {} ({} locks released, {} disconnected)",
            file_id,
            locks.len(),
            members.len()
        );
        locks.into_keys().collect()
    }

    /// Reserve a row for one store write by `user`.
    ///
    /// Rejected with the holder when a different user holds the row's lock.
    /// Otherwise the reservation is recorded under the room mutex and lasts
    /// until the returned guard is dropped, so no other user can acquire the
    /// row while the write is in flight.
    pub fn reserve_row_write(
        self: &Arc<Self>,
        file_id: FileId,
        row_id: RowId,
        user: &User,
        origin: Option<ConnectionId>,
    ) -> Result<RowWriteGuard, LockHolder> {
        let mut rooms = self
            .shard(file_id)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let room = rooms.entry(file_id).or_default().clone();
        let mut room = room.lock().unwrap_or_else(PoisonError::into_inner);

        // A held lock implies a member, so the room is never left idle here.
        if let Some(holder) = room.locks.get(&row_id) {
            if holder.user_id != user.id {
                return Err(holder.clone());
            }
        }

        let write_id = self.next_write.fetch_add(1, Ordering::Relaxed);
        room.writes.push(PendingWrite {
            id: write_id,
            row_id,
            writer: LockHolder {
                user_id: user.id,
                username: user.username.clone(),
                connection_id: origin.unwrap_or_else(Uuid::nil),
                acquired_at: Utc::now(),
            },
        });
        Ok(RowWriteGuard {
            collab: Arc::clone(self),
            file_id,
            write_id,
        })
    }

    fn finish_write(&self, file_id: FileId, write_id: u64) {
        let mut rooms = self
            .shard(file_id)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(room) = rooms.get(&file_id).cloned() else {
            return;
        };
        let mut room = room.lock().unwrap_or_else(PoisonError::into_inner);
        room.writes.retain(|w| w.id != write_id);
        if room.is_idle() {
            drop(room);
            rooms.remove(&file_id);
        }
    }

    /// Send `row_updated` to every member except the originating connection.
    pub fn broadcast_row_update(
        &self,
        file_id: FileId,
        origin: Option<ConnectionId>,
        row_id: RowId,
        values: RowValues,
        updated_by: UserId,
    ) {
        self.with_room(file_id, |room| {
            room.broadcast(
                &CollabEvent::RowUpdated {
                    file_id,
                    row_id,
                    values,
                    updated_by,
                },
                origin,
            )
        });
    }

    pub fn broadcast_row_deleted(
        &self,
        file_id: FileId,
        origin: Option<ConnectionId>,
        row_id: RowId,
        deleted_by: UserId,
    ) {
        self.with_room(file_id, |room| {
            room.broadcast(
                &CollabEvent::RowDeleted {
                    file_id,
                    row_id,
                    deleted_by,
                },
                origin,
            )
        });
    }

    pub fn member(&self, file_id: FileId, connection_id: ConnectionId) -> Option<ActiveUser> {
        self.with_room(file_id, |room| room.member(connection_id).cloned())
            .flatten()
    }

    pub fn active_users(&self, file_id: FileId) -> Vec<ActiveUser> {
        self.with_room(file_id, |room| room.active_users())
            .unwrap_or_default()
    }

    pub fn locks(&self, file_id: FileId) -> Vec<RowLock> {
        self.with_room(file_id, |room| room.lock_list())
            .unwrap_or_default()
    }

    pub fn holder(&self, file_id: FileId, row_id: RowId) -> Option<LockHolder> {
        self.with_room(file_id, |room| room.locks.get(&row_id).cloned())
            .flatten()
    }

    /// Number of open rooms, counting rooms kept alive by a pending write.
    pub fn room_count(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }
}

impl Default for CollabState {
    fn default() -> Self {
        Self::new()
    }
}
