use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::{events::ServerEvent, rooms::RoomMembership};

pub type ConnectionKey = Uuid;
pub type ConnectionSender = mpsc::UnboundedSender<ServerEvent>;

const PRESENCE_CHANNEL_CAPACITY: usize = 64;

/// One live transport session. Cheap to clone; the identifier never changes
/// for the life of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    key: ConnectionKey,
    user_id: String,
    username: Option<String>,
}

impl ConnectionHandle {
    pub fn key(&self) -> ConnectionKey {
        self.key
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Display name given at admission, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnlineUser {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: Option<String>,
    pub key: ConnectionKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceChange {
    Admitted(ConnectionHandle),
    Removed(ConnectionHandle),
}

struct Entry {
    handle: ConnectionHandle,
    tx: ConnectionSender,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionKey, Entry>,
    by_user: HashMap<String, HashSet<ConnectionKey>>,
    rooms: RoomMembership,
}

/// Who is online, and which rooms each of their connections joined.
///
/// All state sits behind one lock, so an admit racing a remove always leaves
/// either the whole entry or none of it.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<Inner>>,
    changes: broadcast::Sender<PresenceChange>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_identifier(user_id: Option<&str>) -> AppResult<&str> {
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(AppError::InvalidIdentifier),
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            changes: broadcast::channel(PRESENCE_CHANNEL_CAPACITY).0,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new connection for `user_id` and hands back the queue its
    /// writer drains.
    pub fn admit(
        &self,
        user_id: &str,
        username: Option<&str>,
    ) -> AppResult<(ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>)> {
        let user_id = validate_identifier(Some(user_id))?;
        let username = username.map(str::trim).filter(|name| !name.is_empty());

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle {
            key: Uuid::now_v7(),
            user_id: user_id.to_owned(),
            username: username.map(str::to_owned),
        };

        let connections = {
            let mut inner = self.write();
            inner.connections.insert(handle.key, Entry { handle: handle.clone(), tx });
            let keys = inner.by_user.entry(handle.user_id.clone()).or_default();
            keys.insert(handle.key);
            keys.len()
        };

        tracing::debug!(user_id = %handle.user_id, key = %handle.key, connections, "connection admitted");
        let _ = self.changes.send(PresenceChange::Admitted(handle.clone()));
        Ok((handle, rx))
    }

    /// Idempotent. Returns whether anything was removed.
    pub fn remove(&self, handle: &ConnectionHandle) -> bool {
        let removed = {
            let mut inner = self.write();
            let Some(entry) = inner.connections.remove(&handle.key) else {
                return false;
            };
            if let Some(keys) = inner.by_user.get_mut(&entry.handle.user_id) {
                keys.remove(&handle.key);
                if keys.is_empty() {
                    inner.by_user.remove(&entry.handle.user_id);
                }
            }
            inner.rooms.drop_connection(handle.key);
            entry.handle
        };

        tracing::debug!(user_id = %removed.user_id, key = %removed.key, "connection removed");
        let _ = self.changes.send(PresenceChange::Removed(removed));
        true
    }

    /// Snapshot in admission order.
    pub fn list_online(&self) -> Vec<OnlineUser> {
        let mut online: Vec<_> = self
            .read()
            .connections
            .values()
            .map(|entry| OnlineUser {
                user_id: entry.handle.user_id.clone(),
                username: entry.handle.username.clone(),
                key: entry.handle.key,
            })
            .collect();
        online.sort_by_key(|user| user.key);
        online
    }

    /// Every live connection of `user_id`.
    pub fn lookup(&self, user_id: &str) -> Vec<ConnectionHandle> {
        let inner = self.read();
        let mut handles: Vec<_> = inner
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|key| inner.connections.get(key))
            .map(|entry| entry.handle.clone())
            .collect();
        handles.sort_by_key(|handle| handle.key);
        handles
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenceChange> {
        self.changes.subscribe()
    }

    /// Idempotent. Returns false if the connection is gone or was already a member.
    pub fn join(&self, handle: &ConnectionHandle, room: &str) -> bool {
        let mut inner = self.write();
        if !inner.connections.contains_key(&handle.key) {
            return false;
        }
        inner.rooms.join(handle.key, room)
    }

    pub fn members_of(&self, room: &str) -> Vec<ConnectionHandle> {
        let inner = self.read();
        let mut handles: Vec<_> = inner
            .rooms
            .members_of(room)
            .filter_map(|key| inner.connections.get(&key))
            .map(|entry| entry.handle.clone())
            .collect();
        handles.sort_by_key(|handle| handle.key);
        handles
    }

    pub fn rooms_of(&self, handle: &ConnectionHandle) -> Vec<String> {
        self.read().rooms.rooms_of(handle.key)
    }

    /// Queues `event` on each handle that is still connected. Handles that
    /// closed since they were resolved are skipped.
    pub fn deliver(&self, handles: &[ConnectionHandle], event: &ServerEvent) -> usize {
        let inner = self.read();
        handles
            .iter()
            .filter_map(|handle| inner.connections.get(&handle.key))
            .filter(|entry| entry.tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.read()
            .connections
            .values()
            .filter(|entry| entry.tx.send(event.clone()).is_ok())
            .count()
    }
}
