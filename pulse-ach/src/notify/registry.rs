//! Live connection registry
//!
//! Tracks every live client connection, indexed by user. Owned by the
//! server process and shared by the notification channel and the WebSocket
//! handler; nothing here is global.

use pulse_common::models::UserId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identifier of one client connection
pub type ConnectionId = Uuid;

/// Per-connection lifecycle
///
/// Transitions only move forward: `Connecting -> Open -> Closing -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

struct Subscriber {
    state: ConnectionState,
    outbound: mpsc::Sender<String>,
}

#[derive(Default)]
struct Inner {
    by_user: HashMap<UserId, HashMap<ConnectionId, Subscriber>>,
    owners: HashMap<ConnectionId, UserId>,
}

/// Registry of live connections
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
    buffer: usize,
}

impl ConnectionRegistry {
    /// `buffer` bounds each connection's outbound queue
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            buffer: buffer.max(1),
        }
    }

    // A panic while holding the lock cannot leave the maps half-updated, so
    // a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection in `Connecting` state
    ///
    /// Returns the connection id and the receiving end of its outbound queue.
    pub fn register(&self, user_id: &UserId) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = Uuid::new_v4();
        let (outbound, receiver) = mpsc::channel(self.buffer);

        let mut inner = self.write();
        inner.by_user.entry(user_id.clone()).or_default().insert(
            id,
            Subscriber {
                state: ConnectionState::Connecting,
                outbound,
            },
        );
        inner.owners.insert(id, user_id.clone());
        debug!("Registered connection {} for user {}", id, user_id);

        (id, receiver)
    }

    /// Move a connection forward to `state`
    ///
    /// Returns false for unknown connections and backward transitions.
    pub fn advance(&self, id: ConnectionId, state: ConnectionState) -> bool {
        let mut inner = self.write();
        let Some(user_id) = inner.owners.get(&id).cloned() else {
            return false;
        };
        match inner
            .by_user
            .get_mut(&user_id)
            .and_then(|connections| connections.get_mut(&id))
        {
            Some(subscriber) if state > subscriber.state => {
                subscriber.state = state;
                true
            }
            _ => false,
        }
    }

    /// Drop a connection; returns false if it was not registered
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut inner = self.write();
        let Some(user_id) = inner.owners.remove(&id) else {
            return false;
        };
        if let Some(connections) = inner.by_user.get_mut(&user_id) {
            connections.remove(&id);
            if connections.is_empty() {
                inner.by_user.remove(&user_id);
            }
        }
        debug!("Removed connection {} for user {}", id, user_id);
        true
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        let inner = self.read();
        let user_id = inner.owners.get(&id)?;
        inner
            .by_user
            .get(user_id)
            .and_then(|connections| connections.get(&id))
            .map(|subscriber| subscriber.state)
    }

    /// Outbound queues of a user's `Open` connections
    pub fn open_senders(&self, user_id: &UserId) -> Vec<(ConnectionId, mpsc::Sender<String>)> {
        self.read()
            .by_user
            .get(user_id)
            .map(|connections| {
                connections
                    .iter()
                    .filter(|(_, subscriber)| subscriber.state == ConnectionState::Open)
                    .map(|(id, subscriber)| (*id, subscriber.outbound.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connections of any state for a user
    pub fn user_connection_count(&self, user_id: &UserId) -> usize {
        self.read().by_user.get(user_id).map_or(0, HashMap::len)
    }

    /// Connections of any state across all users
    pub fn connection_count(&self) -> usize {
        self.read().owners.len()
    }
}
