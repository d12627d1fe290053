//! Per-user notification fan-out
//!
//! `publish` is fire-and-forget: it never waits on a client. Each live
//! connection has a bounded outbound queue; a full queue drops the event for
//! that connection only.

use super::registry::{ConnectionId, ConnectionRegistry, ConnectionState};
use pulse_common::events::NotificationEvent;
use pulse_common::models::UserId;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Publish/subscribe channel keyed by user
#[derive(Clone)]
pub struct NotificationChannel {
    registry: Arc<ConnectionRegistry>,
}

impl NotificationChannel {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register a new connection for `user_id` in `Connecting` state
    ///
    /// The connection receives nothing until [`Subscription::open`].
    pub fn subscribe(&self, user_id: &UserId) -> Subscription {
        let (id, receiver) = self.registry.register(user_id);
        Subscription {
            id,
            user_id: user_id.clone(),
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Remove a connection; unknown ids are ignored
    pub fn unsubscribe(&self, id: ConnectionId) {
        self.registry.remove(id);
    }

    /// Deliver an event to every open connection of its user
    ///
    /// Returns the number of connections the event was queued for. Zero open
    /// connections is not an error: the event is dropped.
    pub fn publish(&self, event: &NotificationEvent) -> usize {
        let targets = self.registry.open_senders(&event.user_id);
        if targets.is_empty() {
            debug!(
                "No open connections for user {}, dropping {}",
                event.user_id,
                event.kind()
            );
            return 0;
        }

        let wire = match event.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                warn!("Failed to serialize {} notification: {}", event.kind(), e);
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, outbound) in targets {
            match outbound.try_send(wire.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Outbound queue full for connection {}, dropping {}",
                        id,
                        event.kind()
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} closed during publish", id);
                }
            }
        }

        debug!(
            "Published {} to {} connection(s) of user {}",
            event.kind(),
            delivered,
            event.user_id
        );
        delivered
    }
}

/// One registered connection
///
/// Dropping the subscription marks it `Closed` and unsubscribes it.
pub struct Subscription {
    id: ConnectionId,
    user_id: UserId,
    receiver: mpsc::Receiver<String>,
    registry: Arc<ConnectionRegistry>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Start receiving publishes
    pub fn open(&self) {
        self.registry.advance(self.id, ConnectionState::Open);
    }

    /// Stop receiving publishes ahead of teardown
    pub fn begin_close(&self) {
        self.registry.advance(self.id, ConnectionState::Closing);
    }

    pub fn state(&self) -> Option<ConnectionState> {
        self.registry.state(self.id)
    }

    /// Next serialized event queued for this connection
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Queued event, if any, without waiting
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.advance(self.id, ConnectionState::Closed);
        self.registry.remove(self.id);
    }
}
