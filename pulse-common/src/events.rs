//! Event types for the Pulse event system
//!
//! Two families of events live here:
//! - [`PulseEvent`]: internal, process-local events carried by the [`EventBus`]
//!   (write-path notifications that drive reconciliation).
//! - [`NotificationEvent`]: per-user events pushed to connected browser clients.

use crate::models::{AchievementRecord, MetricSample, UserId};
use crate::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Which kind of record a write touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Metric,
    Workout,
    Meal,
    MedicationDose,
    Goal,
    Profile,
}

/// Internal Pulse event types
///
/// Broadcast via [`EventBus`]; every subscriber sees every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PulseEvent {
    /// A record for a user was persisted by the CRUD write path
    ///
    /// Triggers:
    /// - Reconcile trigger: re-evaluate that user's achievements
    RecordWritten {
        user_id: UserId,
        kind: RecordKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A badge was appended to a user's ledger
    ///
    /// Emitted once per successful ledger insert, after the client
    /// notification has been handed to the notification channel.
    AchievementEarned {
        user_id: UserId,
        badge_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution for a Pulse process
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lag and
/// lose the oldest events rather than blocking emitters.
pub struct EventBus {
    tx: broadcast::Sender<PulseEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use pulse_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// assert_eq!(event_bus.capacity(), 1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PulseEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PulseEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<PulseEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PulseEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// Client notifications
// ============================================================================

/// Wire body of a client notification
///
/// Serializes to the JSON shapes the browser client expects:
/// - `{"type":"health_metric_update","metric":{...}}`
/// - `{"type":"achievement_earned","achievement":{"badgeId":...,"earnedAt":...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationPayload {
    #[serde(rename = "health_metric_update")]
    MetricUpdate { metric: MetricSample },

    #[serde(rename = "achievement_earned")]
    AchievementEarned { achievement: AchievementRecord },
}

/// A notification addressed to every live connection of one user
///
/// Transient: never persisted, dropped when the user has no open connection.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub user_id: UserId,
    pub payload: NotificationPayload,
}

impl NotificationEvent {
    pub fn metric_update(metric: MetricSample) -> Self {
        Self {
            user_id: metric.user_id.clone(),
            payload: NotificationPayload::MetricUpdate { metric },
        }
    }

    pub fn achievement_earned(achievement: AchievementRecord) -> Self {
        Self {
            user_id: achievement.user_id.clone(),
            payload: NotificationPayload::AchievementEarned { achievement },
        }
    }

    /// Wire type tag, for logging
    pub fn kind(&self) -> &'static str {
        match self.payload {
            NotificationPayload::MetricUpdate { .. } => "health_metric_update",
            NotificationPayload::AchievementEarned { .. } => "achievement_earned",
        }
    }

    /// Serialize the payload into the JSON text sent over the socket
    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.payload)?)
    }
}
