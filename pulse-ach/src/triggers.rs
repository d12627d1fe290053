//! Reconciliation triggers
//!
//! - [`ReconcileTrigger`]: reconciles a user after each record write seen on
//!   the event bus. Writes arriving while that user is being reconciled are
//!   folded into a single follow-up pass.
//! - [`SafetyNetSweep`]: periodically reconciles every user with history,
//!   catching anything a trigger missed, timed out on or failed.
//!
//! Both bound each reconciliation with a soft timeout. Failures are logged
//! and never propagate to the write path.

use crate::reconciler::{ReconcileOutcome, Reconciler};
use pulse_common::events::{EventBus, PulseEvent};
use pulse_common::models::UserId;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconcile one user, giving up after `timeout`
///
/// Returns `None` on timeout or error; both are logged.
pub async fn reconcile_bounded(
    reconciler: &Reconciler,
    user_id: &UserId,
    timeout: Duration,
) -> Option<ReconcileOutcome> {
    match tokio::time::timeout(timeout, reconciler.reconcile(user_id)).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(e)) => {
            warn!("Reconciliation failed for user {}: {}", user_id, e);
            None
        }
        Err(_) => {
            warn!(
                "Reconciliation for user {} exceeded {:?}, deferring to sweep",
                user_id, timeout
            );
            None
        }
    }
}

/// Users with a triggered reconcile running
///
/// The flag is set when another write for that user arrived during the run.
#[derive(Default)]
struct InFlight {
    users: Mutex<HashMap<UserId, bool>>,
}

impl InFlight {
    /// Returns `true` if the caller should start a reconcile for `user_id`
    fn claim(&self, user_id: &UserId) -> bool {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        match users.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(true);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(false);
                true
            }
        }
    }

    /// Returns `true` if writes arrived during the run and another pass is due
    fn finish(&self, user_id: &UserId) -> bool {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        match users.get_mut(user_id) {
            Some(rerun) if *rerun => {
                *rerun = false;
                true
            }
            _ => {
                users.remove(user_id);
                false
            }
        }
    }
}

/// Write-triggered reconciliation
pub struct ReconcileTrigger {
    reconciler: Arc<Reconciler>,
    events: broadcast::Receiver<PulseEvent>,
    timeout: Duration,
    in_flight: Arc<InFlight>,
}

impl ReconcileTrigger {
    /// Subscribes immediately so no write after construction is missed
    pub fn new(reconciler: Arc<Reconciler>, event_bus: &EventBus, timeout: Duration) -> Self {
        Self {
            reconciler,
            events: event_bus.subscribe(),
            timeout,
            in_flight: Arc::default(),
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Process events until cancelled or the bus closes
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!("Reconcile trigger started");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.events.recv() => event,
            };

            match event {
                Ok(PulseEvent::RecordWritten { user_id, kind, .. }) => {
                    if !self.in_flight.claim(&user_id) {
                        debug!(
                            "Record written ({:?}) for user {} during reconcile, queued one more pass",
                            kind, user_id
                        );
                        continue;
                    }
                    debug!("Record written ({:?}) for user {}, reconciling", kind, user_id);
                    let reconciler = Arc::clone(&self.reconciler);
                    let in_flight = Arc::clone(&self.in_flight);
                    let timeout = self.timeout;
                    // Writes for different users reconcile independently
                    tokio::spawn(async move {
                        loop {
                            reconcile_bounded(&reconciler, &user_id, timeout).await;
                            if !in_flight.finish(&user_id) {
                                break;
                            }
                        }
                    });
                }
                Ok(PulseEvent::AchievementEarned { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "Reconcile trigger lagged {} events; sweep will catch up",
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed");
                    break;
                }
            }
        }

        debug!("Reconcile trigger stopped");
    }
}

/// Totals from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub users: usize,
    pub newly_earned: usize,
    pub failed: usize,
}

/// Periodic reconciliation of every user with history
pub struct SafetyNetSweep {
    reconciler: Arc<Reconciler>,
    period: Duration,
    timeout: Duration,
}

impl SafetyNetSweep {
    pub fn new(reconciler: Arc<Reconciler>, period: Duration, timeout: Duration) -> Self {
        Self {
            reconciler,
            period,
            timeout,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Sweep every `period` until cancelled; the first sweep runs immediately
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Safety-net sweep every {:?}", self.period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if report.newly_earned > 0 || report.failed > 0 {
                        info!(
                            "Sweep: {} users, {} newly earned, {} failed",
                            report.users, report.newly_earned, report.failed
                        );
                    } else {
                        debug!("Sweep: {} users, nothing new", report.users);
                    }
                }
            }
        }

        debug!("Safety-net sweep stopped");
    }

    /// Reconcile every user once
    pub async fn sweep_once(&self) -> SweepReport {
        let users = match self.reconciler.history().users_with_history().await {
            Ok(users) => users,
            Err(e) => {
                warn!("Sweep could not list users: {}", e);
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            users: users.len(),
            ..Default::default()
        };
        for user_id in &users {
            match reconcile_bounded(&self.reconciler, user_id, self.timeout).await {
                Some(outcome) => report.newly_earned += outcome.newly_earned.len(),
                None => report.failed += 1,
            }
        }
        report
    }
}
