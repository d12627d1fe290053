//! Integration tests for write-triggered and periodic reconciliation
//!
//! Covers:
//! - Reconciles started by record writes on the event bus
//! - Folding a burst of writes for one user into a single follow-up pass
//! - Timed-out reconciles being picked up by the periodic sweep

use async_trait::async_trait;
use chrono::Utc;
use pulse_ach::catalog::BadgeCatalog;
use pulse_ach::db;
use pulse_ach::evaluator::UserHistory;
use pulse_ach::history::{HistorySource, SqliteHistory};
use pulse_ach::ledger::{InsertOutcome, Ledger, SqliteLedger};
use pulse_ach::notify::{ConnectionRegistry, NotificationChannel};
use pulse_ach::reconciler::Reconciler;
use pulse_ach::triggers::{reconcile_bounded, ReconcileTrigger, SafetyNetSweep, SweepReport};
use pulse_ach::AppState;
use pulse_common::db::init_in_memory;
use pulse_common::events::{EventBus, PulseEvent, RecordKind};
use pulse_common::models::{AchievementRecord, MetricSample, MetricType, UserId};
use pulse_common::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn setup() -> AppState {
    let pool = init_in_memory().await.unwrap();
    AppState::new(
        pool,
        Arc::new(BadgeCatalog::standard().unwrap()),
        Arc::new(ConnectionRegistry::new(16)),
        Arc::new(EventBus::new(64)),
    )
}

async fn log_steps(state: &AppState, user: &str, value: f64) {
    db::metrics::save_metric(
        &state.db,
        &MetricSample {
            id: Uuid::new_v4(),
            user_id: UserId::from(user),
            metric_type: MetricType::Steps,
            value,
            date: Utc::now(),
        },
    )
    .await
    .unwrap();
}

/// SQLite ledger whose writes stall while `slow` is set
struct DelayingLedger {
    inner: SqliteLedger,
    slow: AtomicBool,
    delay: Duration,
}

#[async_trait]
impl Ledger for DelayingLedger {
    async fn earned(&self, user_id: &UserId) -> Result<Vec<AchievementRecord>> {
        self.inner.earned(user_id).await
    }

    async fn insert_if_absent(&self, record: &AchievementRecord) -> Result<InsertOutcome> {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.insert_if_absent(record).await
    }
}

/// SQLite history that counts loads per user and takes `delay` per load
struct CountingHistory {
    inner: SqliteHistory,
    loads: Mutex<HashMap<UserId, usize>>,
    delay: Duration,
}

impl CountingHistory {
    fn loads(&self, user: &str) -> usize {
        let loads = self.loads.lock().unwrap();
        loads.get(&UserId::from(user)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HistorySource for CountingHistory {
    async fn load(&self, user_id: &UserId) -> Result<UserHistory> {
        *self.loads.lock().unwrap().entry(user_id.clone()).or_default() += 1;
        tokio::time::sleep(self.delay).await;
        self.inner.load(user_id).await
    }

    async fn users_with_history(&self) -> Result<Vec<UserId>> {
        self.inner.users_with_history().await
    }
}

fn reconciler_with(
    state: &AppState,
    ledger: Arc<dyn Ledger>,
    history: Arc<dyn HistorySource>,
) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(
        Arc::clone(&state.catalog),
        ledger,
        history,
        NotificationChannel::new(Arc::new(ConnectionRegistry::new(16))),
        Arc::clone(&state.events),
    ))
}

fn record_written(state: &AppState, user: &str) {
    state.events.emit_lossy(PulseEvent::RecordWritten {
        user_id: UserId::from(user),
        kind: RecordKind::Metric,
        timestamp: Utc::now(),
    });
}

async fn earned_ids(state: &AppState, user: &str) -> Vec<String> {
    SqliteLedger::new(state.db.clone())
        .earned(&UserId::from(user))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.badge_id)
        .collect()
}

#[tokio::test]
async fn test_record_written_event_triggers_reconcile() {
    let state = setup().await;
    let cancel = CancellationToken::new();
    let handle = ReconcileTrigger::new(Arc::clone(&state.reconciler), &state.events, TIMEOUT)
        .spawn(cancel.clone());
    let mut bus = state.events.subscribe();

    log_steps(&state, "user-1", 6_000.0).await;
    record_written(&state, "user-1");

    // Wait for the award announced on the bus
    let awarded = tokio::time::timeout(TIMEOUT, async {
        loop {
            if let Ok(PulseEvent::AchievementEarned { badge_id, .. }) = bus.recv().await {
                return badge_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(awarded, "steps-5k");
    assert_eq!(earned_ids(&state, "user-1").await, vec!["steps-5k"]);

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_trigger_stops_on_cancel() {
    let state = setup().await;
    let cancel = CancellationToken::new();
    let handle = ReconcileTrigger::new(Arc::clone(&state.reconciler), &state.events, TIMEOUT)
        .spawn(cancel.clone());

    cancel.cancel();
    assert!(tokio::time::timeout(TIMEOUT, handle).await.is_ok());
}

#[tokio::test]
async fn test_sweep_reconciles_every_user_with_history() {
    let state = setup().await;
    log_steps(&state, "alice", 10_000.0).await;
    log_steps(&state, "bob", 5_000.0).await;

    let sweep = SafetyNetSweep::new(
        Arc::clone(&state.reconciler),
        Duration::from_secs(60),
        TIMEOUT,
    );

    let report = sweep.sweep_once().await;
    assert_eq!(
        report,
        SweepReport {
            users: 2,
            newly_earned: 3,
            failed: 0
        }
    );
    assert_eq!(earned_ids(&state, "alice").await.len(), 2);
    assert_eq!(earned_ids(&state, "bob").await, vec!["steps-5k"]);

    // Nothing new on the next sweep
    let again = sweep.sweep_once().await;
    assert_eq!(again.users, 2);
    assert_eq!(again.newly_earned, 0);
}

#[tokio::test]
async fn test_sweep_runs_immediately_on_start() {
    let state = setup().await;
    log_steps(&state, "user-1", 5_000.0).await;
    let mut bus = state.events.subscribe();

    let cancel = CancellationToken::new();
    let handle = SafetyNetSweep::new(
        Arc::clone(&state.reconciler),
        Duration::from_secs(3600),
        TIMEOUT,
    )
    .spawn(cancel.clone());

    let event = tokio::time::timeout(TIMEOUT, bus.recv()).await.unwrap().unwrap();
    assert!(matches!(event, PulseEvent::AchievementEarned { .. }));

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_burst_of_writes_folds_into_one_follow_up_pass() {
    let state = setup().await;
    log_steps(&state, "alice", 6_000.0).await;
    log_steps(&state, "bob", 6_000.0).await;
    let history = Arc::new(CountingHistory {
        inner: SqliteHistory::new(state.db.clone()),
        loads: Mutex::new(HashMap::new()),
        delay: Duration::from_millis(200),
    });
    let reconciler = reconciler_with(
        &state,
        Arc::new(SqliteLedger::new(state.db.clone())),
        Arc::clone(&history) as Arc<dyn HistorySource>,
    );

    let cancel = CancellationToken::new();
    let handle = ReconcileTrigger::new(reconciler, &state.events, TIMEOUT).spawn(cancel.clone());

    // Five writes while the first pass for alice is still loading
    for _ in 0..5 {
        record_written(&state, "alice");
    }
    record_written(&state, "bob");

    tokio::time::timeout(TIMEOUT, async {
        while history.loads("alice") < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    // Let any further pass start before counting
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(history.loads("alice"), 2);
    assert_eq!(history.loads("bob"), 1);
    assert_eq!(earned_ids(&state, "alice").await, vec!["steps-5k"]);
    assert_eq!(earned_ids(&state, "bob").await, vec!["steps-5k"]);

    // Idle again: a later write starts a fresh pass
    record_written(&state, "alice");
    tokio::time::timeout(TIMEOUT, async {
        while history.loads("alice") < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_timed_out_reconcile_is_picked_up_by_sweep() {
    let state = setup().await;
    log_steps(&state, "user-1", 6_000.0).await;
    let ledger = Arc::new(DelayingLedger {
        inner: SqliteLedger::new(state.db.clone()),
        slow: AtomicBool::new(true),
        delay: Duration::from_millis(500),
    });
    let reconciler = reconciler_with(
        &state,
        Arc::clone(&ledger) as Arc<dyn Ledger>,
        Arc::new(SqliteHistory::new(state.db.clone())),
    );

    let outcome =
        reconcile_bounded(&reconciler, &UserId::from("user-1"), Duration::from_millis(50)).await;
    assert!(outcome.is_none());
    assert!(earned_ids(&state, "user-1").await.is_empty());

    // Writes are fast again by the next sweep
    ledger.slow.store(false, Ordering::SeqCst);
    let sweep = SafetyNetSweep::new(reconciler, Duration::from_secs(3600), TIMEOUT);
    let report = sweep.sweep_once().await;
    assert_eq!(report.users, 1);
    assert_eq!(report.newly_earned, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(earned_ids(&state, "user-1").await, vec!["steps-5k"]);
}
