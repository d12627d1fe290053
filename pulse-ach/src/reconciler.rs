//! Achievement reconciler
//!
//! Diffs fresh evaluation against the ledger, appends newly earned badges
//! and notifies the user's live connections. Safe to run concurrently for
//! the same user: the ledger's insert-if-absent decides which caller owns a
//! new award, and only that caller notifies.

use crate::catalog::{BadgeCatalog, BadgeDefinition};
use crate::evaluator::{Evaluator, ProgressSnapshot};
use crate::history::HistorySource;
use crate::ledger::{InsertOutcome, Ledger};
use crate::notify::NotificationChannel;
use chrono::{DateTime, Utc};
use pulse_common::events::{EventBus, NotificationEvent, PulseEvent};
use pulse_common::models::{AchievementRecord, UserId};
use pulse_common::{time, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One initial attempt plus one immediate retry
const LEDGER_WRITE_ATTEMPTS: u32 = 2;

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    /// Badges this call appended to the ledger, in catalog order
    pub newly_earned: Vec<BadgeDefinition>,
    /// Badges with 0 < progress < 100
    pub in_progress: Vec<ProgressSnapshot>,
}

/// Ledger contents plus fresh progress, without writing anything
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    pub earned: Vec<AchievementRecord>,
    pub progress: Vec<ProgressSnapshot>,
}

/// Working state of one reconciliation
struct Pass {
    /// Ledger contents when the pass started
    earned: HashSet<String>,
    /// `earned` plus badges confirmed in the ledger during the pass
    achieved: HashSet<String>,
    inserted: Vec<AchievementRecord>,
    in_progress: Vec<ProgressSnapshot>,
}

enum Award {
    Inserted(AchievementRecord),
    AlreadyEarned,
    Failed,
}

pub struct Reconciler {
    evaluator: Evaluator,
    ledger: Arc<dyn Ledger>,
    history: Arc<dyn HistorySource>,
    channel: NotificationChannel,
    events: Arc<EventBus>,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<BadgeCatalog>,
        ledger: Arc<dyn Ledger>,
        history: Arc<dyn HistorySource>,
        channel: NotificationChannel,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(catalog),
            ledger,
            history,
            channel,
            events,
        }
    }

    pub fn catalog(&self) -> &BadgeCatalog {
        self.evaluator.catalog()
    }

    pub fn history(&self) -> &Arc<dyn HistorySource> {
        &self.history
    }

    /// Reconcile one user against the current time
    pub async fn reconcile(&self, user_id: &UserId) -> Result<ReconcileOutcome> {
        self.reconcile_at(user_id, time::now()).await
    }

    /// Reconcile one user as of `as_of`
    pub async fn reconcile_at(
        &self,
        user_id: &UserId,
        as_of: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let earned: HashSet<String> = self
            .ledger
            .earned(user_id)
            .await?
            .into_iter()
            .map(|record| record.badge_id)
            .collect();
        let history = self.history.load(user_id).await?;

        let mut pass = Pass {
            achieved: earned.clone(),
            earned,
            inserted: Vec::new(),
            in_progress: Vec::new(),
        };

        let individual = self
            .evaluator
            .evaluate_individual(user_id, &history, as_of, &pass.earned);
        self.apply(user_id, as_of, individual, &mut pass).await;

        // Meta badges see this pass's insertions
        let meta = self.evaluator.evaluate_meta(user_id, &pass.achieved);
        self.apply(user_id, as_of, meta, &mut pass).await;

        let Pass { mut inserted, mut in_progress, .. } = pass;
        let catalog = self.evaluator.catalog();
        inserted.sort_by_key(|record| catalog.position(&record.badge_id));
        in_progress.sort_by_key(|snapshot| catalog.position(&snapshot.badge_id));

        for record in &inserted {
            self.channel
                .publish(&NotificationEvent::achievement_earned(record.clone()));
            self.events.emit_lossy(PulseEvent::AchievementEarned {
                user_id: user_id.clone(),
                badge_id: record.badge_id.clone(),
                timestamp: record.earned_at,
            });
        }

        let newly_earned: Vec<BadgeDefinition> = inserted
            .iter()
            .filter_map(|record| catalog.get(&record.badge_id).cloned())
            .collect();

        if newly_earned.is_empty() {
            debug!("Reconciled user {}: nothing new", user_id);
        } else {
            info!(
                "User {} earned {} badge(s): {}",
                user_id,
                newly_earned.len(),
                newly_earned.iter().map(|b| b.id).collect::<Vec<_>>().join(", ")
            );
        }

        Ok(ReconcileOutcome {
            newly_earned,
            in_progress,
        })
    }

    /// Ledger records and fresh progress for display; writes nothing
    pub async fn view(&self, user_id: &UserId) -> Result<AchievementView> {
        let earned = self.ledger.earned(user_id).await?;
        let ids: HashSet<String> = earned.iter().map(|r| r.badge_id.clone()).collect();
        let history = self.history.load(user_id).await?;
        let progress = self
            .evaluator
            .evaluate(user_id, &history, time::now(), &ids);

        Ok(AchievementView { earned, progress })
    }

    async fn apply(
        &self,
        user_id: &UserId,
        as_of: DateTime<Utc>,
        snapshots: Vec<ProgressSnapshot>,
        pass: &mut Pass,
    ) {
        for snapshot in snapshots {
            if snapshot.progress == 100 {
                if pass.earned.contains(&snapshot.badge_id) {
                    continue;
                }
                match self.award(user_id, &snapshot.badge_id, as_of).await {
                    Award::Inserted(record) => {
                        pass.achieved.insert(record.badge_id.clone());
                        pass.inserted.push(record);
                    }
                    Award::AlreadyEarned => {
                        pass.achieved.insert(snapshot.badge_id);
                    }
                    Award::Failed => {}
                }
            } else if snapshot.progress > 0 {
                pass.in_progress.push(snapshot);
            }
        }
    }

    async fn award(&self, user_id: &UserId, badge_id: &str, as_of: DateTime<Utc>) -> Award {
        let record = AchievementRecord {
            user_id: user_id.clone(),
            badge_id: badge_id.to_string(),
            earned_at: as_of,
            progress: 100,
        };

        for attempt in 1..=LEDGER_WRITE_ATTEMPTS {
            match self.ledger.insert_if_absent(&record).await {
                Ok(InsertOutcome::Inserted) => return Award::Inserted(record),
                Ok(InsertOutcome::AlreadyEarned) => {
                    debug!(
                        "Badge {} for user {} awarded concurrently, not notifying",
                        badge_id, user_id
                    );
                    return Award::AlreadyEarned;
                }
                Err(e) if attempt < LEDGER_WRITE_ATTEMPTS => {
                    warn!(
                        "Ledger write for badge {} (user {}) failed, retrying: {}",
                        badge_id, user_id, e
                    );
                }
                Err(e) => {
                    warn!(
                        "Ledger write for badge {} (user {}) failed again, deferring to next pass: {}",
                        badge_id, user_id, e
                    );
                }
            }
        }

        Award::Failed
    }
}
