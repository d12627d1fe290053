//! Achievement evaluator
//!
//! Pure computation: given a user's history, the evaluation instant and the
//! set of already-earned badges, produce a progress snapshot for every badge
//! in the catalog. No I/O happens here.
//!
//! Evaluation runs in two phases:
//! 1. Individual badges, each measured from history.
//! 2. Meta badges, scored from the achieved set (earned plus phase-1 badges at
//!    100). A meta badge reaching 100 is added to the achieved set and the
//!    phase repeats until nothing changes.
//!
//! A badge present in the earned set always reports 100.

pub mod rules;
pub mod streak;

use crate::catalog::{BadgeCatalog, BadgeDefinition};
use chrono::{DateTime, Utc};
use pulse_common::models::{
    GoalRecord, MealRecord, MedicationDose, MetricSample, UserId, WorkoutRecord,
};
use rules::{rule_for, Facts, Rule};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

pub use rules::MAX_PLAUSIBLE_HEART_RATE;

/// Everything the evaluator reads about one user
#[derive(Debug, Clone, Default)]
pub struct UserHistory {
    /// Local timezone as minutes east of UTC
    pub utc_offset_minutes: i32,
    pub metrics: Vec<MetricSample>,
    pub workouts: Vec<WorkoutRecord>,
    pub meals: Vec<MealRecord>,
    pub doses: Vec<MedicationDose>,
    pub goals: Vec<GoalRecord>,
}

impl UserHistory {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
            && self.workouts.is_empty()
            && self.meals.is_empty()
            && self.doses.is_empty()
            && self.goals.is_empty()
    }
}

/// Progress toward one badge, recomputed on every evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub user_id: UserId,
    pub badge_id: String,
    pub progress: u8,
}

/// Map an observed quantity onto 0..=100
///
/// `min(100, floor(observed / target * 100))`, with non-finite or
/// non-positive values mapping to 0.
pub fn progress_percent(observed: f64, target: f64) -> u8 {
    if !observed.is_finite() || !target.is_finite() || observed <= 0.0 || target <= 0.0 {
        return 0;
    }
    if observed >= target {
        return 100;
    }
    (observed / target * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// Stateless evaluator bound to a catalog
#[derive(Debug, Clone)]
pub struct Evaluator {
    catalog: Arc<BadgeCatalog>,
}

impl Evaluator {
    pub fn new(catalog: Arc<BadgeCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    /// Snapshots for every badge, in catalog order
    pub fn evaluate(
        &self,
        user_id: &UserId,
        history: &UserHistory,
        as_of: DateTime<Utc>,
        earned: &HashSet<String>,
    ) -> Vec<ProgressSnapshot> {
        let individual = self.evaluate_individual(user_id, history, as_of, earned);

        let mut achieved = earned.clone();
        achieved.extend(
            individual
                .iter()
                .filter(|s| s.progress == 100)
                .map(|s| s.badge_id.clone()),
        );

        let mut snapshots = individual;
        snapshots.extend(self.evaluate_meta(user_id, &achieved));
        snapshots.sort_by_key(|s| self.catalog.position(&s.badge_id));
        snapshots
    }

    /// Snapshots for every non-meta badge the evaluator has a rule for
    pub fn evaluate_individual(
        &self,
        user_id: &UserId,
        history: &UserHistory,
        as_of: DateTime<Utc>,
        earned: &HashSet<String>,
    ) -> Vec<ProgressSnapshot> {
        let facts = Facts::derive(history, as_of);

        self.catalog
            .list()
            .iter()
            .filter(|badge| !badge.is_meta())
            .filter_map(|badge| {
                let progress = if earned.contains(badge.id) {
                    100
                } else {
                    let rule = self.rule_or_skip(badge)?;
                    progress_percent(facts.measure(rule, badge), badge.target())
                };
                Some(snapshot(user_id, badge, progress))
            })
            .collect()
    }

    /// Snapshots for every meta badge, given the achieved set
    ///
    /// Iterates to a fixed point so a meta badge reaching 100 counts toward
    /// later meta badges within the same call.
    pub fn evaluate_meta(
        &self,
        user_id: &UserId,
        achieved: &HashSet<String>,
    ) -> Vec<ProgressSnapshot> {
        let meta: Vec<(&BadgeDefinition, Rule)> = self
            .catalog
            .list()
            .iter()
            .filter(|badge| badge.is_meta())
            .filter_map(|badge| {
                if achieved.contains(badge.id) {
                    return Some((badge, Rule::EarnedCount));
                }
                self.rule_or_skip(badge).map(|rule| (badge, rule))
            })
            .collect();

        let mut achieved = achieved.clone();
        loop {
            let mut changed = false;
            for (badge, rule) in &meta {
                if achieved.contains(badge.id) {
                    continue;
                }
                if self.meta_progress(*rule, badge, &achieved) == 100 {
                    achieved.insert(badge.id.to_string());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        meta.iter()
            .map(|(badge, rule)| {
                let progress = if achieved.contains(badge.id) {
                    100
                } else {
                    self.meta_progress(*rule, badge, &achieved)
                };
                snapshot(user_id, badge, progress)
            })
            .collect()
    }

    fn meta_progress(&self, rule: Rule, badge: &BadgeDefinition, achieved: &HashSet<String>) -> u8 {
        match rule {
            Rule::EarnedCount => {
                // Stale ledger ids outside the catalog do not count
                let count = achieved
                    .iter()
                    .filter(|id| self.catalog.get(id).is_some())
                    .count();
                progress_percent(count as f64, badge.target())
            }
            Rule::TierComplete(tier) => {
                let (total, have) = self
                    .catalog
                    .list()
                    .iter()
                    .filter(|b| !b.is_meta() && b.display.tier == tier)
                    .fold((0usize, 0usize), |(total, have), b| {
                        (total + 1, have + usize::from(achieved.contains(b.id)))
                    });
                if total == 0 {
                    return 0;
                }
                progress_percent(have as f64 / total as f64, badge.target())
            }
            _ => 0,
        }
    }

    fn rule_or_skip(&self, badge: &BadgeDefinition) -> Option<Rule> {
        let rule = rule_for(badge.id);
        if rule.is_none() {
            warn!("No evaluation rule for badge {}, skipping", badge.id);
        }
        rule
    }
}

fn snapshot(user_id: &UserId, badge: &BadgeDefinition, progress: u8) -> ProgressSnapshot {
    ProgressSnapshot {
        user_id: user_id.clone(),
        badge_id: badge.id.to_string(),
        progress,
    }
}
