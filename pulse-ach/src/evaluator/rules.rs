//! Per-badge evaluation rules
//!
//! Each rule measures one accumulated quantity from a user's history. The
//! quantity is compared against the badge target by the caller.

use super::streak::longest_run;
use super::UserHistory;
use crate::catalog::{BadgeDefinition, BadgeTier};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use pulse_common::models::{MetricType, WorkoutType};
use pulse_common::time::{local_date, offset_from_minutes, window_start};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Samples above this are treated as sensor noise
pub const MAX_PLAUSIBLE_HEART_RATE: f64 = 220.0;

const DEFAULT_HEART_RATE_FLOOR: f64 = 100.0;
const DEFAULT_MIN_SLEEP_HOURS: f64 = 7.0;
const WEEK_DAYS: u32 = 7;

// kcal per gram
const PROTEIN_KCAL: f64 = 4.0;
const CARBS_KCAL: f64 = 4.0;
const FAT_KCAL: f64 = 9.0;

const PROTEIN_SHARE: (f64, f64) = (0.10, 0.35);
const CARBS_SHARE: (f64, f64) = (0.45, 0.65);
const FAT_SHARE: (f64, f64) = (0.20, 0.35);

/// How a badge's observed quantity is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Longest run of days with any metric sample
    LoggingStreak,
    /// Highest single-day step total
    DailyStepPeak,
    /// Step total over the trailing week ending on the evaluation date
    WeeklyStepTotal,
    /// Heart-rate samples between the floor parameter and the plausible max
    HeartRateSamples,
    WorkoutCount,
    /// Distinct workout types
    WorkoutVariety,
    MealStreak,
    BalancedMealStreak,
    AdherenceStreak,
    /// Longest run of nights meeting the minimum-hours parameter
    SleepStreak,
    SleepPeak,
    GoalsCreated,
    GoalsCompleted,
    /// Number of earned catalog badges
    EarnedCount,
    /// Fraction of a tier's non-meta badges earned
    TierComplete(BadgeTier),
}

impl Rule {
    /// Meta rules read the achieved set instead of history
    pub fn is_meta(self) -> bool {
        matches!(self, Rule::EarnedCount | Rule::TierComplete(_))
    }
}

/// Rule lookup by badge id; `None` means the evaluator cannot score the badge
pub fn rule_for(badge_id: &str) -> Option<Rule> {
    let rule = match badge_id {
        "streak-3" | "streak-7" | "streak-30" | "streak-90" => Rule::LoggingStreak,
        "steps-5k" | "steps-10k" | "steps-15k" => Rule::DailyStepPeak,
        "steps-100k" => Rule::WeeklyStepTotal,
        "heart-zone-1" | "heart-zone-2" | "heart-zone-3" => Rule::HeartRateSamples,
        "workout-first" | "workout-5" | "workout-20" => Rule::WorkoutCount,
        "workout-variety" => Rule::WorkoutVariety,
        "nutrition-track-7" => Rule::MealStreak,
        "nutrition-balanced" => Rule::BalancedMealStreak,
        "medication-adherence" | "medication-adherence-30" => Rule::AdherenceStreak,
        "sleep-8h" => Rule::SleepPeak,
        "sleep-quality" => Rule::SleepStreak,
        "goal-first" => Rule::GoalsCreated,
        "goal-complete-1" | "goal-complete-5" => Rule::GoalsCompleted,
        "achievements-5" | "achievements-10" | "achievements-25" => Rule::EarnedCount,
        "collector-bronze" => Rule::TierComplete(BadgeTier::Bronze),
        "collector-silver" => Rule::TierComplete(BadgeTier::Silver),
        "collector-gold" => Rule::TierComplete(BadgeTier::Gold),
        _ => return None,
    };
    Some(rule)
}

#[derive(Debug, Default, Clone, Copy)]
struct Macros {
    protein: f64,
    carbs: f64,
    fat: f64,
}

impl Macros {
    fn is_balanced(&self) -> bool {
        let protein = self.protein * PROTEIN_KCAL;
        let carbs = self.carbs * CARBS_KCAL;
        let fat = self.fat * FAT_KCAL;
        let total = protein + carbs + fat;
        if total <= 0.0 {
            return false;
        }
        let within = |kcal: f64, (lo, hi): (f64, f64)| {
            (lo..=hi).contains(&(kcal / total))
        };
        within(protein, PROTEIN_SHARE) && within(carbs, CARBS_SHARE) && within(fat, FAT_SHARE)
    }
}

/// Day-level aggregates derived once per evaluation
pub struct Facts {
    as_of: NaiveDate,
    metric_days: BTreeSet<NaiveDate>,
    steps_by_day: BTreeMap<NaiveDate, f64>,
    sleep_by_day: BTreeMap<NaiveDate, f64>,
    heart_rates: Vec<f64>,
    workout_count: usize,
    workout_types: HashSet<WorkoutType>,
    meal_days: BTreeSet<NaiveDate>,
    macros_by_day: BTreeMap<NaiveDate, Macros>,
    /// (scheduled, taken) per local day
    doses_by_day: BTreeMap<NaiveDate, (u32, u32)>,
    goals_created: usize,
    goals_completed: usize,
}

impl Facts {
    pub fn derive(history: &UserHistory, as_of: DateTime<Utc>) -> Self {
        let offset: FixedOffset = offset_from_minutes(history.utc_offset_minutes);
        let day = |instant: DateTime<Utc>| local_date(instant, offset);

        let mut metric_days = BTreeSet::new();
        let mut steps_by_day = BTreeMap::new();
        let mut sleep_by_day = BTreeMap::new();
        let mut heart_rates = Vec::new();

        for sample in &history.metrics {
            let date = day(sample.date);
            metric_days.insert(date);
            match sample.metric_type {
                MetricType::Steps => *steps_by_day.entry(date).or_insert(0.0) += sample.value,
                MetricType::SleepHours => *sleep_by_day.entry(date).or_insert(0.0) += sample.value,
                MetricType::HeartRate => heart_rates.push(sample.value),
                _ => {}
            }
        }

        let mut meal_days = BTreeSet::new();
        let mut macros_by_day: BTreeMap<NaiveDate, Macros> = BTreeMap::new();
        for meal in &history.meals {
            let date = day(meal.date);
            meal_days.insert(date);
            if let (Some(protein), Some(carbs), Some(fat)) = (meal.protein, meal.carbs, meal.fat) {
                let totals = macros_by_day.entry(date).or_default();
                totals.protein += protein;
                totals.carbs += carbs;
                totals.fat += fat;
            }
        }

        let mut doses_by_day: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();
        for dose in &history.doses {
            let counts = doses_by_day.entry(day(dose.scheduled_for)).or_default();
            counts.0 += 1;
            if dose.taken_at.is_some() {
                counts.1 += 1;
            }
        }

        Self {
            as_of: day(as_of),
            metric_days,
            steps_by_day,
            sleep_by_day,
            heart_rates,
            workout_count: history.workouts.len(),
            workout_types: history.workouts.iter().map(|w| w.workout_type).collect(),
            meal_days,
            macros_by_day,
            doses_by_day,
            goals_created: history.goals.len(),
            goals_completed: history.goals.iter().filter(|g| g.completed).count(),
        }
    }

    /// Observed quantity for a history-based rule
    ///
    /// Meta rules measure 0 here; they are scored from the achieved set.
    pub fn measure(&self, rule: Rule, badge: &BadgeDefinition) -> f64 {
        match rule {
            Rule::LoggingStreak => f64::from(longest_run(self.metric_days.iter().copied())),
            Rule::DailyStepPeak => peak(self.steps_by_day.values()),
            Rule::WeeklyStepTotal => {
                let start = window_start(self.as_of, WEEK_DAYS);
                self.steps_by_day.range(start..=self.as_of).map(|(_, steps)| steps).sum()
            }
            Rule::HeartRateSamples => {
                let floor = badge.param(1).unwrap_or(DEFAULT_HEART_RATE_FLOOR);
                self.heart_rates
                    .iter()
                    .filter(|bpm| (floor..=MAX_PLAUSIBLE_HEART_RATE).contains(*bpm))
                    .count() as f64
            }
            Rule::WorkoutCount => self.workout_count as f64,
            Rule::WorkoutVariety => self.workout_types.len() as f64,
            Rule::MealStreak => f64::from(longest_run(self.meal_days.iter().copied())),
            Rule::BalancedMealStreak => f64::from(longest_run(
                self.macros_by_day
                    .iter()
                    .filter(|(_, macros)| macros.is_balanced())
                    .map(|(date, _)| *date),
            )),
            Rule::AdherenceStreak => f64::from(longest_run(
                self.doses_by_day
                    .iter()
                    .filter(|(_, (scheduled, taken))| *scheduled > 0 && taken == scheduled)
                    .map(|(date, _)| *date),
            )),
            Rule::SleepStreak => {
                let min_hours = badge.param(1).unwrap_or(DEFAULT_MIN_SLEEP_HOURS);
                f64::from(longest_run(
                    self.sleep_by_day
                        .iter()
                        .filter(|(_, hours)| **hours >= min_hours)
                        .map(|(date, _)| *date),
                ))
            }
            Rule::SleepPeak => peak(self.sleep_by_day.values()),
            Rule::GoalsCreated => self.goals_created as f64,
            Rule::GoalsCompleted => self.goals_completed as f64,
            Rule::EarnedCount | Rule::TierComplete(_) => 0.0,
        }
    }
}

fn peak<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.copied().fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_standard_badge_has_a_rule() {
        let catalog = crate::catalog::BadgeCatalog::standard().unwrap();
        for badge in catalog.list() {
            let rule = rule_for(badge.id).unwrap_or_else(|| panic!("no rule for {}", badge.id));
            assert_eq!(rule.is_meta(), badge.is_meta(), "{}", badge.id);
        }
    }

    #[test]
    fn test_unknown_id_has_no_rule() {
        assert_eq!(rule_for("streak-365"), None);
    }

    #[test]
    fn test_balanced_macros() {
        // 100g protein (400), 250g carbs (1000), 60g fat (540) -> 20% / 52% / 28%
        let balanced = Macros {
            protein: 100.0,
            carbs: 250.0,
            fat: 60.0,
        };
        assert!(balanced.is_balanced());

        // Mostly fat
        let keto = Macros {
            protein: 80.0,
            carbs: 20.0,
            fat: 150.0,
        };
        assert!(!keto.is_balanced());

        assert!(!Macros::default().is_balanced());
    }
}
