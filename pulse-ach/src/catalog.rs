//! Badge catalog
//!
//! Static, closed registry of every badge the service can award. Built once
//! at startup and shared read-only; iteration order is insertion order and
//! is the order notifications are emitted in.

use pulse_common::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Evaluation category of a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Consistency,
    Activity,
    Heart,
    Workout,
    Nutrition,
    Medication,
    Sleep,
    Goals,
    Meta,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 9] = [
        BadgeCategory::Consistency,
        BadgeCategory::Activity,
        BadgeCategory::Heart,
        BadgeCategory::Workout,
        BadgeCategory::Nutrition,
        BadgeCategory::Medication,
        BadgeCategory::Sleep,
        BadgeCategory::Goals,
        BadgeCategory::Meta,
    ];

    /// Presentation descriptor for this category
    pub fn display(self) -> &'static CategoryDisplay {
        &CATEGORY_DISPLAY[self as usize]
    }
}

/// Badge tier shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
    Special,
}

/// Icon and accent color for a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryDisplay {
    pub icon: &'static str,
    pub color: &'static str,
}

/// Indexed by `BadgeCategory as usize`; order must follow `BadgeCategory::ALL`.
#[rustfmt::skip]
static CATEGORY_DISPLAY: [CategoryDisplay; 9] = [
    CategoryDisplay { icon: "calendar-check", color: "#6366f1" },
    CategoryDisplay { icon: "footprints", color: "#22c55e" },
    CategoryDisplay { icon: "heart-pulse", color: "#ef4444" },
    CategoryDisplay { icon: "dumbbell", color: "#f97316" },
    CategoryDisplay { icon: "apple", color: "#84cc16" },
    CategoryDisplay { icon: "pill", color: "#06b6d4" },
    CategoryDisplay { icon: "moon", color: "#8b5cf6" },
    CategoryDisplay { icon: "target", color: "#eab308" },
    CategoryDisplay { icon: "trophy", color: "#f59e0b" },
];

/// Presentation-only metadata; never read by evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayMeta {
    pub title: &'static str,
    pub description: &'static str,
    pub tier: BadgeTier,
}

/// One catalog entry
///
/// `thresholds[0]` is the completion target. Further entries are rule
/// parameters (e.g. the minimum heart rate that qualifies a sample).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeDefinition {
    pub id: &'static str,
    pub category: BadgeCategory,
    pub thresholds: &'static [f64],
    #[serde(rename = "displayMeta")]
    pub display: DisplayMeta,
}

impl BadgeDefinition {
    pub const fn new(
        id: &'static str,
        category: BadgeCategory,
        thresholds: &'static [f64],
        title: &'static str,
        description: &'static str,
        tier: BadgeTier,
    ) -> Self {
        Self {
            id,
            category,
            thresholds,
            display: DisplayMeta {
                title,
                description,
                tier,
            },
        }
    }

    /// Completion target
    pub fn target(&self) -> f64 {
        self.thresholds[0]
    }

    /// Optional rule parameter at `index` (1-based past the target)
    pub fn param(&self, index: usize) -> Option<f64> {
        self.thresholds.get(index).copied()
    }

    pub fn is_meta(&self) -> bool {
        self.category == BadgeCategory::Meta
    }
}

use BadgeCategory as C;
use BadgeTier as T;

#[rustfmt::skip]
const STANDARD_BADGES: &[BadgeDefinition] = &[
    // Consistency
    BadgeDefinition::new("streak-3", C::Consistency, &[3.0], "Getting Started", "Log health data 3 days in a row", T::Bronze),
    BadgeDefinition::new("streak-7", C::Consistency, &[7.0], "Week Warrior", "Log health data 7 days in a row", T::Silver),
    BadgeDefinition::new("streak-30", C::Consistency, &[30.0], "Monthly Master", "Log health data 30 days in a row", T::Gold),
    BadgeDefinition::new("streak-90", C::Consistency, &[90.0], "Habit Formed", "Log health data 90 days in a row", T::Gold),
    // Activity
    BadgeDefinition::new("steps-5k", C::Activity, &[5_000.0], "Step It Up", "Walk 5,000 steps in a day", T::Bronze),
    BadgeDefinition::new("steps-10k", C::Activity, &[10_000.0], "10K Club", "Walk 10,000 steps in a day", T::Silver),
    BadgeDefinition::new("steps-15k", C::Activity, &[15_000.0], "Step Master", "Walk 15,000 steps in a day", T::Gold),
    BadgeDefinition::new("steps-100k", C::Activity, &[100_000.0], "Weekly Wanderer", "Walk 100,000 steps in a week", T::Gold),
    // Heart
    BadgeDefinition::new("heart-zone-1", C::Heart, &[5.0, 100.0], "Heart Starter", "Record 5 elevated heart-rate readings", T::Bronze),
    BadgeDefinition::new("heart-zone-2", C::Heart, &[10.0, 100.0], "Cardio Regular", "Record 10 elevated heart-rate readings", T::Silver),
    BadgeDefinition::new("heart-zone-3", C::Heart, &[15.0, 100.0], "Heart of Steel", "Record 15 elevated heart-rate readings", T::Gold),
    // Workout
    BadgeDefinition::new("workout-first", C::Workout, &[1.0], "First Sweat", "Log your first workout", T::Bronze),
    BadgeDefinition::new("workout-5", C::Workout, &[5.0], "Getting Fit", "Log 5 workouts", T::Silver),
    BadgeDefinition::new("workout-20", C::Workout, &[20.0], "Fitness Fanatic", "Log 20 workouts", T::Gold),
    BadgeDefinition::new("workout-variety", C::Workout, &[5.0], "Well Rounded", "Log every type of workout", T::Silver),
    // Nutrition
    BadgeDefinition::new("nutrition-track-7", C::Nutrition, &[7.0], "Mindful Eater", "Log meals 7 days in a row", T::Bronze),
    BadgeDefinition::new("nutrition-balanced", C::Nutrition, &[7.0], "Balanced Plate", "Eat balanced macros 7 days in a row", T::Silver),
    // Medication
    BadgeDefinition::new("medication-adherence", C::Medication, &[7.0], "On Schedule", "Take every dose 7 days in a row", T::Silver),
    BadgeDefinition::new("medication-adherence-30", C::Medication, &[30.0], "Perfect Adherence", "Take every dose 30 days in a row", T::Gold),
    // Sleep
    BadgeDefinition::new("sleep-8h", C::Sleep, &[8.0], "Well Rested", "Sleep 8 hours in one night", T::Bronze),
    BadgeDefinition::new("sleep-quality", C::Sleep, &[5.0, 7.0], "Sleep Champion", "Sleep at least 7 hours 5 nights in a row", T::Silver),
    // Goals
    BadgeDefinition::new("goal-first", C::Goals, &[1.0], "Goal Setter", "Create your first goal", T::Bronze),
    BadgeDefinition::new("goal-complete-1", C::Goals, &[1.0], "Goal Getter", "Complete a goal", T::Silver),
    BadgeDefinition::new("goal-complete-5", C::Goals, &[5.0], "Overachiever", "Complete 5 goals", T::Gold),
    // Meta
    BadgeDefinition::new("achievements-5", C::Meta, &[5.0], "Badge Collector", "Earn 5 badges", T::Special),
    BadgeDefinition::new("achievements-10", C::Meta, &[10.0], "Badge Hunter", "Earn 10 badges", T::Special),
    BadgeDefinition::new("achievements-25", C::Meta, &[25.0], "Badge Legend", "Earn 25 badges", T::Special),
    BadgeDefinition::new("collector-bronze", C::Meta, &[1.0], "Bronze Collection", "Earn every bronze badge", T::Special),
    BadgeDefinition::new("collector-silver", C::Meta, &[1.0], "Silver Collection", "Earn every silver badge", T::Special),
    BadgeDefinition::new("collector-gold", C::Meta, &[1.0], "Gold Collection", "Earn every gold badge", T::Special),
];

/// Immutable badge registry
#[derive(Debug, Clone)]
pub struct BadgeCatalog {
    badges: Vec<BadgeDefinition>,
    index: HashMap<&'static str, usize>,
}

impl BadgeCatalog {
    /// Build a catalog, rejecting duplicate ids and unusable thresholds
    pub fn new(badges: Vec<BadgeDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(badges.len());
        for (position, badge) in badges.iter().enumerate() {
            if badge.thresholds.is_empty() {
                return Err(Error::Config(format!("badge {} has no threshold", badge.id)));
            }
            if !badge.target().is_finite() || badge.target() <= 0.0 {
                return Err(Error::Config(format!(
                    "badge {} target must be positive",
                    badge.id
                )));
            }
            if index.insert(badge.id, position).is_some() {
                return Err(Error::Config(format!("duplicate badge id: {}", badge.id)));
            }
        }
        Ok(Self { badges, index })
    }

    /// The catalog shipped with the service
    pub fn standard() -> Result<Self> {
        Self::new(STANDARD_BADGES.to_vec())
    }

    pub fn get(&self, id: &str) -> Option<&BadgeDefinition> {
        self.index.get(id).map(|&i| &self.badges[i])
    }

    /// All badges in insertion order
    pub fn list(&self) -> &[BadgeDefinition] {
        &self.badges
    }

    /// Catalog position of a badge, used to order notifications
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_is_valid() {
        let catalog = BadgeCatalog::standard().unwrap();
        assert_eq!(catalog.len(), STANDARD_BADGES.len());
        assert_eq!(catalog.list()[0].id, "streak-3");
        assert_eq!(catalog.get("steps-10k").unwrap().target(), 10_000.0);
        assert_eq!(catalog.get("heart-zone-2").unwrap().param(1), Some(100.0));
        assert!(catalog.get("no-such-badge").is_none());
    }

    #[test]
    fn test_meta_badges_come_last() {
        let catalog = BadgeCatalog::standard().unwrap();
        let first_meta = catalog.list().iter().position(|b| b.is_meta()).unwrap();
        assert!(catalog.list()[first_meta..].iter().all(|b| b.is_meta()));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let badges = vec![
            BadgeDefinition::new("a", C::Workout, &[1.0], "A", "", T::Bronze),
            BadgeDefinition::new("a", C::Workout, &[2.0], "A again", "", T::Silver),
        ];
        assert!(matches!(BadgeCatalog::new(badges), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_positive_target_rejected() {
        let empty = vec![BadgeDefinition::new("x", C::Sleep, &[], "X", "", T::Bronze)];
        let zero = vec![BadgeDefinition::new("y", C::Sleep, &[0.0], "Y", "", T::Bronze)];
        assert!(BadgeCatalog::new(empty).is_err());
        assert!(BadgeCatalog::new(zero).is_err());
    }

    #[test]
    fn test_category_display_table_covers_every_category() {
        for category in BadgeCategory::ALL {
            assert!(!category.display().icon.is_empty());
            assert!(category.display().color.starts_with('#'));
        }
        assert_eq!(BadgeCategory::Meta.display().icon, "trophy");
        assert_eq!(BadgeCategory::Heart.display().icon, "heart-pulse");
    }

    #[test]
    fn test_position_follows_insertion_order() {
        let catalog = BadgeCatalog::standard().unwrap();
        assert!(catalog.position("steps-5k").unwrap() < catalog.position("steps-10k").unwrap());
        assert!(catalog.position("streak-90").unwrap() < catalog.position("steps-5k").unwrap());
    }
}
