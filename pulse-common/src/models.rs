//! Domain record models
//!
//! Records written by the CRUD layer and read by the achievement pipeline.
//! Wire names are camelCase to match the browser client.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque user identifier supplied by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Build a user id, rejecting blank values
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("user id must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Health metrics
// ============================================================================

/// Kind of numeric health sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricType {
    HeartRate,
    Steps,
    Weight,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    BloodSugar,
    SleepHours,
    Water,
    CaloriesBurned,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::HeartRate => "heartRate",
            MetricType::Steps => "steps",
            MetricType::Weight => "weight",
            MetricType::BloodPressureSystolic => "bloodPressureSystolic",
            MetricType::BloodPressureDiastolic => "bloodPressureDiastolic",
            MetricType::BloodSugar => "bloodSugar",
            MetricType::SleepHours => "sleepHours",
            MetricType::Water => "water",
            MetricType::CaloriesBurned => "caloriesBurned",
        }
    }
}

impl FromStr for MetricType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "heartRate" => Ok(MetricType::HeartRate),
            "steps" => Ok(MetricType::Steps),
            "weight" => Ok(MetricType::Weight),
            "bloodPressureSystolic" => Ok(MetricType::BloodPressureSystolic),
            "bloodPressureDiastolic" => Ok(MetricType::BloodPressureDiastolic),
            "bloodSugar" => Ok(MetricType::BloodSugar),
            "sleepHours" => Ok(MetricType::SleepHours),
            "water" => Ok(MetricType::Water),
            "caloriesBurned" => Ok(MetricType::CaloriesBurned),
            other => Err(Error::InvalidInput(format!("unknown metric type: {}", other))),
        }
    }
}

/// A dated numeric health sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    pub date: DateTime<Utc>,
}

// ============================================================================
// Workouts
// ============================================================================

/// Workout category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    Cardio,
    Strength,
    Flexibility,
    Balance,
    Other,
}

impl WorkoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutType::Cardio => "cardio",
            WorkoutType::Strength => "strength",
            WorkoutType::Flexibility => "flexibility",
            WorkoutType::Balance => "balance",
            WorkoutType::Other => "other",
        }
    }
}

impl FromStr for WorkoutType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cardio" => Ok(WorkoutType::Cardio),
            "strength" => Ok(WorkoutType::Strength),
            "flexibility" => Ok(WorkoutType::Flexibility),
            "balance" => Ok(WorkoutType::Balance),
            "other" => Ok(WorkoutType::Other),
            other => Err(Error::InvalidInput(format!("unknown workout type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRecord {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub workout_type: WorkoutType,
    pub title: String,
    pub duration_minutes: u32,
    pub date: DateTime<Utc>,
}

// ============================================================================
// Meals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Other,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Other => "other",
        }
    }
}

impl FromStr for MealType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            "other" => Ok(MealType::Other),
            other => Err(Error::InvalidInput(format!("unknown meal type: {}", other))),
        }
    }
}

/// A logged meal; macro nutrients are grams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub meal_type: MealType,
    pub name: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub date: DateTime<Utc>,
}

// ============================================================================
// Medication doses
// ============================================================================

/// One scheduled medication dose
///
/// `taken_at` is set once the user confirms the dose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationDose {
    pub id: Uuid,
    pub user_id: UserId,
    pub medication: String,
    pub scheduled_for: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Goals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Fitness,
    Nutrition,
    Sleep,
    Weight,
    Medication,
    Other,
}

impl GoalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalCategory::Fitness => "fitness",
            GoalCategory::Nutrition => "nutrition",
            GoalCategory::Sleep => "sleep",
            GoalCategory::Weight => "weight",
            GoalCategory::Medication => "medication",
            GoalCategory::Other => "other",
        }
    }
}

impl FromStr for GoalCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fitness" => Ok(GoalCategory::Fitness),
            "nutrition" => Ok(GoalCategory::Nutrition),
            "sleep" => Ok(GoalCategory::Sleep),
            "weight" => Ok(GoalCategory::Weight),
            "medication" => Ok(GoalCategory::Medication),
            "other" => Ok(GoalCategory::Other),
            other => Err(Error::InvalidInput(format!("unknown goal category: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub title: String,
    pub category: GoalCategory,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Profile and achievements
// ============================================================================

/// Per-user settings relevant to evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    /// Local timezone as a fixed offset from UTC, in minutes
    pub utc_offset_minutes: i32,
}

/// A permanently earned badge
///
/// At most one record exists per (user, badge); `progress` is always 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementRecord {
    pub user_id: UserId,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
    pub progress: u8,
}

impl AchievementRecord {
    /// New record for a badge earned now
    pub fn earned_now(user_id: UserId, badge_id: impl Into<String>) -> Self {
        Self {
            user_id,
            badge_id: badge_id.into(),
            earned_at: Utc::now(),
            progress: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::parse("   ").is_err());
        assert_eq!(UserId::parse(" u-1 ").unwrap().as_str(), "u-1");
    }

    #[test]
    fn test_metric_type_wire_names_match_storage_names() {
        for metric_type in [
            MetricType::HeartRate,
            MetricType::Steps,
            MetricType::BloodPressureDiastolic,
            MetricType::SleepHours,
            MetricType::CaloriesBurned,
        ] {
            let json = serde_json::to_string(&metric_type).unwrap();
            assert_eq!(json, format!("\"{}\"", metric_type.as_str()));
            assert_eq!(metric_type.as_str().parse::<MetricType>().unwrap(), metric_type);
        }
    }

    #[test]
    fn test_unknown_enum_values_are_invalid_input() {
        assert!(matches!("running".parse::<WorkoutType>(), Err(Error::InvalidInput(_))));
        assert!(matches!("brunch".parse::<MealType>(), Err(Error::InvalidInput(_))));
        assert!(matches!("finance".parse::<GoalCategory>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_achievement_record_serializes_camel_case() {
        let record = AchievementRecord::earned_now(UserId::from("u1"), "steps-5k");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["badgeId"], "steps-5k");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["progress"], 100);
        assert!(value["earnedAt"].is_string());
    }
}
