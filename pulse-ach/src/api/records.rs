//! Record write path
//!
//! Each handler validates and persists one record, then emits
//! `RecordWritten` on the event bus. Reconciliation happens in the
//! background; a response never waits on it or reflects its outcome.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use pulse_common::events::{NotificationEvent, PulseEvent, RecordKind};
use pulse_common::models::{
    GoalCategory, GoalRecord, MealRecord, MealType, MedicationDose, MetricSample, MetricType,
    UserId, UserProfile, WorkoutRecord, WorkoutType,
};
use pulse_common::time;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::identity::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMetric {
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    #[serde(rename = "type")]
    pub workout_type: WorkoutType,
    pub title: String,
    pub duration_minutes: u32,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeal {
    pub meal_type: MealType,
    pub name: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDose {
    pub medication: String,
    pub scheduled_for: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    pub category: GoalCategory,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub utc_offset_minutes: i32,
}

fn require_text(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn require_amount(field: &str, value: f64) -> ApiResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::BadRequest(format!(
            "{} must be a non-negative number",
            field
        )));
    }
    Ok(value)
}

fn optional_amount(field: &str, value: Option<f64>) -> ApiResult<Option<f64>> {
    value.map(|v| require_amount(field, v)).transpose()
}

fn record_written(state: &AppState, user_id: &UserId, kind: RecordKind) {
    debug!("Persisted {:?} for user {}", kind, user_id);
    state.events.emit_lossy(PulseEvent::RecordWritten {
        user_id: user_id.clone(),
        kind,
        timestamp: time::now(),
    });
}

/// Validate and store one metric sample
///
/// Shared by the HTTP route and inbound socket messages. Pushes
/// `health_metric_update` to the user's open connections.
pub(crate) async fn log_metric(
    state: &AppState,
    user_id: &UserId,
    body: NewMetric,
) -> ApiResult<MetricSample> {
    let sample = MetricSample {
        id: Uuid::new_v4(),
        user_id: user_id.clone(),
        metric_type: body.metric_type,
        value: require_amount("value", body.value)?,
        date: body.date.unwrap_or_else(time::now),
    };

    db::metrics::save_metric(&state.db, &sample).await?;
    state
        .channel
        .publish(&NotificationEvent::metric_update(sample.clone()));
    record_written(state, user_id, RecordKind::Metric);

    Ok(sample)
}

/// POST /api/health-metrics
pub async fn create_metric(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<NewMetric>,
) -> ApiResult<(StatusCode, Json<MetricSample>)> {
    let sample = log_metric(&state, &user_id, body).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}

/// POST /api/workouts
pub async fn create_workout(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<NewWorkout>,
) -> ApiResult<(StatusCode, Json<WorkoutRecord>)> {
    if body.duration_minutes == 0 {
        return Err(ApiError::BadRequest(
            "durationMinutes must be at least 1".to_string(),
        ));
    }

    let workout = WorkoutRecord {
        id: Uuid::new_v4(),
        user_id: user_id.clone(),
        workout_type: body.workout_type,
        title: require_text("title", &body.title)?,
        duration_minutes: body.duration_minutes,
        date: body.date.unwrap_or_else(time::now),
    };

    db::workouts::save_workout(&state.db, &workout).await?;
    record_written(&state, &user_id, RecordKind::Workout);

    Ok((StatusCode::CREATED, Json(workout)))
}

/// POST /api/meals
pub async fn create_meal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<NewMeal>,
) -> ApiResult<(StatusCode, Json<MealRecord>)> {
    let meal = MealRecord {
        id: Uuid::new_v4(),
        user_id: user_id.clone(),
        meal_type: body.meal_type,
        name: require_text("name", &body.name)?,
        calories: optional_amount("calories", body.calories)?,
        protein: optional_amount("protein", body.protein)?,
        carbs: optional_amount("carbs", body.carbs)?,
        fat: optional_amount("fat", body.fat)?,
        date: body.date.unwrap_or_else(time::now),
    };

    db::meals::save_meal(&state.db, &meal).await?;
    record_written(&state, &user_id, RecordKind::Meal);

    Ok((StatusCode::CREATED, Json(meal)))
}

/// POST /api/medications/doses
pub async fn create_dose(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<NewDose>,
) -> ApiResult<(StatusCode, Json<MedicationDose>)> {
    let dose = MedicationDose {
        id: Uuid::new_v4(),
        user_id: user_id.clone(),
        medication: require_text("medication", &body.medication)?,
        scheduled_for: body.scheduled_for,
        taken_at: body.taken_at,
    };

    db::medications::save_dose(&state.db, &dose).await?;
    record_written(&state, &user_id, RecordKind::MedicationDose);

    Ok((StatusCode::CREATED, Json(dose)))
}

/// POST /api/medications/doses/:id/take
pub async fn take_dose(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(dose_id): Path<Uuid>,
) -> ApiResult<Json<MedicationDose>> {
    let dose = db::medications::mark_taken(&state.db, &user_id, dose_id, time::now()).await?;
    record_written(&state, &user_id, RecordKind::MedicationDose);
    Ok(Json(dose))
}

/// POST /api/goals
pub async fn create_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<NewGoal>,
) -> ApiResult<(StatusCode, Json<GoalRecord>)> {
    let goal = GoalRecord {
        id: Uuid::new_v4(),
        user_id: user_id.clone(),
        title: require_text("title", &body.title)?,
        category: body.category,
        completed: false,
        created_at: time::now(),
    };

    db::goals::save_goal(&state.db, &goal).await?;
    record_written(&state, &user_id, RecordKind::Goal);

    Ok((StatusCode::CREATED, Json(goal)))
}

/// POST /api/goals/:id/complete
pub async fn complete_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(goal_id): Path<Uuid>,
) -> ApiResult<Json<GoalRecord>> {
    let goal = db::goals::complete_goal(&state.db, &user_id, goal_id).await?;
    record_written(&state, &user_id, RecordKind::Goal);
    Ok(Json(goal))
}

/// PUT /api/profile
///
/// A timezone change can move records onto different local days, so it
/// triggers reconciliation like any other write.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<ProfileUpdate>,
) -> ApiResult<Json<UserProfile>> {
    let profile = UserProfile {
        user_id: user_id.clone(),
        utc_offset_minutes: body.utc_offset_minutes,
    };

    db::profiles::save_profile(&state.db, &profile).await?;
    record_written(&state, &user_id, RecordKind::Profile);

    Ok(Json(profile))
}
