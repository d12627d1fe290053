//! Workout records

use super::{parse_column, parse_guid, parse_timestamp};
use pulse_common::models::{UserId, WorkoutRecord};
use pulse_common::Result;
use sqlx::{Row, SqlitePool};

pub async fn save_workout(pool: &SqlitePool, workout: &WorkoutRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO workouts (guid, user_id, workout_type, title, duration_minutes, performed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(workout.id.to_string())
    .bind(workout.user_id.as_str())
    .bind(workout.workout_type.as_str())
    .bind(&workout.title)
    .bind(i64::from(workout.duration_minutes))
    .bind(workout.date.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_workouts(pool: &SqlitePool, user_id: &UserId) -> Result<Vec<WorkoutRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, workout_type, title, duration_minutes, performed_at
        FROM workouts
        WHERE user_id = ?
        ORDER BY performed_at
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let minutes: i64 = row.get("duration_minutes");
            Ok(WorkoutRecord {
                id: parse_guid(row.get("guid"))?,
                user_id: user_id.clone(),
                workout_type: parse_column(row.get("workout_type"))?,
                title: row.get("title"),
                duration_minutes: u32::try_from(minutes).unwrap_or(u32::MAX),
                date: parse_timestamp(row.get("performed_at"))?,
            })
        })
        .collect()
}
