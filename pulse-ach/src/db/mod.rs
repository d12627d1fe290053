//! Record persistence
//!
//! One module per table. GUIDs and timestamps are stored as text (UUID
//! hyphenated form, RFC 3339) and parsed back on load.

pub mod goals;
pub mod meals;
pub mod medications;
pub mod metrics;
pub mod profiles;
pub mod workouts;

use chrono::{DateTime, Utc};
use pulse_common::models::UserId;
use pulse_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid stored timestamp {:?}: {}", raw, e)))
}

pub(crate) fn parse_guid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| Error::Internal(format!("invalid stored guid {:?}: {}", raw, e)))
}

/// Parse a stored enum column
pub(crate) fn parse_column<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    raw.parse::<T>()
        .map_err(|e| Error::Internal(format!("invalid stored value: {}", e)))
}

/// Every user with at least one record of any kind
pub async fn users_with_history(pool: &SqlitePool) -> Result<Vec<UserId>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT user_id FROM health_metrics
        UNION SELECT user_id FROM workouts
        UNION SELECT user_id FROM meals
        UNION SELECT user_id FROM medication_doses
        UNION SELECT user_id FROM goals
        ORDER BY user_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ids.iter().map(|id| UserId::from(id.as_str())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::db::init_in_memory;
    use pulse_common::models::{GoalCategory, GoalRecord, MetricSample, MetricType};

    #[test]
    fn test_parse_timestamp_normalizes_offset() {
        let parsed = parse_timestamp("2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn test_users_with_history_is_distinct_union() {
        let pool = init_in_memory().await.unwrap();
        let now = Utc::now();

        for user in ["b", "a", "b"] {
            metrics::save_metric(
                &pool,
                &MetricSample {
                    id: Uuid::new_v4(),
                    user_id: UserId::from(user),
                    metric_type: MetricType::Weight,
                    value: 70.0,
                    date: now,
                },
            )
            .await
            .unwrap();
        }
        goals::save_goal(
            &pool,
            &GoalRecord {
                id: Uuid::new_v4(),
                user_id: UserId::from("c"),
                title: "hydrate".to_string(),
                category: GoalCategory::Other,
                completed: false,
                created_at: now,
            },
        )
        .await
        .unwrap();

        let users = users_with_history(&pool).await.unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
