//! Health metric samples

use super::{parse_column, parse_guid, parse_timestamp};
use pulse_common::models::{MetricSample, UserId};
use pulse_common::Result;
use sqlx::{Row, SqlitePool};

pub async fn save_metric(pool: &SqlitePool, sample: &MetricSample) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO health_metrics (guid, user_id, metric_type, value, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(sample.id.to_string())
    .bind(sample.user_id.as_str())
    .bind(sample.metric_type.as_str())
    .bind(sample.value)
    .bind(sample.date.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// All samples for a user, ordered by date
pub async fn load_metrics(pool: &SqlitePool, user_id: &UserId) -> Result<Vec<MetricSample>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, metric_type, value, recorded_at
        FROM health_metrics
        WHERE user_id = ?
        ORDER BY recorded_at
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(MetricSample {
                id: parse_guid(row.get("guid"))?,
                user_id: user_id.clone(),
                metric_type: parse_column(row.get("metric_type"))?,
                value: row.get("value"),
                date: parse_timestamp(row.get("recorded_at"))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulse_common::db::init_in_memory;
    use pulse_common::models::MetricType;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_save_and_load_ordered_by_date() {
        let pool = init_in_memory().await.unwrap();
        let user = UserId::from("u1");
        let later = Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap();

        for (metric_type, value, date) in [
            (MetricType::HeartRate, 128.0, later),
            (MetricType::Steps, 4_200.0, earlier),
        ] {
            save_metric(
                &pool,
                &MetricSample {
                    id: Uuid::new_v4(),
                    user_id: user.clone(),
                    metric_type,
                    value,
                    date,
                },
            )
            .await
            .unwrap();
        }

        let loaded = load_metrics(&pool, &user).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].metric_type, MetricType::Steps);
        assert_eq!(loaded[0].date, earlier);
        assert_eq!(loaded[1].value, 128.0);
        assert!(load_metrics(&pool, &UserId::from("other")).await.unwrap().is_empty());
    }
}
