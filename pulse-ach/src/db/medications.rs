//! Scheduled medication doses

use super::{parse_guid, parse_timestamp};
use chrono::{DateTime, Utc};
use pulse_common::models::{MedicationDose, UserId};
use pulse_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub async fn save_dose(pool: &SqlitePool, dose: &MedicationDose) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO medication_doses (guid, user_id, medication, scheduled_for, taken_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(dose.id.to_string())
    .bind(dose.user_id.as_str())
    .bind(&dose.medication)
    .bind(dose.scheduled_for.to_rfc3339())
    .bind(dose.taken_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Confirm a dose as taken
///
/// Confirming an already-taken dose keeps the first confirmation time.
/// Returns `NotFound` if the dose does not belong to the user.
pub async fn mark_taken(
    pool: &SqlitePool,
    user_id: &UserId,
    dose_id: Uuid,
    taken_at: DateTime<Utc>,
) -> Result<MedicationDose> {
    let result = sqlx::query(
        r#"
        UPDATE medication_doses
        SET taken_at = COALESCE(taken_at, ?)
        WHERE guid = ? AND user_id = ?
        "#,
    )
    .bind(taken_at.to_rfc3339())
    .bind(dose_id.to_string())
    .bind(user_id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("medication dose {}", dose_id)));
    }

    load_dose(pool, user_id, dose_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("medication dose {}", dose_id)))
}

async fn load_dose(
    pool: &SqlitePool,
    user_id: &UserId,
    dose_id: Uuid,
) -> Result<Option<MedicationDose>> {
    let row = sqlx::query(
        r#"
        SELECT guid, medication, scheduled_for, taken_at
        FROM medication_doses
        WHERE guid = ? AND user_id = ?
        "#,
    )
    .bind(dose_id.to_string())
    .bind(user_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|row| dose_from_row(&row, user_id)).transpose()
}

pub async fn load_doses(pool: &SqlitePool, user_id: &UserId) -> Result<Vec<MedicationDose>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, medication, scheduled_for, taken_at
        FROM medication_doses
        WHERE user_id = ?
        ORDER BY scheduled_for
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(|row| dose_from_row(row, user_id)).collect()
}

fn dose_from_row(row: &sqlx::sqlite::SqliteRow, user_id: &UserId) -> Result<MedicationDose> {
    let taken_at: Option<String> = row.get("taken_at");
    Ok(MedicationDose {
        id: parse_guid(row.get("guid"))?,
        user_id: user_id.clone(),
        medication: row.get("medication"),
        scheduled_for: parse_timestamp(row.get("scheduled_for"))?,
        taken_at: taken_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pulse_common::db::init_in_memory;

    fn dose(user: &str) -> MedicationDose {
        MedicationDose {
            id: Uuid::new_v4(),
            user_id: UserId::from(user),
            medication: "lisinopril".to_string(),
            scheduled_for: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
            taken_at: None,
        }
    }

    #[tokio::test]
    async fn test_mark_taken_keeps_first_confirmation() {
        let pool = init_in_memory().await.unwrap();
        let scheduled = dose("u1");
        save_dose(&pool, &scheduled).await.unwrap();

        let first = scheduled.scheduled_for + Duration::minutes(5);
        let taken = mark_taken(&pool, &scheduled.user_id, scheduled.id, first).await.unwrap();
        assert_eq!(taken.taken_at, Some(first));

        let again = mark_taken(&pool, &scheduled.user_id, scheduled.id, first + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again.taken_at, Some(first));
    }

    #[tokio::test]
    async fn test_mark_taken_for_other_user_is_not_found() {
        let pool = init_in_memory().await.unwrap();
        let scheduled = dose("u1");
        save_dose(&pool, &scheduled).await.unwrap();

        let result = mark_taken(&pool, &UserId::from("u2"), scheduled.id, Utc::now()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let doses = load_doses(&pool, &scheduled.user_id).await.unwrap();
        assert_eq!(doses[0].taken_at, None);
    }
}
