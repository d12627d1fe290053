//! Per-user profile settings

use pulse_common::models::{UserId, UserProfile};
use pulse_common::time::MAX_UTC_OFFSET_MINUTES;
use pulse_common::{Error, Result};
use sqlx::SqlitePool;

/// Insert or replace a user's profile
pub async fn save_profile(pool: &SqlitePool, profile: &UserProfile) -> Result<()> {
    if profile.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(Error::InvalidInput(format!(
            "utcOffsetMinutes must be within ±{}",
            MAX_UTC_OFFSET_MINUTES
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, utc_offset_minutes, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(user_id) DO UPDATE SET
            utc_offset_minutes = excluded.utc_offset_minutes,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(profile.user_id.as_str())
    .bind(profile.utc_offset_minutes)
    .execute(pool)
    .await?;

    Ok(())
}

/// Profile for a user; users who never saved one get UTC
pub async fn load_profile(pool: &SqlitePool, user_id: &UserId) -> Result<UserProfile> {
    let offset: Option<i32> =
        sqlx::query_scalar("SELECT utc_offset_minutes FROM user_profiles WHERE user_id = ?")
            .bind(user_id.as_str())
            .fetch_optional(pool)
            .await?;

    Ok(UserProfile {
        user_id: user_id.clone(),
        utc_offset_minutes: offset.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::db::init_in_memory;

    #[tokio::test]
    async fn test_default_and_upsert() {
        let pool = init_in_memory().await.unwrap();
        let user = UserId::from("u1");
        assert_eq!(load_profile(&pool, &user).await.unwrap().utc_offset_minutes, 0);

        for offset in [60, -300] {
            let profile = UserProfile {
                user_id: user.clone(),
                utc_offset_minutes: offset,
            };
            save_profile(&pool, &profile).await.unwrap();
        }
        assert_eq!(load_profile(&pool, &user).await.unwrap().utc_offset_minutes, -300);
    }

    #[tokio::test]
    async fn test_out_of_range_offset_rejected() {
        let pool = init_in_memory().await.unwrap();
        let profile = UserProfile {
            user_id: UserId::from("u1"),
            utc_offset_minutes: 15 * 60,
        };
        assert!(matches!(save_profile(&pool, &profile).await, Err(Error::InvalidInput(_))));
    }
}
