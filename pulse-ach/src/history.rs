//! Read side of the record store, as seen by reconciliation

use crate::db;
use crate::evaluator::UserHistory;
use async_trait::async_trait;
use pulse_common::models::UserId;
use pulse_common::Result;
use sqlx::SqlitePool;

/// Source of user history for evaluation
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Full history for one user; unknown users yield an empty history
    async fn load(&self, user_id: &UserId) -> Result<UserHistory>;

    /// Users with at least one record, for the periodic sweep
    async fn users_with_history(&self) -> Result<Vec<UserId>>;
}

/// History read from the SQLite record tables
#[derive(Clone)]
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistorySource for SqliteHistory {
    async fn load(&self, user_id: &UserId) -> Result<UserHistory> {
        let profile = db::profiles::load_profile(&self.pool, user_id).await?;

        Ok(UserHistory {
            utc_offset_minutes: profile.utc_offset_minutes,
            metrics: db::metrics::load_metrics(&self.pool, user_id).await?,
            workouts: db::workouts::load_workouts(&self.pool, user_id).await?,
            meals: db::meals::load_meals(&self.pool, user_id).await?,
            doses: db::medications::load_doses(&self.pool, user_id).await?,
            goals: db::goals::load_goals(&self.pool, user_id).await?,
        })
    }

    async fn users_with_history(&self) -> Result<Vec<UserId>> {
        db::users_with_history(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_common::db::init_in_memory;
    use pulse_common::models::{UserProfile, WorkoutRecord, WorkoutType};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_unknown_user_has_empty_history() {
        let history = SqliteHistory::new(init_in_memory().await.unwrap());
        let loaded = history.load(&UserId::from("nobody")).await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.utc_offset_minutes, 0);
    }

    #[tokio::test]
    async fn test_load_collects_records_and_offset() {
        let pool = init_in_memory().await.unwrap();
        let user = UserId::from("u1");
        db::profiles::save_profile(
            &pool,
            &UserProfile {
                user_id: user.clone(),
                utc_offset_minutes: 330,
            },
        )
        .await
        .unwrap();
        db::workouts::save_workout(
            &pool,
            &WorkoutRecord {
                id: Uuid::new_v4(),
                user_id: user.clone(),
                workout_type: WorkoutType::Flexibility,
                title: "yoga".to_string(),
                duration_minutes: 45,
                date: Utc::now(),
            },
        )
        .await
        .unwrap();

        let history = SqliteHistory::new(pool);
        let loaded = history.load(&user).await.unwrap();
        assert_eq!(loaded.utc_offset_minutes, 330);
        assert_eq!(loaded.workouts.len(), 1);
        assert_eq!(loaded.workouts[0].workout_type, WorkoutType::Flexibility);
        assert!(loaded.metrics.is_empty());

        assert_eq!(history.users_with_history().await.unwrap(), vec![user]);
    }
}
