//! Goals

use super::{parse_column, parse_guid, parse_timestamp};
use pulse_common::models::{GoalRecord, UserId};
use pulse_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub async fn save_goal(pool: &SqlitePool, goal: &GoalRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO goals (guid, user_id, title, category, completed, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(goal.id.to_string())
    .bind(goal.user_id.as_str())
    .bind(&goal.title)
    .bind(goal.category.as_str())
    .bind(goal.completed)
    .bind(goal.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a goal completed; idempotent
pub async fn complete_goal(
    pool: &SqlitePool,
    user_id: &UserId,
    goal_id: Uuid,
) -> Result<GoalRecord> {
    let result = sqlx::query("UPDATE goals SET completed = 1 WHERE guid = ? AND user_id = ?")
        .bind(goal_id.to_string())
        .bind(user_id.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("goal {}", goal_id)));
    }

    load_goals(pool, user_id)
        .await?
        .into_iter()
        .find(|g| g.id == goal_id)
        .ok_or_else(|| Error::NotFound(format!("goal {}", goal_id)))
}

pub async fn load_goals(pool: &SqlitePool, user_id: &UserId) -> Result<Vec<GoalRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, title, category, completed, created_at
        FROM goals
        WHERE user_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(GoalRecord {
                id: parse_guid(row.get("guid"))?,
                user_id: user_id.clone(),
                title: row.get("title"),
                category: parse_column(row.get("category"))?,
                completed: row.get("completed"),
                created_at: parse_timestamp(row.get("created_at"))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_common::db::init_in_memory;
    use pulse_common::models::GoalCategory;

    #[tokio::test]
    async fn test_complete_goal() {
        let pool = init_in_memory().await.unwrap();
        let user = UserId::from("u1");
        let goal = GoalRecord {
            id: Uuid::new_v4(),
            user_id: user.clone(),
            title: "sleep by 11".to_string(),
            category: GoalCategory::Sleep,
            completed: false,
            created_at: Utc::now(),
        };
        save_goal(&pool, &goal).await.unwrap();

        let completed = complete_goal(&pool, &user, goal.id).await.unwrap();
        assert!(completed.completed);
        assert_eq!(completed.category, GoalCategory::Sleep);

        // Second completion is a no-op success
        assert!(complete_goal(&pool, &user, goal.id).await.unwrap().completed);
        assert!(matches!(
            complete_goal(&pool, &user, Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }
}
