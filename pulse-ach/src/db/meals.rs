//! Meal records

use super::{parse_column, parse_guid, parse_timestamp};
use pulse_common::models::{MealRecord, UserId};
use pulse_common::Result;
use sqlx::{Row, SqlitePool};

pub async fn save_meal(pool: &SqlitePool, meal: &MealRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meals (guid, user_id, meal_type, name, calories, protein, carbs, fat, eaten_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(meal.id.to_string())
    .bind(meal.user_id.as_str())
    .bind(meal.meal_type.as_str())
    .bind(&meal.name)
    .bind(meal.calories)
    .bind(meal.protein)
    .bind(meal.carbs)
    .bind(meal.fat)
    .bind(meal.date.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_meals(pool: &SqlitePool, user_id: &UserId) -> Result<Vec<MealRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, meal_type, name, calories, protein, carbs, fat, eaten_at
        FROM meals
        WHERE user_id = ?
        ORDER BY eaten_at
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(MealRecord {
                id: parse_guid(row.get("guid"))?,
                user_id: user_id.clone(),
                meal_type: parse_column(row.get("meal_type"))?,
                name: row.get("name"),
                calories: row.get("calories"),
                protein: row.get("protein"),
                carbs: row.get("carbs"),
                fat: row.get("fat"),
                date: parse_timestamp(row.get("eaten_at"))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_common::db::init_in_memory;
    use pulse_common::models::MealType;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_optional_macros_round_trip_as_null() {
        let pool = init_in_memory().await.unwrap();
        let user = UserId::from("u1");
        let meal = MealRecord {
            id: Uuid::new_v4(),
            user_id: user.clone(),
            meal_type: MealType::Snack,
            name: "apple".to_string(),
            calories: Some(95.0),
            protein: None,
            carbs: Some(25.0),
            fat: None,
            date: Utc::now(),
        };
        save_meal(&pool, &meal).await.unwrap();

        let loaded = load_meals(&pool, &user).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].protein, None);
        assert_eq!(loaded[0].carbs, Some(25.0));
        assert_eq!(loaded[0].meal_type, MealType::Snack);
    }

    #[tokio::test]
    async fn test_negative_macros_rejected_by_schema() {
        let pool = init_in_memory().await.unwrap();
        let meal = MealRecord {
            id: Uuid::new_v4(),
            user_id: UserId::from("u1"),
            meal_type: MealType::Lunch,
            name: "bad".to_string(),
            calories: None,
            protein: Some(-1.0),
            carbs: None,
            fat: None,
            date: Utc::now(),
        };
        assert!(save_meal(&pool, &meal).await.is_err());
    }
}
