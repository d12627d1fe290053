//! Integration tests for on-disk database initialization

use pulse_common::db::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("pulse.db");
    assert!(!db_path.exists());

    let pool = init_database(&db_path).await;

    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_ledger() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("pulse.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO achievements (user_id, badge_id, earned_at) VALUES ('u1', 'streak-3', CURRENT_TIMESTAMP)",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    // Reopen: schema creation must not disturb existing rows
    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM achievements WHERE user_id = 'u1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_wal_mode_enabled() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}
