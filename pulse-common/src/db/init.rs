//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up to date.
//! Every statement is idempotent, so startup may run it against an existing
//! database.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// Current schema version
///
/// Increment when the schema changes.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Uses a single long-lived connection: every connection to `sqlite::memory:`
/// would otherwise see its own empty database.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table and index used by Pulse
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_user_profiles_table(pool).await?;
    create_health_metrics_table(pool).await?;
    create_workouts_table(pool).await?;
    create_meals_table(pool).await?;
    create_medication_doses_table(pool).await?;
    create_goals_table(pool).await?;
    create_achievements_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    debug!("Schema version {} ready", CURRENT_SCHEMA_VERSION);
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_profiles (
            user_id TEXT PRIMARY KEY,
            utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_health_metrics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS health_metrics (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            metric_type TEXT NOT NULL,
            value REAL NOT NULL,
            recorded_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_health_metrics_user_date ON health_metrics(user_id, recorded_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_workouts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workouts (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            workout_type TEXT NOT NULL,
            title TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL CHECK (duration_minutes >= 1),
            performed_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_workouts_user_date ON workouts(user_id, performed_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_meals_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meals (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            meal_type TEXT NOT NULL,
            name TEXT NOT NULL,
            calories REAL CHECK (calories IS NULL OR calories >= 0),
            protein REAL CHECK (protein IS NULL OR protein >= 0),
            carbs REAL CHECK (carbs IS NULL OR carbs >= 0),
            fat REAL CHECK (fat IS NULL OR fat >= 0),
            eaten_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_meals_user_date ON meals(user_id, eaten_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_medication_doses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS medication_doses (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            medication TEXT NOT NULL,
            scheduled_for TIMESTAMP NOT NULL,
            taken_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_medication_doses_user_date ON medication_doses(user_id, scheduled_for)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_goals_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS goals (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id, completed)")
        .execute(pool)
        .await?;

    Ok(())
}

/// The achievement ledger
///
/// The composite primary key is the only guard against duplicate earning
/// when reconciliations for one user race.
async fn create_achievements_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS achievements (
            user_id TEXT NOT NULL,
            badge_id TEXT NOT NULL,
            earned_at TIMESTAMP NOT NULL,
            progress INTEGER NOT NULL DEFAULT 100 CHECK (progress = 100),
            PRIMARY KEY (user_id, badge_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
