//! Achievement ledger
//!
//! Append-only record of permanently earned badges, keyed by (user, badge).
//! The SQLite primary key is the only guard against duplicate awards when two
//! reconciliations race for the same user.

use crate::db::parse_timestamp;
use async_trait::async_trait;
use pulse_common::models::{AchievementRecord, UserId};
use pulse_common::Result;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Result of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record for (user, badge) already existed; nothing was written
    AlreadyEarned,
}

/// Durable store of earned badges
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Every record earned by `user_id`, oldest first
    async fn earned(&self, user_id: &UserId) -> Result<Vec<AchievementRecord>>;

    /// Atomically insert unless (user, badge) is already present
    async fn insert_if_absent(&self, record: &AchievementRecord) -> Result<InsertOutcome>;
}

/// Ledger backed by the `achievements` table
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn earned(&self, user_id: &UserId) -> Result<Vec<AchievementRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT badge_id, earned_at, progress
            FROM achievements
            WHERE user_id = ?
            ORDER BY earned_at, badge_id
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let progress: i64 = row.get("progress");
                Ok(AchievementRecord {
                    user_id: user_id.clone(),
                    badge_id: row.get("badge_id"),
                    earned_at: parse_timestamp(row.get("earned_at"))?,
                    progress: u8::try_from(progress).unwrap_or(100),
                })
            })
            .collect()
    }

    async fn insert_if_absent(&self, record: &AchievementRecord) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO achievements (user_id, badge_id, earned_at, progress)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(&record.badge_id)
        .bind(record.earned_at.to_rfc3339())
        .bind(i64::from(record.progress))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(
                "Badge {} already in ledger for user {}",
                record.badge_id, record.user_id
            );
            Ok(InsertOutcome::AlreadyEarned)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }
}
