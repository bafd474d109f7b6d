use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use swapdesk_types::RateLock;

use crate::store::LockRepository;
use crate::LockStoreError;

/// Key of the one row this table ever holds
const ACTIVE_SLOT: &str = "active";

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE LOCK REPOSITORY
// ═══════════════════════════════════════════════════════════════════════════

pub struct SqliteLockRepository {
    pool: SqlitePool,
}

impl SqliteLockRepository {
    /// Open (or create) the database file at `db_path`
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, LockStoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| LockStoreError::ConnectionError(e.to_string()))?;

        let repo = Self { pool };
        repo.run_migrations().await?;

        Ok(repo)
    }

    /// Create an in-memory SQLite database (for testing)
    pub async fn in_memory() -> Result<Self, LockStoreError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| LockStoreError::ConnectionError(e.to_string()))?;

        let repo = Self { pool };
        repo.run_migrations().await?;

        Ok(repo)
    }

    async fn run_migrations(&self) -> Result<(), LockStoreError> {
        sqlx::query(include_str!("../migrations/001_create_rate_lock.sql"))
            .execute(&self.pool)
            .await
            .map_err(|e| LockStoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// A row written by another build or edited by hand is reported as a
    /// serialization error, never a panic
    fn row_to_lock(row: &SqliteRow) -> Result<RateLock, LockStoreError> {
        let text = |column: &str| -> Result<String, LockStoreError> {
            row.try_get(column)
                .map_err(|e| LockStoreError::SerializationError(format!("{column}: {e}")))
        };
        let int = |column: &str| -> Result<i64, LockStoreError> {
            row.try_get(column)
                .map_err(|e| LockStoreError::SerializationError(format!("{column}: {e}")))
        };
        let decimal = |column: &str| -> Result<Decimal, LockStoreError> {
            Decimal::from_str(&text(column)?)
                .map_err(|e| LockStoreError::SerializationError(format!("{column}: {e}")))
        };

        let valid_until_ms = int("rate_valid_until_ms")?;
        let rate_valid_until = DateTime::<Utc>::from_timestamp_millis(valid_until_ms)
            .ok_or_else(|| {
                LockStoreError::SerializationError(format!(
                    "rate_valid_until_ms out of range: {valid_until_ms}"
                ))
            })?;

        Ok(RateLock {
            rate_lock_id: text("rate_lock_id")?,
            source_ticker: text("source_ticker")?,
            destination_ticker: text("destination_ticker")?,
            source_amount: decimal("source_amount")?,
            destination_amount: decimal("destination_amount")?,
            rate_valid_until,
            captured_at_epoch_ms: int("captured_at_epoch_ms")?,
        })
    }
}

#[async_trait]
impl LockRepository for SqliteLockRepository {
    async fn load(&self) -> Result<Option<RateLock>, LockStoreError> {
        let row = sqlx::query("SELECT * FROM rate_lock WHERE slot = ?")
            .bind(ACTIVE_SLOT)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LockStoreError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_lock).transpose()
    }

    async fn save(&self, lock: &RateLock) -> Result<(), LockStoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO rate_lock (
                slot, rate_lock_id, source_ticker, destination_ticker,
                source_amount, destination_amount,
                rate_valid_until_ms, captured_at_epoch_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ACTIVE_SLOT)
        .bind(&lock.rate_lock_id)
        .bind(&lock.source_ticker)
        .bind(&lock.destination_ticker)
        .bind(lock.source_amount.to_string())
        .bind(lock.destination_amount.to_string())
        .bind(lock.rate_valid_until.timestamp_millis())
        .bind(lock.captured_at_epoch_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| LockStoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self) -> Result<(), LockStoreError> {
        sqlx::query("DELETE FROM rate_lock WHERE slot = ?")
            .bind(ACTIVE_SLOT)
            .execute(&self.pool)
            .await
            .map_err(|e| LockStoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
