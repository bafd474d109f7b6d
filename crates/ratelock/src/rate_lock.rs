use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use swapdesk_types::{QuoteRequest, QuoteResult, RateLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::{InMemoryLockRepository, LockRepository};
use crate::LockStoreError;

/// Holds the single active fixed-rate lock.
///
/// Every operation runs under one async mutex, so capture, read and clear
/// never interleave. Reads re-check expiry and field sanity and evict a
/// record that fails either check.
pub struct RateLockStore {
    repo: Arc<dyn LockRepository>,
    op: Mutex<()>,
}

impl Default for RateLockStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RateLockStore {
    pub fn new(repo: Arc<dyn LockRepository>) -> Self {
        Self {
            repo,
            op: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLockRepository::new()))
    }

    /// Store the lock carried by an accepted quote, replacing any previous
    /// one. Floating quotes, or fixed quotes missing an id or expiry, are a
    /// no-op and return `None`.
    pub async fn capture(
        &self,
        quote: &QuoteResult,
        request: &QuoteRequest,
    ) -> Result<Option<RateLock>, LockStoreError> {
        let Some(lock) = RateLock::from_quote(quote, request, Utc::now()) else {
            debug!(flow = ?quote.flow, "quote carries no rate lock, nothing captured");
            return Ok(None);
        };

        let _guard = self.op.lock().await;
        self.repo.save(&lock).await?;
        info!(
            rate_lock_id = %lock.rate_lock_id,
            pair = %format!("{}/{}", lock.source_ticker, lock.destination_ticker),
            valid_until = %lock.rate_valid_until,
            "captured rate lock"
        );

        Ok(Some(lock))
    }

    /// The active lock, if it has not expired
    pub async fn current(&self) -> Result<Option<RateLock>, LockStoreError> {
        self.current_at(Utc::now()).await
    }

    /// The active lock as of `now`
    pub async fn current_at(&self, now: DateTime<Utc>) -> Result<Option<RateLock>, LockStoreError> {
        let _guard = self.op.lock().await;

        let lock = match self.repo.load().await {
            Ok(Some(lock)) => lock,
            Ok(None) => return Ok(None),
            Err(LockStoreError::SerializationError(reason)) => {
                warn!(reason = %reason, "unreadable rate lock record, evicting");
                self.repo.delete().await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if lock.is_expired_at(now) {
            info!(rate_lock_id = %lock.rate_lock_id, "rate lock expired, evicting");
            self.repo.delete().await?;
            return Ok(None);
        }

        if !lock.is_well_formed() {
            warn!(rate_lock_id = %lock.rate_lock_id, "malformed rate lock record, evicting");
            self.repo.delete().await?;
            return Ok(None);
        }

        Ok(Some(lock))
    }

    /// Whether the active lock still describes these amounts. Any mismatch
    /// on any field is a miss, as is an absent or expired lock.
    pub async fn matches(
        &self,
        source_ticker: &str,
        destination_ticker: &str,
        source_amount: Decimal,
        destination_amount: Decimal,
    ) -> Result<bool, LockStoreError> {
        Ok(self.current().await?.is_some_and(|lock| {
            lock.matches(
                source_ticker,
                destination_ticker,
                source_amount,
                destination_amount,
            )
        }))
    }

    pub async fn clear(&self) -> Result<(), LockStoreError> {
        let _guard = self.op.lock().await;
        self.repo.delete().await?;
        debug!("rate lock cleared");
        Ok(())
    }
}
