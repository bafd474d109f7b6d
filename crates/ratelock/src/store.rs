use async_trait::async_trait;
use swapdesk_types::RateLock;
use tokio::sync::RwLock;

use crate::LockStoreError;

/// Storage slot for the single active rate lock.
///
/// Implementations hold at most one record; `save` replaces whatever was
/// there. Records are returned as stored: freshness is checked by
/// [`crate::RateLockStore`], never trusted here.
#[async_trait]
pub trait LockRepository: Send + Sync {
    async fn load(&self) -> Result<Option<RateLock>, LockStoreError>;

    async fn save(&self, lock: &RateLock) -> Result<(), LockStoreError>;

    async fn delete(&self) -> Result<(), LockStoreError>;
}

/// Process-local slot; does not survive a restart
#[derive(Default)]
pub struct InMemoryLockRepository {
    slot: RwLock<Option<RateLock>>,
}

impl InMemoryLockRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockRepository for InMemoryLockRepository {
    async fn load(&self) -> Result<Option<RateLock>, LockStoreError> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, lock: &RateLock) -> Result<(), LockStoreError> {
        *self.slot.write().await = Some(lock.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), LockStoreError> {
        self.slot.write().await.take();
        Ok(())
    }
}
