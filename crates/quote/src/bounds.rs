use std::collections::HashMap;
use std::time::{Duration, Instant};
use swapdesk_provider::{ExchangeProvider, ProviderError};
use swapdesk_types::{AmountBounds, CurrencyPair, Flow};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedBounds {
    bounds: AmountBounds,
    fetched_at: Instant,
}

/// Amount bounds per (pair, flow), kept for a fixed time-to-live
pub struct BoundsCache {
    ttl: Duration,
    entries: RwLock<HashMap<(CurrencyPair, Flow), CachedBounds>>,
}

impl BoundsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh cached bounds, without touching the provider
    pub async fn cached(&self, pair: &CurrencyPair, flow: Flow) -> Option<AmountBounds> {
        let entries = self.entries.read().await;
        entries
            .get(&(pair.clone(), flow))
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.bounds.clone())
    }

    /// Cached bounds, or a provider lookup that refreshes the cache
    pub async fn fetch(
        &self,
        provider: &dyn ExchangeProvider,
        pair: &CurrencyPair,
        flow: Flow,
    ) -> Result<AmountBounds, ProviderError> {
        if let Some(bounds) = self.cached(pair, flow).await {
            return Ok(bounds);
        }

        let bounds = provider.exchange_range(pair, flow).await?;
        debug!(
            pair = %pair.to_symbol(),
            flow = flow.as_str(),
            min = %bounds.min_source_amount,
            "bounds refreshed"
        );

        self.entries.write().await.insert(
            (pair.clone(), flow),
            CachedBounds {
                bounds: bounds.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(bounds)
    }

    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use swapdesk_provider::{Endpoint, MockProvider};

    fn bounds() -> AmountBounds {
        AmountBounds {
            min_source_amount: Decimal::new(1, 2),
            max_source_amount: Some(Decimal::from(5)),
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let provider = MockProvider::new().with_bounds("btc", "eth", Flow::Floating, bounds());
        let cache = BoundsCache::new(Duration::from_secs(60));
        let pair = CurrencyPair::new("btc", "eth");

        assert_eq!(cache.fetch(&provider, &pair, Flow::Floating).await.unwrap(), bounds());
        assert_eq!(cache.fetch(&provider, &pair, Flow::Floating).await.unwrap(), bounds());
        assert_eq!(provider.calls(Endpoint::Range), 1);

        // flow is part of the key
        assert!(cache.fetch(&provider, &pair, Flow::Fixed).await.is_err());
        assert_eq!(provider.calls(Endpoint::Range), 2);
    }

    #[tokio::test]
    async fn test_cache_expiration() {
        let provider = MockProvider::new().with_bounds("btc", "eth", Flow::Floating, bounds());
        let cache = BoundsCache::new(Duration::from_millis(20));
        let pair = CurrencyPair::new("btc", "eth");

        cache.fetch(&provider, &pair, Flow::Floating).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.cached(&pair, Flow::Floating).await.is_none());

        cache.fetch(&provider, &pair, Flow::Floating).await.unwrap();
        assert_eq!(provider.calls(Endpoint::Range), 2);
    }
}
