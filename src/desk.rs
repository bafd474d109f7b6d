use std::sync::Arc;

use swapdesk_config::{validate_config, AppConfig, ProviderConfig, QuoteConfig, TrackingConfig};
use swapdesk_order::{
    AddressValidator, AnonymousSession, OrderSubmitter, SessionContext, StatusSubscription,
    StatusTracker, StatusUpdate, TrackerConfig,
};
use swapdesk_provider::{ExchangeProvider, HttpProvider, ProviderSettings};
use swapdesk_quote::{CurrencyCatalog, NegotiatorConfig, QuoteNegotiator};
use swapdesk_ratelock::{
    InMemoryLockRepository, LockRepository, LockStoreError, RateLockStore, SqliteLockRepository,
};
use swapdesk_types::{
    AddressValidation, CatalogFilter, Currency, Order, OrderRequest, Quote, QuoteOutcome,
    QuoteRequest, RateLock, SwapError,
};
use tracing::{debug, info};

use crate::SwapDeskError;

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG CONVERSION
// ═══════════════════════════════════════════════════════════════════════════

pub fn provider_settings(config: &ProviderConfig) -> ProviderSettings {
    ProviderSettings {
        base_url: config.base_url.clone(),
        api_key: config.api_key.clone(),
        api_key_header: config.api_key_header.clone(),
        request_timeout: config.request_timeout(),
    }
}

pub fn negotiator_config(config: &QuoteConfig) -> NegotiatorConfig {
    NegotiatorConfig {
        timeout: config.timeout(),
        debounce: config.debounce(),
        bounds_ttl: config.bounds_ttl(),
    }
}

pub fn tracker_config(config: &TrackingConfig) -> TrackerConfig {
    TrackerConfig {
        poll_interval: config.poll_interval(),
        transient_failure_threshold: config.transient_failure_threshold,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for [`SwapDesk`]; only the provider is required
pub struct SwapDeskBuilder {
    provider: Option<Arc<dyn ExchangeProvider>>,
    session: Arc<dyn SessionContext>,
    lock_repository: Option<Arc<dyn LockRepository>>,
    negotiator_config: NegotiatorConfig,
    tracker_config: TrackerConfig,
}

impl Default for SwapDeskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapDeskBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            session: Arc::new(AnonymousSession),
            lock_repository: None,
            negotiator_config: NegotiatorConfig::default(),
            tracker_config: TrackerConfig::default(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ExchangeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Session consulted when orders are created; anonymous by default
    pub fn with_session(mut self, session: Arc<dyn SessionContext>) -> Self {
        self.session = session;
        self
    }

    /// Where the rate lock is kept; in memory by default
    pub fn with_lock_repository(mut self, repository: Arc<dyn LockRepository>) -> Self {
        self.lock_repository = Some(repository);
        self
    }

    pub fn with_negotiator_config(mut self, config: NegotiatorConfig) -> Self {
        self.negotiator_config = config;
        self
    }

    pub fn with_tracker_config(mut self, config: TrackerConfig) -> Self {
        self.tracker_config = config;
        self
    }

    pub fn build(self) -> Result<SwapDesk, SwapDeskError> {
        let provider = self.provider.ok_or_else(|| SwapDeskError::MissingField {
            field: "provider".to_string(),
        })?;
        let repository = self
            .lock_repository
            .unwrap_or_else(|| Arc::new(InMemoryLockRepository::new()));

        let lock_store = Arc::new(RateLockStore::new(repository));
        let catalog = Arc::new(CurrencyCatalog::new(provider.clone()));
        let negotiator =
            QuoteNegotiator::new(provider.clone(), lock_store.clone(), self.negotiator_config)
                .with_catalog(catalog.clone());

        Ok(SwapDesk {
            catalog,
            negotiator,
            validator: AddressValidator::new(provider.clone()),
            submitter: OrderSubmitter::new(provider.clone(), lock_store.clone(), self.session),
            tracker: StatusTracker::new(provider, self.tracker_config),
            lock_store,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FACADE
// ═══════════════════════════════════════════════════════════════════════════

/// The quote-and-order engine as seen by the storefront
///
/// Flow of a typical exchange:
/// 1. `load_catalog` once, then `estimate` on every amount edit
/// 2. `capture_lock` when the user accepts a fixed-rate quote
/// 3. `validate_address` for payout and refund
/// 4. `submit_order`, then `subscribe_to_status` until a terminal status
pub struct SwapDesk {
    catalog: Arc<CurrencyCatalog>,
    lock_store: Arc<RateLockStore>,
    negotiator: QuoteNegotiator,
    validator: AddressValidator,
    submitter: OrderSubmitter,
    tracker: StatusTracker,
}

impl SwapDesk {
    pub fn builder() -> SwapDeskBuilder {
        SwapDeskBuilder::new()
    }

    /// Assemble the engine from configuration: HTTP provider, SQLite-backed
    /// rate lock when `storage.rate_lock_db` is set (in memory otherwise)
    pub async fn from_config(
        config: &AppConfig,
        session: Arc<dyn SessionContext>,
    ) -> Result<Self, SwapDeskError> {
        validate_config(config)?;

        let provider = HttpProvider::new(provider_settings(&config.provider))?;

        let repository: Arc<dyn LockRepository> = match &config.storage.rate_lock_db {
            Some(path) => {
                info!(path = %path.display(), "opening rate-lock database");
                Arc::new(SqliteLockRepository::new(path).await?)
            }
            None => {
                debug!("rate lock kept in memory");
                Arc::new(InMemoryLockRepository::new())
            }
        };

        Self::builder()
            .with_provider(Arc::new(provider))
            .with_session(session)
            .with_lock_repository(repository)
            .with_negotiator_config(negotiator_config(&config.quote))
            .with_tracker_config(tracker_config(&config.tracking))
            .build()
    }

    // ─── Catalog ─────────────────────────────────────────────────────────────

    pub async fn load_catalog(&self, filter: &CatalogFilter) -> Result<Vec<Currency>, SwapError> {
        self.catalog.load_catalog(filter).await
    }

    pub async fn lookup(&self, ticker: &str) -> Option<Currency> {
        self.catalog.lookup(ticker).await
    }

    // ─── Quotes ──────────────────────────────────────────────────────────────

    pub async fn estimate(&self, request: QuoteRequest) -> Result<QuoteOutcome, SwapError> {
        self.negotiator.estimate(request).await
    }

    /// Quote currently applied to the form
    pub async fn last_quote(&self) -> Option<Quote> {
        self.negotiator.last_quote().await
    }

    /// Start the form over: forget the applied quote and cached bounds
    pub async fn reset_quote(&self) {
        self.negotiator.reset().await;
    }

    // ─── Rate lock ───────────────────────────────────────────────────────────

    /// Lock the rate of the applied quote. `None` when there is no applied
    /// quote or it carries no lock (floating flow).
    pub async fn capture_lock(&self) -> Result<Option<RateLock>, LockStoreError> {
        match self.negotiator.last_quote().await {
            Some(quote) => self.lock_store.capture(&quote.result, &quote.request).await,
            None => Ok(None),
        }
    }

    pub async fn current_lock(&self) -> Result<Option<RateLock>, LockStoreError> {
        self.lock_store.current().await
    }

    pub async fn clear_lock(&self) -> Result<(), LockStoreError> {
        self.lock_store.clear().await
    }

    // ─── Orders ──────────────────────────────────────────────────────────────

    /// Check `address` for `ticker`; the catalog entry is used when loaded
    pub async fn validate_address(
        &self,
        ticker: &str,
        address: &str,
    ) -> Result<AddressValidation, SwapError> {
        let currency = match self.catalog.lookup(ticker).await {
            Some(currency) => currency,
            None => Currency::new(ticker, ticker.trim().to_uppercase()),
        };
        self.validator.validate(&currency, address).await
    }

    pub async fn submit_order(&self, request: &OrderRequest) -> Result<Order, SwapError> {
        self.submitter.submit(request).await
    }

    /// Poll the order until it reaches a terminal status; dropping or
    /// unsubscribing the returned handle stops the poll
    pub fn subscribe_to_status<F>(
        &self,
        order_id: impl Into<String>,
        on_update: F,
    ) -> StatusSubscription
    where
        F: Fn(StatusUpdate) + Send + Sync + 'static,
    {
        self.tracker.subscribe(order_id, on_update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use swapdesk_provider::{Endpoint, MockProvider, ProviderError};
    use swapdesk_types::{AmountEdit, Flow};

    #[test]
    fn test_config_conversion() {
        let config = AppConfig::default();

        let negotiator = negotiator_config(&config.quote);
        assert_eq!(negotiator, NegotiatorConfig::default());

        let tracker = tracker_config(&config.tracking);
        assert_eq!(tracker, TrackerConfig::default());

        let settings = provider_settings(&config.provider);
        assert_eq!(settings, ProviderSettings::default());
        assert_eq!(settings.request_timeout, Duration::from_millis(15_000));
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = SwapDesk::builder().build().err().unwrap();
        assert!(matches!(err, SwapDeskError::MissingField { ref field } if field == "provider"));

        assert!(SwapDesk::builder()
            .with_provider(Arc::new(MockProvider::new()))
            .build()
            .is_ok());
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.quote.debounce_ms = 0;

        let err = SwapDesk::from_config(&config, Arc::new(AnonymousSession))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SwapDeskError::Config(_)));
    }

    #[tokio::test]
    async fn test_capture_without_quote() {
        let desk = SwapDesk::builder()
            .with_provider(Arc::new(MockProvider::new()))
            .build()
            .unwrap();
        assert!(desk.capture_lock().await.unwrap().is_none());
        assert!(desk.current_lock().await.unwrap().is_none());
    }

    fn quoting_desk(provider: Arc<MockProvider>) -> SwapDesk {
        SwapDesk::builder()
            .with_provider(provider)
            .with_negotiator_config(NegotiatorConfig {
                debounce: Duration::ZERO,
                ..NegotiatorConfig::default()
            })
            .build()
            .unwrap()
    }

    fn fixed(amount: &str) -> QuoteRequest {
        QuoteRequest::new("btc", "eth", AmountEdit::source(amount), Flow::Fixed)
    }

    #[tokio::test]
    async fn test_no_lock_captured_after_failed_estimate() {
        let provider = Arc::new(MockProvider::new().with_rate("btc", "eth", 16.into()));
        let desk = quoting_desk(provider.clone());

        desk.estimate(fixed("1")).await.unwrap();
        provider.set_failure(Endpoint::Estimate, Some(ProviderError::Timeout));
        assert!(desk.estimate(fixed("2")).await.is_err());

        assert!(desk.last_quote().await.is_none());
        assert!(desk.capture_lock().await.unwrap().is_none());
        assert!(desk.current_lock().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_quote() {
        let provider = Arc::new(MockProvider::new().with_rate("btc", "eth", 16.into()));
        let desk = quoting_desk(provider);

        desk.estimate(fixed("1")).await.unwrap();
        assert!(desk.last_quote().await.is_some());

        desk.reset_quote().await;
        assert!(desk.last_quote().await.is_none());
        assert!(desk.capture_lock().await.unwrap().is_none());
    }
}
