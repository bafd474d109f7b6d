use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swapdesk_provider::{Estimate, EstimateQuery, ExchangeProvider};
use swapdesk_ratelock::RateLockStore;
use swapdesk_types::{
    AmountBounds, AmountSide, BoundsCheck, Flow, Quote, QuoteOutcome, QuoteRequest, QuoteResult,
    RateLock, SwapError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{BoundsCache, CurrencyCatalog};

/// Negotiator timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatorConfig {
    /// Upper bound on one estimate round trip
    pub timeout: Duration,
    /// Quiet period before an edit is sent to the provider
    pub debounce: Duration,
    /// Lifetime of cached amount bounds
    pub bounds_ttl: Duration,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(12_000),
            debounce: Duration::from_millis(300),
            bounds_ttl: Duration::from_secs(60),
        }
    }
}

/// Turns amount edits into quotes.
///
/// Each call to [`estimate`](Self::estimate) takes the next generation
/// number. Only the newest generation may replace the applied quote; any
/// older call returns [`QuoteOutcome::Superseded`], whether it was still
/// debouncing or its response simply arrived late.
pub struct QuoteNegotiator {
    provider: Arc<dyn ExchangeProvider>,
    lock_store: Arc<RateLockStore>,
    catalog: Option<Arc<CurrencyCatalog>>,
    bounds: BoundsCache,
    config: NegotiatorConfig,
    generation: AtomicU64,
    applied: Mutex<Option<Quote>>,
}

impl QuoteNegotiator {
    pub fn new(
        provider: Arc<dyn ExchangeProvider>,
        lock_store: Arc<RateLockStore>,
        config: NegotiatorConfig,
    ) -> Self {
        Self {
            provider,
            lock_store,
            catalog: None,
            bounds: BoundsCache::new(config.bounds_ttl),
            config,
            generation: AtomicU64::new(0),
            applied: Mutex::new(None),
        }
    }

    /// Consult the catalog for per-currency capabilities
    pub fn with_catalog(mut self, catalog: Arc<CurrencyCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &NegotiatorConfig {
        &self.config
    }

    /// Generation of the most recently issued request
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The quote currently applied to the form
    pub async fn last_quote(&self) -> Option<Quote> {
        self.applied.lock().await.clone()
    }

    /// Forget the applied quote and cached bounds. Any estimate still in
    /// flight is superseded.
    pub async fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.applied.lock().await.take();
        self.bounds.invalidate().await;
        debug!("negotiator reset");
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.latest_generation() == generation
    }

    /// Drop the applied quote unless a newer request has taken over
    async fn clear_if_latest(&self, generation: u64) {
        let mut applied = self.applied.lock().await;
        if self.is_latest(generation) {
            applied.take();
        }
    }

    /// Quote an amount edit.
    ///
    /// When the newest request fails, the applied quote is cleared too.
    pub async fn estimate(&self, request: QuoteRequest) -> Result<QuoteOutcome, SwapError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.negotiate(generation, request).await;
        if outcome.is_err() {
            self.clear_if_latest(generation).await;
        }
        outcome
    }

    async fn negotiate(
        &self,
        generation: u64,
        request: QuoteRequest,
    ) -> Result<QuoteOutcome, SwapError> {
        let pair = request.pair();

        if pair.is_degenerate() {
            return Err(SwapError::InvalidPair {
                ticker: pair.source,
            });
        }

        let Some(amount) = request.amount() else {
            debug!(generation, raw = request.edit.raw(), "no usable amount, skipping estimate");
            self.clear_if_latest(generation).await;
            return Ok(QuoteOutcome::Empty);
        };

        if !self.config.debounce.is_zero() {
            tokio::time::sleep(self.config.debounce).await;
            if !self.is_latest(generation) {
                debug!(generation, "edit superseded while debouncing");
                return Ok(QuoteOutcome::Superseded { generation });
            }
        }

        if request.flow == Flow::Fixed {
            self.ensure_fixed_rate_supported(&request).await?;

            if let Some(lock) = self.reusable_lock(&request, amount).await {
                debug!(generation, rate_lock_id = %lock.rate_lock_id, "answering from rate lock");
                let result = QuoteResult {
                    source_amount: lock.source_amount,
                    destination_amount: lock.destination_amount,
                    edited: request.direction(),
                    flow: Flow::Fixed,
                    rate_lock_id: Some(lock.rate_lock_id),
                    rate_valid_until: Some(lock.rate_valid_until),
                };
                let bounds = self.bounds.cached(&pair, request.flow).await;
                return Ok(self.apply(generation, request, result, bounds).await);
            }
        }

        let query = EstimateQuery {
            pair: pair.clone(),
            amount,
            side: request.direction(),
            flow: request.flow,
        };

        // Bounds are advisory: a slow or failing range lookup leaves them
        // unknown and never fails the estimate.
        let bounds_lookup = async {
            let lookup = self.bounds.fetch(self.provider.as_ref(), &pair, request.flow);
            match tokio::time::timeout(self.config.timeout, lookup).await {
                Ok(Ok(bounds)) => Some(bounds),
                Ok(Err(e)) => {
                    warn!(pair = %pair.to_symbol(), error = %e, "bounds lookup failed");
                    None
                }
                Err(_) => {
                    warn!(pair = %pair.to_symbol(), "bounds lookup timed out");
                    None
                }
            }
        };
        let estimate_lookup =
            tokio::time::timeout(self.config.timeout, self.provider.estimate(&query));
        let (bounds, response) = futures::future::join(bounds_lookup, estimate_lookup).await;

        if !self.is_latest(generation) {
            debug!(generation, latest = self.latest_generation(), "discarding stale estimate");
            return Ok(QuoteOutcome::Superseded { generation });
        }

        let estimate = response.map_err(|_| {
            warn!(
                generation,
                pair = %pair.to_symbol(),
                timeout_ms = self.config.timeout.as_millis() as u64,
                "estimate timed out"
            );
            SwapError::QuoteUnavailable(format!(
                "no estimate within {} ms",
                self.config.timeout.as_millis()
            ))
        })?;

        let estimate = estimate.map_err(|e| {
            warn!(generation, pair = %pair.to_symbol(), error = %e, "estimate failed");
            SwapError::QuoteUnavailable(e.to_string())
        })?;

        let result = Self::to_result(&request, amount, estimate)?;
        Ok(self.apply(generation, request, result, bounds).await)
    }

    /// Keep the edited amount exactly as typed; take the other side from the
    /// provider.
    fn to_result(
        request: &QuoteRequest,
        amount: Decimal,
        estimate: Estimate,
    ) -> Result<QuoteResult, SwapError> {
        let side = request.direction();
        let (source_amount, destination_amount) = match side {
            AmountSide::Source => (amount, estimate.to_amount),
            AmountSide::Destination => (estimate.from_amount, amount),
        };

        let derived = match side {
            AmountSide::Source => destination_amount,
            AmountSide::Destination => source_amount,
        };
        if derived <= Decimal::ZERO {
            return Err(SwapError::QuoteUnavailable(format!(
                "provider returned a non-positive amount: {derived}"
            )));
        }

        let (rate_lock_id, rate_valid_until) = match request.flow {
            Flow::Fixed => (estimate.rate_id, estimate.valid_until),
            Flow::Floating => (None, None),
        };

        Ok(QuoteResult {
            source_amount,
            destination_amount,
            edited: side,
            flow: request.flow,
            rate_lock_id,
            rate_valid_until,
        })
    }

    async fn apply(
        &self,
        generation: u64,
        request: QuoteRequest,
        result: QuoteResult,
        bounds: Option<AmountBounds>,
    ) -> QuoteOutcome {
        let bounds_check = bounds
            .as_ref()
            .map_or(BoundsCheck::Unknown, |b| b.check(result.source_amount));

        let mut applied = self.applied.lock().await;
        if !self.is_latest(generation) {
            return QuoteOutcome::Superseded { generation };
        }

        if bounds_check.is_violation() {
            info!(generation, check = ?bounds_check, "quoted amount outside provider bounds");
        }
        info!(
            generation,
            pair = %request.pair().to_symbol(),
            source = %result.source_amount,
            destination = %result.destination_amount,
            flow = request.flow.as_str(),
            "quote applied"
        );

        let quote = Quote {
            request,
            result,
            bounds,
            bounds_check,
            generation,
        };
        *applied = Some(quote.clone());
        QuoteOutcome::Quoted(quote)
    }

    async fn ensure_fixed_rate_supported(&self, request: &QuoteRequest) -> Result<(), SwapError> {
        let Some(catalog) = &self.catalog else {
            return Ok(());
        };

        for ticker in [&request.source_ticker, &request.destination_ticker] {
            if let Some(currency) = catalog.lookup(ticker).await {
                if !currency.supports_fixed_rate {
                    return Err(SwapError::QuoteUnavailable(format!(
                        "{} does not support the fixed-rate flow",
                        currency.display_ticker()
                    )));
                }
            }
        }
        Ok(())
    }

    /// A still-valid lock for the same pair whose amount on the edited side
    /// equals the new edit
    async fn reusable_lock(&self, request: &QuoteRequest, amount: Decimal) -> Option<RateLock> {
        let lock = match self.lock_store.current().await {
            Ok(lock) => lock?,
            Err(e) => {
                warn!(error = %e, "rate lock unreadable, requesting a fresh estimate");
                return None;
            }
        };

        let locked_amount = match request.direction() {
            AmountSide::Source => lock.source_amount,
            AmountSide::Destination => lock.destination_amount,
        };
        let same_pair = lock.source_ticker == request.source_ticker
            && lock.destination_ticker == request.destination_ticker;

        (same_pair
            && locked_amount.normalize() == amount.normalize()
            && !lock.is_expired_at(Utc::now()))
        .then_some(lock)
    }
}
