use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use swapdesk_provider::ExchangeProvider;
use swapdesk_types::{normalize_ticker, CatalogFilter, Currency, SwapError};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Tradable currencies for the session, keyed by ticker
pub struct CurrencyCatalog {
    provider: Arc<dyn ExchangeProvider>,
    currencies: RwLock<Vec<Currency>>,
    by_ticker: RwLock<HashMap<String, Currency>>,
}

impl CurrencyCatalog {
    pub fn new(provider: Arc<dyn ExchangeProvider>) -> Self {
        Self {
            provider,
            currencies: RwLock::new(Vec::new()),
            by_ticker: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch, de-duplicate and order the catalog, replacing the previous one.
    ///
    /// A failed or empty load leaves the previously loaded catalog in place.
    pub async fn load_catalog(&self, filter: &CatalogFilter) -> Result<Vec<Currency>, SwapError> {
        let listed = self
            .provider
            .list_currencies(filter)
            .await
            .map_err(|e| {
                warn!(provider = self.provider.id(), error = %e, "currency catalog load failed");
                SwapError::CatalogUnavailable(e.to_string())
            })?;

        let listed_count = listed.len();
        let currencies = resolve_catalog(listed);
        if currencies.is_empty() {
            warn!(provider = self.provider.id(), "provider returned an empty catalog");
            return Err(SwapError::CatalogUnavailable(
                "provider returned no currencies".to_string(),
            ));
        }

        info!(
            listed = listed_count,
            unique = currencies.len(),
            flow = filter.flow.as_str(),
            "currency catalog loaded"
        );

        let index = currencies
            .iter()
            .map(|c| (c.ticker.clone(), c.clone()))
            .collect();
        *self.by_ticker.write().await = index;
        *self.currencies.write().await = currencies.clone();

        Ok(currencies)
    }

    /// Case-insensitive lookup by ticker
    pub async fn lookup(&self, ticker: &str) -> Option<Currency> {
        self.by_ticker
            .read()
            .await
            .get(&normalize_ticker(ticker))
            .cloned()
    }

    /// The last loaded catalog, in presentation order
    pub async fn currencies(&self) -> Vec<Currency> {
        self.currencies.read().await.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        !self.by_ticker.read().await.is_empty()
    }
}

/// Collapse duplicate tickers (the featured listing wins, otherwise the first
/// one seen) and sort featured first, then by display name.
pub fn resolve_catalog(listed: Vec<Currency>) -> Vec<Currency> {
    let mut unique: Vec<Currency> = Vec::with_capacity(listed.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for mut currency in listed {
        currency.ticker = normalize_ticker(&currency.ticker);
        if currency.ticker.is_empty() {
            warn!(name = %currency.display_name, "skipping currency without a ticker");
            continue;
        }

        match position.get(&currency.ticker) {
            Some(&idx) => {
                if currency.featured && !unique[idx].featured {
                    unique[idx] = currency;
                }
            }
            None => {
                position.insert(currency.ticker.clone(), unique.len());
                unique.push(currency);
            }
        }
    }

    unique.sort_by(presentation_order);
    unique
}

fn presentation_order(a: &Currency, b: &Currency) -> Ordering {
    b.featured
        .cmp(&a.featured)
        .then_with(|| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        })
        .then_with(|| a.ticker.cmp(&b.ticker))
}
