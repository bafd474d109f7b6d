use serde::{Deserialize, Serialize};

use crate::Flow;

/// Normalize a ticker for comparison and map keys ("  BTC " -> "btc")
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_lowercase()
}

/// A tradable asset as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Provider ticker, always lowercase (e.g., "btc", "usdterc20")
    pub ticker: String,

    /// Human name (e.g., "Bitcoin")
    pub display_name: String,

    /// Network the asset settles on (e.g., "btc", "eth")
    pub network: String,

    pub is_fiat: bool,

    pub supports_fixed_rate: bool,

    pub tradable_as_source: bool,

    pub tradable_as_destination: bool,

    /// Highlighted by the provider; featured entries sort first
    pub featured: bool,

    /// Brand color used by the UI, when the provider supplies one
    pub color_hint: Option<String>,

    /// Icon URL or asset reference
    pub icon_ref: Option<String>,

    /// Ticker used by older provider API versions
    pub legacy_ticker: Option<String>,
}

impl Currency {
    pub fn new(ticker: impl Into<String>, display_name: impl Into<String>) -> Self {
        let ticker = normalize_ticker(&ticker.into());
        Self {
            network: ticker.clone(),
            ticker,
            display_name: display_name.into(),
            is_fiat: false,
            supports_fixed_rate: true,
            tradable_as_source: true,
            tradable_as_destination: true,
            featured: false,
            color_hint: None,
            icon_ref: None,
            legacy_ticker: None,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }

    pub fn without_fixed_rate(mut self) -> Self {
        self.supports_fixed_rate = false;
        self
    }

    /// Upper-case ticker for user-facing text
    pub fn display_ticker(&self) -> String {
        self.ticker.to_uppercase()
    }
}

/// Source/destination pair for an exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub source: String,
    pub destination: String,
}

impl CurrencyPair {
    pub fn new(source: impl AsRef<str>, destination: impl AsRef<str>) -> Self {
        Self {
            source: normalize_ticker(source.as_ref()),
            destination: normalize_ticker(destination.as_ref()),
        }
    }

    pub fn to_symbol(&self) -> String {
        format!("{}/{}", self.source, self.destination)
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let parts: Vec<&str> = symbol.split('/').collect();
        if parts.len() == 2 {
            Some(Self::new(parts[0], parts[1]))
        } else {
            None
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            source: self.destination.clone(),
            destination: self.source.clone(),
        }
    }

    /// A pair whose two sides are the same asset cannot be quoted
    pub fn is_degenerate(&self) -> bool {
        self.source == self.destination
    }
}

/// Filter passed to the provider when loading the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub active_only: bool,
    pub flow: Flow,
    pub supports_buy: bool,
    pub supports_sell: bool,
}

impl Default for CatalogFilter {
    fn default() -> Self {
        Self {
            active_only: true,
            flow: Flow::Floating,
            supports_buy: true,
            supports_sell: true,
        }
    }
}
