use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use swapdesk_types::{
    AmountBounds, AmountSide, CatalogFilter, Currency, CurrencyPair, Flow, StatusSnapshot,
};

use crate::ProviderError;

/// Outbound boundary to the exchange provider gateway
#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    /// Unique identifier for this provider
    fn id(&self) -> &str;

    /// Tradable currencies matching the filter
    async fn list_currencies(&self, filter: &CatalogFilter) -> Result<Vec<Currency>, ProviderError>;

    /// Estimate the dependent amount for one edited amount
    async fn estimate(&self, query: &EstimateQuery) -> Result<Estimate, ProviderError>;

    /// Minimum and maximum source amounts for a pair and flow
    async fn exchange_range(
        &self,
        pair: &CurrencyPair,
        flow: Flow,
    ) -> Result<AmountBounds, ProviderError>;

    /// Check an address against a currency's address format
    async fn validate_address(
        &self,
        currency: &str,
        address: &str,
    ) -> Result<AddressVerdict, ProviderError>;

    /// Create an exchange order
    async fn create_exchange(
        &self,
        request: &CreateExchange,
    ) -> Result<CreatedExchange, ProviderError>;

    /// Current status of an order
    async fn exchange_status(&self, order_id: &str) -> Result<StatusSnapshot, ProviderError>;

    /// Health check
    async fn health_check(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateQuery {
    pub pair: CurrencyPair,
    /// The edited amount, on the side named by `side`
    pub amount: Decimal,
    pub side: AmountSide,
    pub flow: Flow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Estimate {
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub rate_id: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Provider answer from the address validation endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressVerdict {
    pub result: bool,
    pub message: Option<String>,
}

/// Order creation body, already checked by the submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateExchange {
    pub pair: CurrencyPair,
    pub flow: Flow,
    pub side: AmountSide,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub payout_address: String,
    pub payout_extra_id: Option<String>,
    pub refund_address: Option<String>,
    pub rate_id: Option<String>,
    pub user_id: Option<String>,
    pub idempotency_key: String,
}

/// Provider response to order creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedExchange {
    pub id: String,
    pub payin_address: String,
    pub payin_extra_id: Option<String>,
    pub payout_address: String,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub valid_until: Option<DateTime<Utc>>,
}
