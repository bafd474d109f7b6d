use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use swapdesk_types::{
    AmountBounds, AmountSide, CatalogFilter, Currency, CurrencyPair, Flow, OrderStatus,
    StatusSnapshot,
};

use crate::{
    AddressVerdict, CreateExchange, CreatedExchange, Estimate, EstimateQuery, ExchangeProvider,
    ProviderError,
};

/// Provider operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Currencies,
    Estimate,
    Range,
    ValidateAddress,
    CreateExchange,
    Status,
}

struct MockState {
    currencies: Vec<Currency>,
    rates: HashMap<String, Decimal>,
    bounds: HashMap<(String, Flow), AmountBounds>,
    invalid_addresses: HashMap<String, Option<String>>,
    status_script: VecDeque<Result<OrderStatus, ProviderError>>,
    estimate_delays: HashMap<String, Duration>,
    range_delay: Option<Duration>,
    failures: HashMap<Endpoint, ProviderError>,
    calls: HashMap<Endpoint, usize>,
    created: Vec<CreateExchange>,
    lock_ttl: chrono::Duration,
    sequence: u64,
}

/// Scripted in-process provider for tests
pub struct MockProvider {
    id: String,
    state: Mutex<MockState>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            id: "mock".to_string(),
            state: Mutex::new(MockState {
                currencies: Vec::new(),
                rates: HashMap::new(),
                bounds: HashMap::new(),
                invalid_addresses: HashMap::new(),
                status_script: VecDeque::new(),
                estimate_delays: HashMap::new(),
                range_delay: None,
                failures: HashMap::new(),
                calls: HashMap::new(),
                created: Vec::new(),
                lock_ttl: chrono::Duration::minutes(20),
                sequence: 0,
            }),
        }
    }

    // Never held across an await
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_currencies(self, currencies: Vec<Currency>) -> Self {
        self.state().currencies = currencies;
        self
    }

    /// Units of `destination` per unit of `source`; the reverse pair is implied
    pub fn with_rate(self, source: &str, destination: &str, rate: Decimal) -> Self {
        let symbol = CurrencyPair::new(source, destination).to_symbol();
        self.state().rates.insert(symbol, rate);
        self
    }

    pub fn with_bounds(
        self,
        source: &str,
        destination: &str,
        flow: Flow,
        bounds: AmountBounds,
    ) -> Self {
        let symbol = CurrencyPair::new(source, destination).to_symbol();
        self.state().bounds.insert((symbol, flow), bounds);
        self
    }

    pub fn with_invalid_address(self, address: &str, message: Option<&str>) -> Self {
        self.state()
            .invalid_addresses
            .insert(address.to_string(), message.map(str::to_string));
        self
    }

    /// Answers for consecutive status polls; the last entry repeats
    pub fn with_status_script(self, script: Vec<Result<OrderStatus, ProviderError>>) -> Self {
        self.state().status_script = script.into();
        self
    }

    /// Delay the estimate answer for one specific edited amount
    pub fn with_estimate_delay(self, amount: Decimal, delay: Duration) -> Self {
        self.state()
            .estimate_delays
            .insert(amount.normalize().to_string(), delay);
        self
    }

    /// Delay every exchange-range answer
    pub fn with_range_delay(self, delay: Duration) -> Self {
        self.state().range_delay = Some(delay);
        self
    }

    pub fn with_lock_ttl(self, ttl: chrono::Duration) -> Self {
        self.state().lock_ttl = ttl;
        self
    }

    /// Make one endpoint fail (`Some`) or recover (`None`)
    pub fn set_failure(&self, endpoint: Endpoint, error: Option<ProviderError>) {
        let mut state = self.state();
        match error {
            Some(error) => {
                state.failures.insert(endpoint, error);
            }
            None => {
                state.failures.remove(&endpoint);
            }
        }
    }

    pub fn set_currencies(&self, currencies: Vec<Currency>) {
        self.state().currencies = currencies;
    }

    pub fn push_status(&self, status: Result<OrderStatus, ProviderError>) {
        self.state().status_script.push_back(status);
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.state().calls.get(&endpoint).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    pub fn created_exchanges(&self) -> Vec<CreateExchange> {
        self.state().created.clone()
    }

    /// Count the call and return the injected failure, if any
    fn record(&self, endpoint: Endpoint) -> Result<(), ProviderError> {
        let mut state = self.state();
        *state.calls.entry(endpoint).or_insert(0) += 1;
        match state.failures.get(&endpoint) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn rate_for(state: &MockState, pair: &CurrencyPair) -> Option<Decimal> {
        if let Some(rate) = state.rates.get(&pair.to_symbol()) {
            return Some(*rate);
        }
        state
            .rates
            .get(&pair.reversed().to_symbol())
            .filter(|rate| !rate.is_zero())
            .map(|rate| (Decimal::ONE / *rate).round_dp(8))
    }
}

#[async_trait]
impl ExchangeProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_currencies(&self, filter: &CatalogFilter) -> Result<Vec<Currency>, ProviderError> {
        self.record(Endpoint::Currencies)?;
        let state = self.state();
        Ok(state
            .currencies
            .iter()
            .filter(|c| filter.flow != Flow::Fixed || c.supports_fixed_rate)
            .cloned()
            .collect())
    }

    async fn estimate(&self, query: &EstimateQuery) -> Result<Estimate, ProviderError> {
        self.record(Endpoint::Estimate)?;

        let (rate, delay, lock_ttl, sequence) = {
            let mut state = self.state();
            let rate = Self::rate_for(&state, &query.pair).ok_or_else(|| {
                ProviderError::BadRequest(format!("pair {} is inactive", query.pair.to_symbol()))
            })?;
            let delay = state
                .estimate_delays
                .get(&query.amount.normalize().to_string())
                .copied();
            state.sequence += 1;
            (rate, delay, state.lock_ttl, state.sequence)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (from_amount, to_amount) = match query.side {
            AmountSide::Source => (query.amount, (query.amount * rate).round_dp(8)),
            AmountSide::Destination => (
                (query.amount / rate).round_dp(8),
                query.amount,
            ),
        };

        let (rate_id, valid_until) = match query.flow {
            Flow::Fixed => (Some(format!("rate-{sequence}")), Some(Utc::now() + lock_ttl)),
            Flow::Floating => (None, None),
        };

        Ok(Estimate {
            from_amount,
            to_amount,
            rate_id,
            valid_until,
        })
    }

    async fn exchange_range(
        &self,
        pair: &CurrencyPair,
        flow: Flow,
    ) -> Result<AmountBounds, ProviderError> {
        self.record(Endpoint::Range)?;
        let (bounds, delay) = {
            let state = self.state();
            let bounds = state.bounds.get(&(pair.to_symbol(), flow)).cloned();
            (bounds, state.range_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        bounds.ok_or_else(|| ProviderError::NotFound(format!("no range for {}", pair.to_symbol())))
    }

    async fn validate_address(
        &self,
        _currency: &str,
        address: &str,
    ) -> Result<AddressVerdict, ProviderError> {
        self.record(Endpoint::ValidateAddress)?;
        let verdict = match self.state().invalid_addresses.get(address) {
            Some(message) => AddressVerdict {
                result: false,
                message: message.clone(),
            },
            None => AddressVerdict {
                result: true,
                message: None,
            },
        };
        Ok(verdict)
    }

    async fn create_exchange(
        &self,
        request: &CreateExchange,
    ) -> Result<CreatedExchange, ProviderError> {
        self.record(Endpoint::CreateExchange)?;
        let mut state = self.state();
        state.sequence += 1;
        let sequence = state.sequence;
        let valid_until = match request.flow {
            Flow::Fixed => Some(Utc::now() + state.lock_ttl),
            Flow::Floating => None,
        };
        state.created.push(request.clone());

        Ok(CreatedExchange {
            id: format!("order-{sequence}"),
            payin_address: format!("deposit-{}-{sequence}", request.pair.source),
            payin_extra_id: None,
            payout_address: request.payout_address.clone(),
            from_amount: request.from_amount,
            to_amount: request.to_amount,
            valid_until,
        })
    }

    async fn exchange_status(&self, order_id: &str) -> Result<StatusSnapshot, ProviderError> {
        self.record(Endpoint::Status)?;
        let mut state = self.state();
        let next = if state.status_script.len() > 1 {
            state.status_script.pop_front()
        } else {
            state.status_script.front().cloned()
        };

        match next {
            Some(Ok(status)) => Ok(StatusSnapshot::new(order_id, status)),
            Some(Err(error)) => Err(error),
            None => Err(ProviderError::NotFound(format!("order {order_id}"))),
        }
    }
}
