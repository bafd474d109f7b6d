use chrono::Utc;
use std::sync::Arc;
use swapdesk_provider::{CreateExchange, ExchangeProvider, ProviderError};
use swapdesk_ratelock::RateLockStore;
use swapdesk_types::{
    fallback_address_message, CurrencyPair, Flow, Order, OrderRequest, RateLock, SwapError,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::SessionContext;

/// Creates exchange orders from a validated request
pub struct OrderSubmitter {
    provider: Arc<dyn ExchangeProvider>,
    lock_store: Arc<RateLockStore>,
    session: Arc<dyn SessionContext>,
}

impl OrderSubmitter {
    pub fn new(
        provider: Arc<dyn ExchangeProvider>,
        lock_store: Arc<RateLockStore>,
        session: Arc<dyn SessionContext>,
    ) -> Self {
        Self {
            provider,
            lock_store,
            session,
        }
    }

    /// Create the order.
    ///
    /// Everything is checked locally first: resolved amounts, address
    /// currencies, and under the fixed flow a live rate lock matching the
    /// submitted amounts. Creation is sent once; on failure nothing is
    /// changed and the caller decides whether to retry.
    pub async fn submit(&self, request: &OrderRequest) -> Result<Order, SwapError> {
        let (source_amount, destination_amount) =
            request.resolved_amounts().ok_or(SwapError::MissingAmount)?;

        let source = request.normalized_source();
        let destination = request.normalized_destination();
        if source == destination {
            return Err(SwapError::InvalidPair { ticker: source });
        }

        Self::check_address_currency(request.payout.currency(), &destination)?;
        if let Some(refund) = &request.refund {
            Self::check_address_currency(refund.currency(), &source)?;
        }

        let lock = match request.flow {
            Flow::Fixed => Some(self.live_lock(request).await?),
            Flow::Floating => None,
        };

        let idempotency_key = Uuid::new_v4().to_string();
        let body = CreateExchange {
            pair: CurrencyPair::new(&source, &destination),
            flow: request.flow,
            side: request.direction,
            from_amount: source_amount,
            to_amount: destination_amount,
            payout_address: request.payout.address().to_string(),
            payout_extra_id: request.payout_extra_id.clone(),
            refund_address: request.refund.as_ref().map(|r| r.address().to_string()),
            rate_id: lock.as_ref().map(|l| l.rate_lock_id.clone()),
            user_id: self.session.authenticated_user(),
            idempotency_key: idempotency_key.clone(),
        };

        let created = self.provider.create_exchange(&body).await.map_err(|e| {
            error!(
                pair = %body.pair.to_symbol(),
                idempotency_key = %idempotency_key,
                error = %e,
                "order creation failed"
            );
            SwapError::OrderCreationFailed {
                reason: creation_failure_reason(&e, &idempotency_key),
            }
        })?;

        if created.id.trim().is_empty() || created.payin_address.trim().is_empty() {
            return Err(SwapError::OrderCreationFailed {
                reason: "provider response is missing the order id or deposit address"
                    .to_string(),
            });
        }

        let order = Order {
            order_id: created.id,
            flow: request.flow,
            direction: request.direction,
            source_ticker: source,
            destination_ticker: destination,
            source_amount: created.from_amount,
            destination_amount: created.to_amount,
            deposit_address: created.payin_address,
            deposit_extra_id: created.payin_extra_id,
            payout_address: created.payout_address,
            refund_address: body.refund_address,
            rate_lock_id: body.rate_id,
            created_at: Utc::now(),
            valid_until: created
                .valid_until
                .or_else(|| lock.map(|l| l.rate_valid_until)),
            idempotency_key,
        };

        info!(
            order_id = %order.order_id,
            flow = order.flow.as_str(),
            source = %order.source_amount,
            destination = %order.destination_amount,
            "order created"
        );

        Ok(order)
    }

    fn check_address_currency(address_currency: &str, expected: &str) -> Result<(), SwapError> {
        if address_currency == expected {
            return Ok(());
        }
        Err(SwapError::AddressInvalid {
            currency: expected.to_string(),
            message: fallback_address_message(expected),
        })
    }

    async fn live_lock(&self, request: &OrderRequest) -> Result<RateLock, SwapError> {
        let lock = self.lock_store.current().await.map_err(|e| {
            warn!(error = %e, "rate lock unreadable at submission");
            SwapError::StaleQuote(format!("rate lock unreadable: {e}"))
        })?;

        let Some(lock) = lock else {
            return Err(SwapError::StaleQuote(
                "the locked rate has expired; request a new quote".to_string(),
            ));
        };

        let (source_amount, destination_amount) =
            request.resolved_amounts().ok_or(SwapError::MissingAmount)?;
        if !lock.matches(
            &request.source_ticker,
            &request.destination_ticker,
            source_amount,
            destination_amount,
        ) {
            return Err(SwapError::StaleQuote(
                "the locked rate no longer matches the quoted amounts".to_string(),
            ));
        }

        Ok(lock)
    }
}

/// A timed-out or dropped request may still have created the order
fn creation_failure_reason(err: &ProviderError, idempotency_key: &str) -> String {
    match err {
        ProviderError::Timeout | ProviderError::Transport(_) => format!(
            "{err}; the order may exist, check before retrying (idempotency key {idempotency_key})"
        ),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnonymousSession, StaticSession};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use swapdesk_provider::{Endpoint, MockProvider};
    use swapdesk_types::{
        AddressValidation, AmountEdit, AmountSide, QuoteRequest, QuoteResult, ValidatedAddress,
    };

    fn address(currency: &str, address: &str) -> ValidatedAddress {
        ValidatedAddress::try_from(AddressValidation::valid(currency, address)).unwrap()
    }

    fn request(flow: Flow) -> OrderRequest {
        OrderRequest {
            source_ticker: "btc".to_string(),
            destination_ticker: "eth".to_string(),
            flow,
            direction: AmountSide::Source,
            source_amount: Some(Decimal::ONE),
            destination_amount: Some(Decimal::from(16)),
            payout: address("eth", "0xpayout"),
            refund: None,
            payout_extra_id: None,
        }
    }

    fn submitter(provider: &Arc<MockProvider>, lock_store: &Arc<RateLockStore>) -> OrderSubmitter {
        OrderSubmitter::new(provider.clone(), lock_store.clone(), Arc::new(AnonymousSession))
    }

    async fn capture(lock_store: &RateLockStore, valid_for: Duration) {
        let quote = QuoteResult {
            source_amount: Decimal::ONE,
            destination_amount: Decimal::from(16),
            edited: AmountSide::Source,
            flow: Flow::Fixed,
            rate_lock_id: Some("rate-9".to_string()),
            rate_valid_until: Some(Utc::now() + valid_for),
        };
        let request = QuoteRequest::new("btc", "eth", AmountEdit::source("1"), Flow::Fixed);
        lock_store.capture(&quote, &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_floating_submission() {
        let provider = Arc::new(MockProvider::new());
        let lock_store = Arc::new(RateLockStore::in_memory());
        let order = submitter(&provider, &lock_store)
            .submit(&request(Flow::Floating))
            .await
            .unwrap();

        assert!(order.order_id.starts_with("order-"));
        assert!(order.deposit_address.starts_with("deposit-btc"));
        assert_eq!(order.payout_address, "0xpayout");
        assert_eq!(order.rate_lock_id, None);
        assert!(Uuid::parse_str(&order.idempotency_key).is_ok());

        let sent = provider.created_exchanges();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].idempotency_key, order.idempotency_key);
        assert_eq!(sent[0].user_id, None);
    }

    #[tokio::test]
    async fn test_missing_amount_rejected_locally() {
        let provider = Arc::new(MockProvider::new());
        let lock_store = Arc::new(RateLockStore::in_memory());
        let mut pending = request(Flow::Floating);
        pending.destination_amount = None;

        let err = submitter(&provider, &lock_store)
            .submit(&pending)
            .await
            .unwrap_err();
        assert_eq!(err, SwapError::MissingAmount);
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_payout_validated_for_wrong_currency() {
        let provider = Arc::new(MockProvider::new());
        let lock_store = Arc::new(RateLockStore::in_memory());
        let mut wrong = request(Flow::Floating);
        wrong.payout = address("btc", "bc1qpayout");

        let err = submitter(&provider, &lock_store)
            .submit(&wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::AddressInvalid { ref currency, .. } if currency == "eth"));
    }

    #[tokio::test]
    async fn test_fixed_submission_uses_lock() {
        let provider = Arc::new(MockProvider::new());
        let lock_store = Arc::new(RateLockStore::in_memory());
        capture(&lock_store, Duration::minutes(10)).await;

        let order = submitter(&provider, &lock_store)
            .submit(&request(Flow::Fixed))
            .await
            .unwrap();
        assert_eq!(order.rate_lock_id.as_deref(), Some("rate-9"));
        assert!(order.valid_until.is_some());
        assert_eq!(
            provider.created_exchanges()[0].rate_id.as_deref(),
            Some("rate-9")
        );
    }

    #[tokio::test]
    async fn test_fixed_submission_without_lock_is_stale() {
        let provider = Arc::new(MockProvider::new());
        let lock_store = Arc::new(RateLockStore::in_memory());

        let err = submitter(&provider, &lock_store)
            .submit(&request(Flow::Fixed))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::StaleQuote(_)));
        assert_eq!(provider.calls(Endpoint::CreateExchange), 0);
    }

    #[tokio::test]
    async fn test_fixed_submission_with_changed_amount_is_stale() {
        let provider = Arc::new(MockProvider::new());
        let lock_store = Arc::new(RateLockStore::in_memory());
        capture(&lock_store, Duration::minutes(10)).await;

        let mut edited = request(Flow::Fixed);
        edited.destination_amount = Some(Decimal::from(17));
        let err = submitter(&provider, &lock_store)
            .submit(&edited)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::StaleQuote(_)));
        assert_eq!(provider.calls(Endpoint::CreateExchange), 0);
    }

    #[tokio::test]
    async fn test_timeout_reports_possible_order() {
        let provider = Arc::new(MockProvider::new());
        provider.set_failure(Endpoint::CreateExchange, Some(ProviderError::Timeout));
        let lock_store = Arc::new(RateLockStore::in_memory());

        let err = submitter(&provider, &lock_store)
            .submit(&request(Flow::Floating))
            .await
            .unwrap_err();
        match err {
            SwapError::OrderCreationFailed { reason } => {
                assert!(reason.contains("may exist"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // sent exactly once
        assert_eq!(provider.calls(Endpoint::CreateExchange), 1);
    }

    #[tokio::test]
    async fn test_session_user_attached() {
        let provider = Arc::new(MockProvider::new());
        let submitter = OrderSubmitter::new(
            provider.clone(),
            Arc::new(RateLockStore::in_memory()),
            Arc::new(StaticSession::new("user-42", "token")),
        );

        submitter.submit(&request(Flow::Floating)).await.unwrap();
        assert_eq!(
            provider.created_exchanges()[0].user_id.as_deref(),
            Some("user-42")
        );
    }
}
