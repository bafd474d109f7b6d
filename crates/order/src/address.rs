use std::sync::Arc;
use swapdesk_provider::ExchangeProvider;
use swapdesk_types::{AddressValidation, Currency, SwapError, ValidatedAddress};
use tracing::{debug, warn};

/// Pre-submission address checks, delegated to the provider
pub struct AddressValidator {
    provider: Arc<dyn ExchangeProvider>,
}

impl AddressValidator {
    pub fn new(provider: Arc<dyn ExchangeProvider>) -> Self {
        Self { provider }
    }

    /// Check `address` against `currency`.
    ///
    /// A blank address fails with `EmptyAddress` before any network call. A
    /// provider failure yields an invalid result with the generic message,
    /// so an address is never accepted unchecked.
    pub async fn validate(
        &self,
        currency: &Currency,
        address: &str,
    ) -> Result<AddressValidation, SwapError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(SwapError::EmptyAddress {
                currency: currency.ticker.clone(),
            });
        }

        match self.provider.validate_address(&currency.ticker, address).await {
            Ok(verdict) if verdict.result => {
                debug!(currency = %currency.ticker, "address accepted");
                Ok(AddressValidation::valid(&currency.ticker, address))
            }
            Ok(verdict) => {
                debug!(currency = %currency.ticker, message = ?verdict.message, "address rejected");
                Ok(AddressValidation::invalid(
                    &currency.ticker,
                    address,
                    verdict.message,
                ))
            }
            Err(e) => {
                warn!(currency = %currency.ticker, error = %e, "address validation unavailable");
                Ok(AddressValidation::invalid(&currency.ticker, address, None))
            }
        }
    }

    /// Payout address, checked against the destination currency
    pub async fn validate_payout(
        &self,
        destination: &Currency,
        address: &str,
    ) -> Result<ValidatedAddress, SwapError> {
        ValidatedAddress::try_from(self.validate(destination, address).await?)
    }

    /// Optional refund address, checked against the source currency.
    /// Blank means no refund address and is always accepted.
    pub async fn validate_refund(
        &self,
        source: &Currency,
        address: Option<&str>,
    ) -> Result<Option<ValidatedAddress>, SwapError> {
        match address.map(str::trim) {
            None | Some("") => Ok(None),
            Some(address) => self.validate_payout(source, address).await.map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapdesk_provider::{Endpoint, MockProvider, ProviderError};

    fn validator(provider: &Arc<MockProvider>) -> AddressValidator {
        AddressValidator::new(provider.clone())
    }

    #[tokio::test]
    async fn test_empty_address_never_fetches() {
        let provider = Arc::new(MockProvider::new());
        let validator = validator(&provider);
        let btc = Currency::new("btc", "Bitcoin");

        for blank in ["", "   ", "\t\n"] {
            let err = validator.validate(&btc, blank).await.unwrap_err();
            assert_eq!(
                err,
                SwapError::EmptyAddress {
                    currency: "btc".to_string()
                }
            );
        }
        assert_eq!(provider.calls(Endpoint::ValidateAddress), 0);
    }

    #[tokio::test]
    async fn test_provider_message_surfaced_verbatim() {
        let provider = Arc::new(
            MockProvider::new().with_invalid_address("0xdead", Some("Invalid checksum for ETH")),
        );
        let validator = validator(&provider);

        let result = validator
            .validate(&Currency::new("eth", "Ethereum"), "0xdead")
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.message.as_deref(), Some("Invalid checksum for ETH"));
    }

    #[tokio::test]
    async fn test_fallback_message_when_provider_silent() {
        let provider = Arc::new(MockProvider::new().with_invalid_address("nope", None));
        let validator = validator(&provider);

        let result = validator
            .validate(&Currency::new("xmr", "Monero"), "nope")
            .await
            .unwrap();
        assert_eq!(result.message.as_deref(), Some("Enter a valid XMR address"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_acceptance() {
        let provider = Arc::new(MockProvider::new());
        provider.set_failure(Endpoint::ValidateAddress, Some(ProviderError::Timeout));
        let validator = validator(&provider);

        let result = validator
            .validate(&Currency::new("btc", "Bitcoin"), "bc1qxyz")
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.message.as_deref(), Some("Enter a valid BTC address"));
    }

    #[tokio::test]
    async fn test_refund_is_optional_and_uses_source() {
        let provider = Arc::new(MockProvider::new().with_invalid_address("bad-refund", None));
        let validator = validator(&provider);
        let btc = Currency::new("btc", "Bitcoin");

        assert_eq!(validator.validate_refund(&btc, None).await.unwrap(), None);
        assert_eq!(validator.validate_refund(&btc, Some("  ")).await.unwrap(), None);
        assert_eq!(provider.calls(Endpoint::ValidateAddress), 0);

        let refund = validator
            .validate_refund(&btc, Some("bc1qrefund"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refund.currency(), "btc");

        let err = validator
            .validate_refund(&btc, Some("bad-refund"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SwapError::AddressInvalid {
                currency: "btc".to_string(),
                message: "Enter a valid BTC address".to_string(),
            }
        );
    }
}
