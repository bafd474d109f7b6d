use thiserror::Error;

/// Failures surfaced by the quote-and-order engine.
///
/// Validation variants (`InvalidPair`, `EmptyAddress`, `AddressInvalid`,
/// `MissingAmount`) are meant to be rendered as form state. Provider
/// availability variants propagate to the caller, which owns the messaging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("currency catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("invalid currency pair: {ticker} cannot be exchanged for itself")]
    InvalidPair { ticker: String },

    #[error("quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("stale quote: {0}")]
    StaleQuote(String),

    #[error("empty {currency} address")]
    EmptyAddress { currency: String },

    #[error("invalid {currency} address: {message}")]
    AddressInvalid { currency: String, message: String },

    #[error("both amounts must be resolved before submitting")]
    MissingAmount,

    #[error("order creation failed: {reason}")]
    OrderCreationFailed { reason: String },

    #[error("status temporarily unavailable: {0}")]
    StatusPollTransientFailure(String),
}

impl SwapError {
    /// Errors resolved locally and shown next to the offending input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SwapError::InvalidPair { .. }
                | SwapError::EmptyAddress { .. }
                | SwapError::AddressInvalid { .. }
                | SwapError::MissingAmount
        )
    }

    /// Errors caused by the provider being slow, down, or inconsistent.
    pub fn is_provider_availability(&self) -> bool {
        matches!(
            self,
            SwapError::CatalogUnavailable(_)
                | SwapError::QuoteUnavailable(_)
                | SwapError::OrderCreationFailed { .. }
                | SwapError::StatusPollTransientFailure(_)
        )
    }
}
