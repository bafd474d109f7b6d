use serde::{Deserialize, Serialize};

use crate::{normalize_ticker, SwapError};

/// Message shown when the provider rejects an address without explaining why
pub fn fallback_address_message(ticker: &str) -> String {
    format!("Enter a valid {} address", ticker.trim().to_uppercase())
}

/// Outcome of checking one address against one currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValidation {
    pub currency: String,
    pub address: String,
    pub is_valid: bool,
    pub message: Option<String>,
}

impl AddressValidation {
    pub fn valid(currency: impl AsRef<str>, address: impl Into<String>) -> Self {
        Self {
            currency: normalize_ticker(currency.as_ref()),
            address: address.into(),
            is_valid: true,
            message: None,
        }
    }

    /// Rejected address; falls back to the generic message when the provider
    /// gave none (or an empty one)
    pub fn invalid(
        currency: impl AsRef<str>,
        address: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        let currency = normalize_ticker(currency.as_ref());
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback_address_message(&currency));
        Self {
            currency,
            address: address.into(),
            is_valid: false,
            message: Some(message),
        }
    }
}

/// An address that passed validation; the only form order submission accepts.
///
/// It travels as an [`AddressValidation`] and is rebuilt through `TryFrom`
/// when deserialized, so a rejected or blank address never comes back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AddressValidation", into = "AddressValidation")]
pub struct ValidatedAddress {
    currency: String,
    address: String,
}

impl ValidatedAddress {
    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl TryFrom<AddressValidation> for ValidatedAddress {
    type Error = SwapError;

    fn try_from(validation: AddressValidation) -> Result<Self, Self::Error> {
        if validation.address.trim().is_empty() {
            return Err(SwapError::EmptyAddress {
                currency: validation.currency,
            });
        }

        if !validation.is_valid {
            let message = validation
                .message
                .unwrap_or_else(|| fallback_address_message(&validation.currency));
            return Err(SwapError::AddressInvalid {
                currency: validation.currency,
                message,
            });
        }

        Ok(Self {
            currency: validation.currency,
            address: validation.address.trim().to_string(),
        })
    }
}

impl From<ValidatedAddress> for AddressValidation {
    fn from(validated: ValidatedAddress) -> Self {
        AddressValidation {
            currency: validated.currency,
            address: validated.address,
            is_valid: true,
            message: None,
        }
    }
}
