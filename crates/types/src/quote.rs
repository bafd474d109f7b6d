use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{normalize_ticker, CurrencyPair};

/// Pricing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Rate locked for a validity window
    Fixed,
    /// Rate recomputed at settlement time
    Floating,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Fixed => "fixed-rate",
            Flow::Floating => "standard",
        }
    }
}

/// Which amount field the user is typing into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmountSide {
    #[serde(rename = "fromSource")]
    Source,
    #[serde(rename = "fromDestination")]
    Destination,
}

impl AmountSide {
    pub fn opposite(&self) -> Self {
        match self {
            AmountSide::Source => AmountSide::Destination,
            AmountSide::Destination => AmountSide::Source,
        }
    }

    /// Provider `type` parameter for the estimate endpoint
    pub fn as_estimate_type(&self) -> &'static str {
        match self {
            AmountSide::Source => "direct",
            AmountSide::Destination => "reverse",
        }
    }
}

/// The amount the user just typed, tagged with the field it was typed into.
///
/// The other amount is never stored next to it: it only exists as the
/// derived half of a [`QuoteResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "camelCase")]
pub enum AmountEdit {
    EditingSource { amount: String },
    EditingDestination { amount: String },
}

impl AmountEdit {
    pub fn source(amount: impl Into<String>) -> Self {
        AmountEdit::EditingSource {
            amount: amount.into(),
        }
    }

    pub fn destination(amount: impl Into<String>) -> Self {
        AmountEdit::EditingDestination {
            amount: amount.into(),
        }
    }

    pub fn side(&self) -> AmountSide {
        match self {
            AmountEdit::EditingSource { .. } => AmountSide::Source,
            AmountEdit::EditingDestination { .. } => AmountSide::Destination,
        }
    }

    /// Raw text as typed
    pub fn raw(&self) -> &str {
        match self {
            AmountEdit::EditingSource { amount } | AmountEdit::EditingDestination { amount } => {
                amount
            }
        }
    }

    /// Parsed amount, `None` when empty, unparseable, zero, or negative
    pub fn parsed(&self) -> Option<Decimal> {
        let text = self.raw().trim();
        if text.is_empty() {
            return None;
        }
        Decimal::from_str(text)
            .ok()
            .filter(|amount| *amount > Decimal::ZERO)
    }
}

/// A single estimate request, built fresh on every edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub source_ticker: String,
    pub destination_ticker: String,
    pub edit: AmountEdit,
    pub flow: Flow,
}

impl QuoteRequest {
    pub fn new(
        source_ticker: impl AsRef<str>,
        destination_ticker: impl AsRef<str>,
        edit: AmountEdit,
        flow: Flow,
    ) -> Self {
        Self {
            source_ticker: normalize_ticker(source_ticker.as_ref()),
            destination_ticker: normalize_ticker(destination_ticker.as_ref()),
            edit,
            flow,
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(&self.source_ticker, &self.destination_ticker)
    }

    pub fn direction(&self) -> AmountSide {
        self.edit.side()
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.edit.parsed()
    }
}

/// A resolved pair of amounts: one edited by the user, one derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub source_amount: Decimal,
    pub destination_amount: Decimal,
    /// Which of the two amounts came from the user
    pub edited: AmountSide,
    pub flow: Flow,
    /// Only present under the fixed flow
    pub rate_lock_id: Option<String>,
    /// Only present under the fixed flow
    pub rate_valid_until: Option<DateTime<Utc>>,
}

impl QuoteResult {
    pub fn edited_amount(&self) -> Decimal {
        match self.edited {
            AmountSide::Source => self.source_amount,
            AmountSide::Destination => self.destination_amount,
        }
    }

    pub fn derived_amount(&self) -> Decimal {
        match self.edited {
            AmountSide::Source => self.destination_amount,
            AmountSide::Destination => self.source_amount,
        }
    }

    /// Whether this result carries everything a rate lock needs
    pub fn is_lockable(&self) -> bool {
        self.flow == Flow::Fixed && self.rate_lock_id.is_some() && self.rate_valid_until.is_some()
    }
}

/// Provider-declared limits on the source amount for a pair and flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBounds {
    pub min_source_amount: Decimal,
    /// Absent when the provider defines no ceiling
    pub max_source_amount: Option<Decimal>,
}

impl AmountBounds {
    pub fn check(&self, source_amount: Decimal) -> BoundsCheck {
        if source_amount < self.min_source_amount {
            return BoundsCheck::BelowMinimum {
                min: self.min_source_amount,
            };
        }
        match self.max_source_amount {
            Some(max) if source_amount > max => BoundsCheck::AboveMaximum { max },
            _ => BoundsCheck::WithinBounds,
        }
    }
}

/// Advisory verdict on a quote's source amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundsCheck {
    WithinBounds,
    BelowMinimum { min: Decimal },
    AboveMaximum { max: Decimal },
    /// Bounds lookup failed or was not attempted
    Unknown,
}

impl BoundsCheck {
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            BoundsCheck::BelowMinimum { .. } | BoundsCheck::AboveMaximum { .. }
        )
    }
}

/// A quote as applied to the visible form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub request: QuoteRequest,
    pub result: QuoteResult,
    pub bounds: Option<AmountBounds>,
    pub bounds_check: BoundsCheck,
    /// Sequence number of the request that produced this quote
    pub generation: u64,
}

/// What a single `estimate` call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteOutcome {
    /// Amount empty, unparseable, or not positive; nothing was requested
    Empty,
    /// Fresh quote, now the applied one
    Quoted(Quote),
    /// A newer request was issued; this one's result was discarded
    Superseded { generation: u64 },
}

impl QuoteOutcome {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            QuoteOutcome::Quoted(quote) => Some(quote),
            _ => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, QuoteOutcome::Superseded { .. })
    }
}
