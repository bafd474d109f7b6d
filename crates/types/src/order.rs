use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{normalize_ticker, AmountSide, Flow, Quote, ValidatedAddress};

// ═══════════════════════════════════════════════════════════════════════════
// STATUS MACHINE
// ═══════════════════════════════════════════════════════════════════════════

/// Provider-side order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Waiting,
    Confirming,
    Exchanging,
    Sending,
    Finished,
    Failed,
    Refunded,
    Verifying,
    Expired,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::New,
        OrderStatus::Waiting,
        OrderStatus::Confirming,
        OrderStatus::Exchanging,
        OrderStatus::Sending,
        OrderStatus::Finished,
        OrderStatus::Failed,
        OrderStatus::Refunded,
        OrderStatus::Verifying,
        OrderStatus::Expired,
    ];

    /// No further transition happens from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Finished
                | OrderStatus::Failed
                | OrderStatus::Refunded
                | OrderStatus::Expired
        )
    }

    /// Whether `next` is a transition the provider documents.
    ///
    /// Observing the same status again is always allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        if *self == next || next == Verifying {
            return true;
        }

        match (self, next) {
            (New, Waiting) => true,
            (New | Waiting, Confirming | Expired) => true,
            (Confirming, Exchanging) => true,
            (Exchanging, Sending) => true,
            (Sending, Finished | Failed) => true,
            (Verifying, Confirming | Exchanging | Finished | Failed) => true,
            (from, Refunded) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Waiting => "waiting",
            OrderStatus::Confirming => "confirming",
            OrderStatus::Exchanging => "exchanging",
            OrderStatus::Sending => "sending",
            OrderStatus::Finished => "finished",
            OrderStatus::Failed => "failed",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Verifying => "verifying",
            OrderStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        OrderStatus::ALL
            .iter()
            .find(|status| status.as_str() == wanted)
            .copied()
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ORDER SUBMISSION
// ═══════════════════════════════════════════════════════════════════════════

/// Everything needed to create an exchange order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub source_ticker: String,
    pub destination_ticker: String,
    pub flow: Flow,
    pub direction: AmountSide,
    /// `None` while the amount is still being computed or failed to resolve
    pub source_amount: Option<Decimal>,
    pub destination_amount: Option<Decimal>,
    pub payout: ValidatedAddress,
    /// Opt-in; validated against the source currency
    pub refund: Option<ValidatedAddress>,
    /// Memo / destination tag for currencies that need one
    pub payout_extra_id: Option<String>,
}

impl OrderRequest {
    /// Build a request from the quote currently shown to the user
    pub fn from_quote(
        quote: &Quote,
        payout: ValidatedAddress,
        refund: Option<ValidatedAddress>,
    ) -> Self {
        Self {
            source_ticker: quote.request.source_ticker.clone(),
            destination_ticker: quote.request.destination_ticker.clone(),
            flow: quote.result.flow,
            direction: quote.result.edited,
            source_amount: Some(quote.result.source_amount),
            destination_amount: Some(quote.result.destination_amount),
            payout,
            refund,
            payout_extra_id: None,
        }
    }

    pub fn with_payout_extra_id(mut self, extra_id: impl Into<String>) -> Self {
        self.payout_extra_id = Some(extra_id.into());
        self
    }

    /// Both amounts, when both are present and positive
    pub fn resolved_amounts(&self) -> Option<(Decimal, Decimal)> {
        match (self.source_amount, self.destination_amount) {
            (Some(source), Some(destination))
                if source > Decimal::ZERO && destination > Decimal::ZERO =>
            {
                Some((source, destination))
            }
            _ => None,
        }
    }

    pub fn normalized_source(&self) -> String {
        normalize_ticker(&self.source_ticker)
    }

    pub fn normalized_destination(&self) -> String {
        normalize_ticker(&self.destination_ticker)
    }
}

/// An exchange order as created by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub flow: Flow,
    pub direction: AmountSide,
    pub source_ticker: String,
    pub destination_ticker: String,
    pub source_amount: Decimal,
    pub destination_amount: Decimal,
    /// Where the user sends the source asset
    pub deposit_address: String,
    pub deposit_extra_id: Option<String>,
    pub payout_address: String,
    pub refund_address: Option<String>,
    pub rate_lock_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Deposit deadline; the provider omits it for some floating orders
    pub valid_until: Option<DateTime<Utc>>,
    /// Client-generated key sent with the creation request
    pub idempotency_key: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// OBSERVED STATUS
// ═══════════════════════════════════════════════════════════════════════════

/// One status poll result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub order_id: String,
    pub status: OrderStatus,
    /// Amount actually received, once known
    pub amount_from: Option<Decimal>,
    /// Amount actually sent, once known
    pub amount_to: Option<Decimal>,
    pub payin_hash: Option<String>,
    pub payout_hash: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn new(order_id: impl Into<String>, status: OrderStatus) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            amount_from: None,
            amount_to: None,
            payin_hash: None,
            payout_hash: None,
            updated_at: None,
        }
    }
}

/// Status change seen between two polls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub observed_at: DateTime<Utc>,
    /// False when the provider jumped outside the documented machine
    pub expected: bool,
}

impl StatusTransition {
    pub fn observe(from: Option<OrderStatus>, to: OrderStatus, observed_at: DateTime<Utc>) -> Self {
        let expected = from.map_or(true, |from| from.can_transition_to(to));
        Self {
            from,
            to,
            observed_at,
            expected,
        }
    }
}
