use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{normalize_ticker, QuoteRequest, QuoteResult};

/// A provider-issued fixed rate, held until `rate_valid_until`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLock {
    pub rate_lock_id: String,
    pub source_ticker: String,
    pub destination_ticker: String,
    pub source_amount: Decimal,
    pub destination_amount: Decimal,
    pub rate_valid_until: DateTime<Utc>,
    pub captured_at_epoch_ms: i64,
}

impl RateLock {
    /// Build a lock from an accepted quote; `None` unless the quote is a
    /// fixed-rate quote carrying both a lock id and an expiry.
    ///
    /// The expiry is kept at millisecond precision, the precision it is
    /// persisted with, so a stored lock reads back equal.
    pub fn from_quote(
        quote: &QuoteResult,
        request: &QuoteRequest,
        captured_at: DateTime<Utc>,
    ) -> Option<Self> {
        if !quote.is_lockable() {
            return None;
        }

        let valid_until = quote.rate_valid_until?;
        let rate_valid_until = DateTime::from_timestamp_millis(valid_until.timestamp_millis())?;

        Some(Self {
            rate_lock_id: quote.rate_lock_id.clone()?,
            source_ticker: normalize_ticker(&request.source_ticker),
            destination_ticker: normalize_ticker(&request.destination_ticker),
            source_amount: quote.source_amount,
            destination_amount: quote.destination_amount,
            rate_valid_until,
            captured_at_epoch_ms: captured_at.timestamp_millis(),
        })
    }

    /// A lock is dead from the instant its expiry is reached
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.rate_valid_until
    }

    /// Whether the lock still describes the amounts currently on screen
    pub fn matches(
        &self,
        source_ticker: &str,
        destination_ticker: &str,
        source_amount: Decimal,
        destination_amount: Decimal,
    ) -> bool {
        self.source_ticker == normalize_ticker(source_ticker)
            && self.destination_ticker == normalize_ticker(destination_ticker)
            && self.source_amount.normalize() == source_amount.normalize()
            && self.destination_amount.normalize() == destination_amount.normalize()
    }

    /// Sanity check applied to records read back from storage
    pub fn is_well_formed(&self) -> bool {
        !self.rate_lock_id.trim().is_empty()
            && !self.source_ticker.is_empty()
            && !self.destination_ticker.is_empty()
            && self.source_ticker != self.destination_ticker
            && self.source_amount > Decimal::ZERO
            && self.destination_amount > Decimal::ZERO
            && self.rate_valid_until.timestamp_millis() > self.captured_at_epoch_ms
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.rate_valid_until - now).num_seconds().max(0)
    }
}
