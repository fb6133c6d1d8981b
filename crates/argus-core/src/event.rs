//! Internal pub/sub events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price observation for one symbol, published by the price-update
/// poller and consumed by the delivery fan-out and the threat detector.
///
/// This is an event, not a notification: it never enters the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Canonical market pair.
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    #[must_use]
    pub fn new(symbol: &str, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            timestamp,
        }
    }
}
