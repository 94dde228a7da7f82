//! Price updates, stored entries and immutable snapshots.

use crate::{Exchange, Token};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Reasons a price is refused at the store boundary.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PriceError {
    #[error("non-positive price: {0}")]
    NonPositive(f64),

    #[error("non-finite price: {0}")]
    NonFinite(f64),
}

/// Validate a raw price: it must be finite and strictly positive.
pub fn validate_price(price: f64) -> Result<f64, PriceError> {
    if !price.is_finite() {
        return Err(PriceError::NonFinite(price));
    }
    if price <= 0.0 {
        return Err(PriceError::NonPositive(price));
    }
    Ok(price)
}

/// Canonical price event emitted by feed adapters and the polling collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub exchange: Exchange,
    pub token: Token,
    pub price: f64,
    /// Local observation time in milliseconds.
    pub observed_at_ms: u64,
}

impl PriceUpdate {
    /// Create an update observed now.
    pub fn new(exchange: Exchange, token: Token, price: f64) -> Self {
        Self::observed_at(exchange, token, price, now_ms())
    }

    pub fn observed_at(exchange: Exchange, token: Token, price: f64, observed_at_ms: u64) -> Self {
        Self {
            exchange,
            token,
            price,
            observed_at_ms,
        }
    }

    /// Check the price is usable.
    pub fn validate(&self) -> Result<(), PriceError> {
        validate_price(self.price).map(|_| ())
    }

    /// Convert into the stored entry form.
    #[inline]
    pub fn entry(&self) -> PriceEntry {
        PriceEntry {
            price: self.price,
            observed_at_ms: self.observed_at_ms,
        }
    }
}

/// Latest known price for one (exchange, token) pair.
///
/// Price and timestamp travel together; a store never exposes one without the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub price: f64,
    pub observed_at_ms: u64,
}

impl PriceEntry {
    /// Age relative to `now_ms` (zero for entries stamped in the future).
    #[inline]
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.observed_at_ms)
    }
}

/// Immutable point-in-time copy of all known prices.
///
/// Serializes as `{ exchange: { token: { price, observed_at_ms } } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PriceSnapshot {
    prices: BTreeMap<Exchange, BTreeMap<Token, PriceEntry>>,
}

impl PriceSnapshot {
    /// Build a snapshot from raw prices, all stamped with the same time.
    /// Non-positive and non-finite prices are skipped.
    pub fn from_prices<I, T>(prices: I, observed_at_ms: u64) -> Self
    where
        I: IntoIterator<Item = (Exchange, T, f64)>,
        T: Into<Token>,
    {
        prices
            .into_iter()
            .filter(|(_, _, price)| validate_price(*price).is_ok())
            .map(|(exchange, token, price)| {
                (
                    exchange,
                    token.into(),
                    PriceEntry {
                        price,
                        observed_at_ms,
                    },
                )
            })
            .collect()
    }

    pub fn get(&self, exchange: Exchange, token: &Token) -> Option<&PriceEntry> {
        self.prices.get(&exchange)?.get(token)
    }

    pub fn price(&self, exchange: Exchange, token: &Token) -> Option<f64> {
        self.get(exchange, token).map(|entry| entry.price)
    }

    /// Exchanges with at least one entry, in order.
    pub fn exchanges(&self) -> impl Iterator<Item = Exchange> + '_ {
        self.prices.keys().copied()
    }

    /// Every token quoted by at least one exchange.
    pub fn tokens(&self) -> BTreeSet<Token> {
        self.prices
            .values()
            .flat_map(|by_token| by_token.keys().cloned())
            .collect()
    }

    pub fn prices_for(&self, exchange: Exchange) -> Option<&BTreeMap<Token, PriceEntry>> {
        self.prices.get(&exchange)
    }

    /// All entries ordered by exchange, then token.
    pub fn iter(&self) -> impl Iterator<Item = (Exchange, &Token, &PriceEntry)> + '_ {
        self.prices.iter().flat_map(|(exchange, by_token)| {
            by_token
                .iter()
                .map(move |(token, entry)| (*exchange, token, entry))
        })
    }

    /// Total number of (exchange, token) entries.
    pub fn len(&self) -> usize {
        self.prices.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(Exchange, Token, PriceEntry)> for PriceSnapshot {
    fn from_iter<I: IntoIterator<Item = (Exchange, Token, PriceEntry)>>(iter: I) -> Self {
        let mut prices: BTreeMap<Exchange, BTreeMap<Token, PriceEntry>> = BTreeMap::new();
        for (exchange, token, entry) in iter {
            prices.entry(exchange).or_default().insert(token, entry);
        }
        Self { prices }
    }
}
