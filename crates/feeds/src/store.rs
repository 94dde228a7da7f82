//! Shared price store.
//!
//! The only shared mutable state in the pipeline. Feed runners and the polling
//! collector write through [`PriceStore::apply`]; readers only ever see
//! [`PriceSnapshot`] copies.

use arbitrage_core::{now_ms, Exchange, PriceEntry, PriceError, PriceSnapshot, PriceUpdate, Token};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Key for price storage: (exchange, token)
type PriceKey = (Exchange, Token);

/// Result of an accepted update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The entry was created or overwritten.
    Stored,
    /// A newer observation is already stored; the update was ignored.
    Outdated,
}

/// Thread-safe latest-price store keyed by (exchange, token).
#[derive(Debug, Default)]
pub struct PriceStore {
    entries: RwLock<HashMap<PriceKey, PriceEntry>>,
    /// Entries older than this are left out of snapshots.
    max_age: Option<Duration>,
}

impl PriceStore {
    /// Create a store. `max_age` of `None` disables the staleness horizon.
    pub fn new(max_age: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Record the update if its price is positive and finite.
    ///
    /// Price and timestamp are written as one entry under the write lock, so a
    /// snapshot sees either the previous entry or this one.
    pub fn apply(&self, update: PriceUpdate) -> Result<ApplyOutcome, PriceError> {
        update.validate()?;

        let entry = update.entry();
        let mut entries = self.entries.write();
        match entries.entry((update.exchange, update.token)) {
            Entry::Occupied(mut slot) => {
                if slot.get().observed_at_ms > entry.observed_at_ms {
                    return Ok(ApplyOutcome::Outdated);
                }
                slot.insert(entry);
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
        Ok(ApplyOutcome::Stored)
    }

    /// Apply many updates, returning how many were stored.
    /// Rejected and outdated updates are skipped.
    pub fn apply_batch<I>(&self, updates: I) -> usize
    where
        I: IntoIterator<Item = PriceUpdate>,
    {
        let mut stored = 0;
        for update in updates {
            let label = format!("{}@{}", update.token, update.exchange);
            match self.apply(update) {
                Ok(ApplyOutcome::Stored) => stored += 1,
                Ok(ApplyOutcome::Outdated) => {}
                Err(e) => debug!("Rejected update for {}: {}", label, e),
            }
        }
        stored
    }

    /// Write one polling cycle, all entries stamped with the same observation time.
    pub fn apply_poll(
        &self,
        prices: &HashMap<Exchange, HashMap<Token, f64>>,
        observed_at_ms: u64,
    ) -> usize {
        self.apply_batch(prices.iter().flat_map(|(exchange, tokens)| {
            tokens.iter().map(move |(token, price)| {
                PriceUpdate::observed_at(*exchange, token.clone(), *price, observed_at_ms)
            })
        }))
    }

    /// Consistent copy of all fresh entries.
    pub fn snapshot(&self) -> PriceSnapshot {
        self.snapshot_at(now_ms())
    }

    /// Consistent copy of all entries that are fresh relative to `now_ms`.
    pub fn snapshot_at(&self, now_ms: u64) -> PriceSnapshot {
        let max_age_ms = self.max_age.map(|age| age.as_millis() as u64);
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|(_, entry)| max_age_ms.map_or(true, |max| entry.age_ms(now_ms) <= max))
            .map(|((exchange, token), entry)| (*exchange, token.clone(), *entry))
            .collect()
    }

    /// Latest entry for a pair, ignoring staleness.
    pub fn last_known(&self, exchange: Exchange, token: &Token) -> Option<PriceEntry> {
        self.entries
            .read()
            .get(&(exchange, token.clone()))
            .copied()
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
