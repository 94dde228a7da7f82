//! Quote currencies used to resolve a token's market on an exchange.

use serde::{Deserialize, Serialize};

/// Quote currency for trading pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteCurrency {
    /// US Dollar (native USD pairs like Coinbase, Kraken)
    USD,
    /// Tether
    USDT,
    /// USD Coin
    USDC,
}

impl QuoteCurrency {
    /// Get display name.
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteCurrency::USD => "USD",
            QuoteCurrency::USDT => "USDT",
            QuoteCurrency::USDC => "USDC",
        }
    }

    /// Quotes tried, in priority order, when polling a token's price.
    pub fn default_candidates() -> Vec<QuoteCurrency> {
        vec![QuoteCurrency::USDT, QuoteCurrency::USD, QuoteCurrency::USDC]
    }
}

impl std::fmt::Display for QuoteCurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
