//! Exchange identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exchange identifier.
///
/// Serializes as the lowercase id (`"binance"`), which is also the form used
/// in vertex labels such as `BTC@binance`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Coinbase,
    Kraken,
    Okx,
    Bitfinex,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown exchange: {0}")]
pub struct ParseExchangeError(pub String);

impl Exchange {
    /// Lowercase identifier used on the wire and in vertex labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Coinbase => "coinbase",
            Exchange::Kraken => "kraken",
            Exchange::Okx => "okx",
            Exchange::Bitfinex => "bitfinex",
        }
    }

    pub fn all() -> &'static [Exchange] {
        &[
            Exchange::Binance,
            Exchange::Coinbase,
            Exchange::Kraken,
            Exchange::Okx,
            Exchange::Bitfinex,
        ]
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = ParseExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Exchange::Binance),
            "coinbase" => Ok(Exchange::Coinbase),
            "kraken" => Ok(Exchange::Kraken),
            "okx" => Ok(Exchange::Okx),
            "bitfinex" => Ok(Exchange::Bitfinex),
            _ => Err(ParseExchangeError(s.to_string())),
        }
    }
}
