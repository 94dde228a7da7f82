//! Canonical token symbols.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical base-currency symbol, always upper case (e.g. "BTC").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "CompactString", into = "CompactString")]
pub struct Token(CompactString);

impl Token {
    pub fn new(symbol: &str) -> Self {
        Self(CompactString::new(symbol.trim().to_uppercase()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Default token set watched when no configuration is supplied.
    pub fn defaults() -> Vec<Token> {
        ["BTC", "ETH", "ADA", "SOL", "DOGE", "DOT", "BNB", "USDT", "USDC"]
            .iter()
            .map(|s| Token::new(s))
            .collect()
    }
}

impl From<&str> for Token {
    fn from(symbol: &str) -> Self {
        Token::new(symbol)
    }
}

impl From<CompactString> for Token {
    fn from(symbol: CompactString) -> Self {
        Token::new(&symbol)
    }
}

impl From<Token> for CompactString {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
