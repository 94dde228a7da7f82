//! Graph vertices and arbitrage results handed to the presentation layer.

use crate::{Exchange, ParseExchangeError, Token};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A (token, exchange) pair in the exchange-rate graph, labelled `TOKEN@exchange`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Vertex {
    pub token: Token,
    pub exchange: Exchange,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseVertexError {
    #[error("vertex label must look like TOKEN@exchange: {0}")]
    MissingSeparator(String),

    #[error(transparent)]
    Exchange(#[from] ParseExchangeError),
}

impl Vertex {
    pub fn new(token: Token, exchange: Exchange) -> Self {
        Self { token, exchange }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.token, self.exchange)
    }
}

impl FromStr for Vertex {
    type Err = ParseVertexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (token, exchange) = s
            .split_once('@')
            .filter(|(token, _)| !token.is_empty())
            .ok_or_else(|| ParseVertexError::MissingSeparator(s.to_string()))?;
        Ok(Vertex::new(Token::new(token), exchange.parse()?))
    }
}

impl From<Vertex> for String {
    fn from(vertex: Vertex) -> Self {
        vertex.to_string()
    }
}

impl TryFrom<String> for Vertex {
    type Error = ParseVertexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Outcome of one detection pass.
///
/// Both fields are `None` when no negative cycle exists. When a cycle is found
/// its first and last vertex are equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageResult {
    pub cycle: Option<Vec<Vertex>>,
    pub profit_pct: Option<f64>,
}

impl ArbitrageResult {
    /// No arbitrage.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn found(cycle: Vec<Vertex>, profit_pct: f64) -> Self {
        Self {
            cycle: Some(cycle),
            profit_pct: Some(profit_pct),
        }
    }

    #[inline]
    pub fn is_found(&self) -> bool {
        self.cycle.is_some()
    }

    /// Cycle rendered as `A@x -> B@y -> A@x` for logs.
    pub fn describe(&self) -> Option<String> {
        self.cycle.as_ref().map(|cycle| {
            cycle
                .iter()
                .map(Vertex::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        })
    }
}

/// Simple cross-exchange spread: buy the cheapest quote, sell the dearest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub token: Token,
    pub buy_exchange: Exchange,
    pub buy_price: f64,
    pub sell_exchange: Exchange,
    pub sell_price: f64,
    /// Gross spread in percent, rounded to 4 decimal places.
    pub spread_pct: f64,
}
