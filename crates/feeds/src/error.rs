//! Error types for feed operations.

use arbitrage_core::{Exchange, PriceError};
use thiserror::Error;

/// Errors that can occur during feed and polling operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket disconnected: {0}")]
    Disconnected(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("{exchange} has no tradable market {market}")]
    MarketUnavailable { exchange: Exchange, market: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Rejected price: {0}")]
    InvalidPrice(#[from] PriceError),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),

    #[error("Channel closed")]
    ChannelClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::ConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl From<url::ParseError> for FeedError {
    fn from(err: url::ParseError) -> Self {
        FeedError::ConnectionFailed(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}
