//! Exchange adapter trait and implementations.
//!
//! Each exchange has its own WebSocket message format, REST ticker endpoint and
//! market-symbol convention. Adapters normalize these into canonical tokens and
//! plain prices; nothing outside this module knows a wire format.

mod binance;
mod bitfinex;
mod coinbase;
mod kraken;
mod okx;

pub use binance::BinanceAdapter;
pub use bitfinex::BitfinexAdapter;
pub use coinbase::CoinbaseAdapter;
pub use kraken::KrakenAdapter;
pub use okx::OkxAdapter;

use crate::FeedError;
use arbitrage_core::{Exchange, QuoteCurrency, Token};

/// Result of parsing one streaming message.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterMessage {
    /// Price update for an exchange market symbol (e.g. "BTCUSDT").
    Ticker { symbol: String, price: f64 },
    /// Control traffic: subscription acks, heartbeats, pongs, other channels.
    Ignored,
}

/// Exchange-specific protocol handling.
///
/// Adapters are owned by exactly one feed task, so per-connection state
/// (e.g. Bitfinex channel ids) lives in `&mut self`.
pub trait ExchangeAdapter: Send + Sync {
    /// Get the exchange identifier
    fn exchange(&self) -> Exchange;

    /// Get WebSocket URL for this exchange
    fn ws_url(&self) -> &'static str;

    /// Quote currency used for streaming subscriptions.
    fn stream_quote(&self) -> QuoteCurrency;

    /// Market symbol used on the stream for a canonical base and quote.
    fn market_symbol(&self, base: &str, quote: QuoteCurrency) -> String;

    /// Market symbol used by the REST ticker endpoint.
    fn rest_market(&self, base: &str, quote: QuoteCurrency) -> String {
        self.market_symbol(base, quote)
    }

    /// Extract canonical base and quote symbols from a stream or REST market symbol.
    /// Returns (base, quote) tuple, e.g., ("BTC", "USDT")
    fn extract_base_quote(&self, symbol: &str) -> Option<(String, String)>;

    /// Generate subscription messages for the given market symbols.
    fn subscribe_messages(&self, markets: &[String]) -> Vec<String>;

    /// Parse one text frame.
    fn parse_message(&mut self, text: &str) -> Result<AdapterMessage, FeedError>;

    /// Drop per-connection state after a reconnect.
    fn reset(&mut self) {}

    /// Application-level keep-alive sent instead of a WebSocket ping frame.
    fn keepalive_message(&self) -> Option<&'static str> {
        None
    }

    /// URL of the REST ticker for one market.
    fn rest_ticker_url(&self, market: &str) -> String;

    /// Extract the last traded price from a REST ticker response body.
    fn parse_rest_ticker(&self, market: &str, body: &str) -> Result<f64, FeedError>;
}

/// Create the adapter for an exchange.
pub fn adapter_for(exchange: Exchange) -> Box<dyn ExchangeAdapter> {
    match exchange {
        Exchange::Binance => Box::new(BinanceAdapter),
        Exchange::Coinbase => Box::new(CoinbaseAdapter),
        Exchange::Kraken => Box::new(KrakenAdapter),
        Exchange::Okx => Box::new(OkxAdapter),
        Exchange::Bitfinex => Box::new(BitfinexAdapter::new()),
    }
}

/// Stream market symbols for a token set, skipping tokens equal to the stream quote.
pub fn stream_markets(adapter: &dyn ExchangeAdapter, tokens: &[Token]) -> Vec<String> {
    let quote = adapter.stream_quote();
    tokens
        .iter()
        .filter(|token| token.as_str() != quote.as_str())
        .map(|token| adapter.market_symbol(token.as_str(), quote))
        .collect()
}

/// Parse a decimal price string.
pub(crate) fn parse_price(raw: &str) -> Result<f64, FeedError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| FeedError::ParseError(format!("invalid price {:?}: {}", raw, e)))
}
