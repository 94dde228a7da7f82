use arbitrage_core::{Exchange, QuoteCurrency};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{AdapterMessage, ExchangeAdapter};
use crate::FeedError;

/// Bitfinex public API v2.
///
/// Ticker frames only carry a channel id, so the adapter remembers which
/// symbol each `subscribed` event bound to a channel.
#[derive(Debug, Default)]
pub struct BitfinexAdapter {
    channels: HashMap<u64, String>,
}

/// Position of LAST_PRICE in a ticker array.
const LAST_PRICE_INDEX: usize = 6;

#[derive(Debug, Deserialize)]
struct BitfinexEvent {
    event: String,
    #[serde(rename = "chanId")]
    chan_id: Option<u64>,
    symbol: Option<String>,
    msg: Option<String>,
}

fn to_bitfinex(symbol: &str) -> String {
    match symbol.to_uppercase().as_str() {
        "USDT" => "UST".to_string(),
        "USDC" => "UDC".to_string(),
        other => other.to_string(),
    }
}

fn from_bitfinex(symbol: &str) -> String {
    match symbol.to_uppercase().as_str() {
        "UST" => "USDT".to_string(),
        "UDC" => "USDC".to_string(),
        other => other.to_string(),
    }
}

fn last_price(ticker: &[Value]) -> Option<f64> {
    ticker.get(LAST_PRICE_INDEX).and_then(Value::as_f64)
}

impl BitfinexAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol bound to a channel id, if subscribed on this connection.
    pub fn channel_symbol(&self, chan_id: u64) -> Option<&str> {
        self.channels.get(&chan_id).map(String::as_str)
    }
}

impl ExchangeAdapter for BitfinexAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Bitfinex
    }

    fn ws_url(&self) -> &'static str {
        "wss://api-pub.bitfinex.com/ws/2"
    }

    fn stream_quote(&self) -> QuoteCurrency {
        QuoteCurrency::USD
    }

    fn market_symbol(&self, base: &str, quote: QuoteCurrency) -> String {
        let base = to_bitfinex(base);
        let quote = to_bitfinex(quote.as_str());
        // Symbols longer than three letters need a separator.
        if base.len() > 3 || quote.len() > 3 {
            format!("t{}:{}", base, quote)
        } else {
            format!("t{}{}", base, quote)
        }
    }

    fn extract_base_quote(&self, symbol: &str) -> Option<(String, String)> {
        let pair = symbol.strip_prefix('t')?;
        let (base, quote) = match pair.split_once(':') {
            Some(parts) => parts,
            None if pair.len() == 6 && pair.is_ascii() => pair.split_at(3),
            None => return None,
        };
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some((from_bitfinex(base), from_bitfinex(quote)))
    }

    fn subscribe_messages(&self, markets: &[String]) -> Vec<String> {
        markets
            .iter()
            .map(|symbol| {
                serde_json::json!({
                    "event": "subscribe",
                    "channel": "ticker",
                    "symbol": symbol,
                })
                .to_string()
            })
            .collect()
    }

    fn parse_message(&mut self, text: &str) -> Result<AdapterMessage, FeedError> {
        let value: Value = serde_json::from_str(text)?;

        if value.is_object() {
            let event: BitfinexEvent = serde_json::from_value(value)?;
            return match (event.event.as_str(), event.chan_id, event.symbol) {
                ("subscribed", Some(chan_id), Some(symbol)) => {
                    self.channels.insert(chan_id, symbol);
                    Ok(AdapterMessage::Ignored)
                }
                ("error", _, _) => Err(FeedError::ParseError(format!(
                    "bitfinex error: {}",
                    event.msg.unwrap_or_default()
                ))),
                _ => Ok(AdapterMessage::Ignored),
            };
        }

        let frame = value
            .as_array()
            .ok_or_else(|| FeedError::ParseError(format!("unexpected bitfinex frame: {}", text)))?;
        let chan_id = frame
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| FeedError::ParseError("bitfinex frame without channel id".into()))?;

        let ticker = match frame.get(1) {
            Some(Value::Array(ticker)) => ticker,
            // [chanId, "hb"]
            Some(Value::String(_)) => return Ok(AdapterMessage::Ignored),
            _ => {
                return Err(FeedError::ParseError(format!(
                    "bitfinex frame without payload on channel {}",
                    chan_id
                )))
            }
        };

        let symbol = self
            .channels
            .get(&chan_id)
            .cloned()
            .ok_or_else(|| FeedError::ParseError(format!("unknown bitfinex channel {}", chan_id)))?;
        let price = last_price(ticker)
            .ok_or_else(|| FeedError::ParseError(format!("bitfinex ticker for {} without last price", symbol)))?;

        Ok(AdapterMessage::Ticker { symbol, price })
    }

    fn reset(&mut self) {
        self.channels.clear();
    }

    fn rest_ticker_url(&self, market: &str) -> String {
        format!("https://api-pub.bitfinex.com/v2/ticker/{}", market)
    }

    fn parse_rest_ticker(&self, market: &str, body: &str) -> Result<f64, FeedError> {
        let ticker: Vec<Value> = serde_json::from_str(body)?;

        // Unknown symbols come back as [] or ["error", code, message].
        if ticker.is_empty() || ticker.first().and_then(Value::as_str) == Some("error") {
            return Err(FeedError::MarketUnavailable {
                exchange: Exchange::Bitfinex,
                market: market.to_string(),
            });
        }

        last_price(&ticker)
            .ok_or_else(|| FeedError::ParseError(format!("bitfinex ticker for {} without last price", market)))
    }
}
