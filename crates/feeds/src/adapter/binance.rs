use arbitrage_core::{Exchange, QuoteCurrency};
use serde::Deserialize;

use super::{parse_price, AdapterMessage, ExchangeAdapter};
use crate::FeedError;

pub struct BinanceAdapter;

#[derive(Debug, Deserialize)]
struct BinanceTrade {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
}

#[derive(Debug, Deserialize)]
struct BinanceTickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

// Binance rejects unknown symbols with this code.
const INVALID_SYMBOL: i64 = -1121;

impl ExchangeAdapter for BinanceAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn ws_url(&self) -> &'static str {
        "wss://stream.binance.com:9443/ws"
    }

    fn stream_quote(&self) -> QuoteCurrency {
        QuoteCurrency::USDT
    }

    fn market_symbol(&self, base: &str, quote: QuoteCurrency) -> String {
        format!("{}{}", base.to_uppercase(), quote.as_str())
    }

    fn extract_base_quote(&self, symbol: &str) -> Option<(String, String)> {
        let symbol = symbol.to_uppercase();
        const QUOTES: &[&str] = &["USDT", "USDC", "USD"];
        for quote in QUOTES {
            if let Some(base) = symbol.strip_suffix(quote) {
                if !base.is_empty() {
                    return Some((base.to_string(), (*quote).to_string()));
                }
            }
        }
        None
    }

    fn subscribe_messages(&self, markets: &[String]) -> Vec<String> {
        let mut messages = Vec::new();
        let mut id = 1;

        for chunk in markets.chunks(50) {
            let streams: Vec<String> = chunk
                .iter()
                .map(|s| format!("\"{}@trade\"", s.to_lowercase()))
                .collect();

            messages.push(format!(
                r#"{{"method": "SUBSCRIBE", "params": [{}], "id": {}}}"#,
                streams.join(", "),
                id
            ));
            id += 1;
        }

        messages
    }

    fn parse_message(&mut self, text: &str) -> Result<AdapterMessage, FeedError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        // Subscription acks look like {"result":null,"id":1}.
        if value.get("e").and_then(|e| e.as_str()) != Some("trade") {
            return Ok(AdapterMessage::Ignored);
        }

        let trade: BinanceTrade = serde_json::from_value(value)?;
        Ok(AdapterMessage::Ticker {
            price: parse_price(&trade.price)?,
            symbol: trade.symbol,
        })
    }

    fn rest_ticker_url(&self, market: &str) -> String {
        format!(
            "https://api.binance.com/api/v3/ticker/price?symbol={}",
            market
        )
    }

    fn parse_rest_ticker(&self, market: &str, body: &str) -> Result<f64, FeedError> {
        if let Ok(err) = serde_json::from_str::<BinanceErrorBody>(body) {
            if err.code == INVALID_SYMBOL {
                return Err(FeedError::MarketUnavailable {
                    exchange: Exchange::Binance,
                    market: market.to_string(),
                });
            }
            return Err(FeedError::ParseError(format!(
                "binance error {}: {}",
                err.code, err.msg
            )));
        }

        let ticker: BinanceTickerPrice = serde_json::from_str(body)?;
        parse_price(&ticker.price)
    }
}
