use arbitrage_core::{Exchange, QuoteCurrency};
use serde::Deserialize;

use super::{parse_price, AdapterMessage, ExchangeAdapter};
use crate::FeedError;

pub struct CoinbaseAdapter;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum CoinbaseMessage {
    Ticker {
        product_id: String,
        price: String,
    },
    Error {
        message: String,
        #[serde(default)]
        reason: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CoinbaseRestTicker {
    price: Option<String>,
    message: Option<String>,
}

impl ExchangeAdapter for CoinbaseAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Coinbase
    }

    fn ws_url(&self) -> &'static str {
        "wss://ws-feed.exchange.coinbase.com"
    }

    fn stream_quote(&self) -> QuoteCurrency {
        QuoteCurrency::USD
    }

    fn market_symbol(&self, base: &str, quote: QuoteCurrency) -> String {
        format!("{}-{}", base.to_uppercase(), quote.as_str())
    }

    fn extract_base_quote(&self, symbol: &str) -> Option<(String, String)> {
        let (base, quote) = symbol.split_once('-')?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some((base.to_uppercase(), quote.to_uppercase()))
    }

    fn subscribe_messages(&self, markets: &[String]) -> Vec<String> {
        if markets.is_empty() {
            return Vec::new();
        }
        let msg = serde_json::json!({
            "type": "subscribe",
            "product_ids": markets,
            "channels": ["ticker", "heartbeat"],
        });
        vec![msg.to_string()]
    }

    fn parse_message(&mut self, text: &str) -> Result<AdapterMessage, FeedError> {
        match serde_json::from_str::<CoinbaseMessage>(text)? {
            CoinbaseMessage::Ticker { product_id, price } => Ok(AdapterMessage::Ticker {
                symbol: product_id,
                price: parse_price(&price)?,
            }),
            CoinbaseMessage::Error { message, reason } => Err(FeedError::ParseError(format!(
                "coinbase error: {} {}",
                message, reason
            ))),
            CoinbaseMessage::Other => Ok(AdapterMessage::Ignored),
        }
    }

    fn rest_ticker_url(&self, market: &str) -> String {
        format!(
            "https://api.exchange.coinbase.com/products/{}/ticker",
            market
        )
    }

    fn parse_rest_ticker(&self, market: &str, body: &str) -> Result<f64, FeedError> {
        let ticker: CoinbaseRestTicker = serde_json::from_str(body)?;
        match (ticker.price, ticker.message) {
            (Some(price), _) => parse_price(&price),
            (None, Some(message)) if message.eq_ignore_ascii_case("notfound") => {
                Err(FeedError::MarketUnavailable {
                    exchange: Exchange::Coinbase,
                    market: market.to_string(),
                })
            }
            (None, message) => Err(FeedError::ParseError(format!(
                "coinbase ticker without price: {}",
                message.unwrap_or_default()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ticker() {
        let json = r#"{"type":"ticker","sequence":1,"product_id":"BTC-USD","price":"60010.25","open_24h":"59000","best_bid":"60010.00","best_ask":"60010.50","time":"2024-01-01T00:00:00Z"}"#;
        let msg = CoinbaseAdapter.parse_message(json).unwrap();
        assert_eq!(
            msg,
            AdapterMessage::Ticker {
                symbol: "BTC-USD".into(),
                price: 60010.25
            }
        );
    }

    #[test]
    fn test_control_messages_are_ignored() {
        let mut adapter = CoinbaseAdapter;
        let subs = r#"{"type":"subscriptions","channels":[{"name":"ticker","product_ids":["BTC-USD"]}]}"#;
        let hb = r#"{"type":"heartbeat","sequence":90,"last_trade_id":20,"product_id":"BTC-USD","time":"2024-01-01T00:00:00Z"}"#;
        assert_eq!(adapter.parse_message(subs).unwrap(), AdapterMessage::Ignored);
        assert_eq!(adapter.parse_message(hb).unwrap(), AdapterMessage::Ignored);
    }

    #[test]
    fn test_error_message_is_reported() {
        let json = r#"{"type":"error","message":"Failed to subscribe","reason":"FOO-USD is not a valid product"}"#;
        assert!(matches!(
            CoinbaseAdapter.parse_message(json),
            Err(FeedError::ParseError(_))
        ));
    }

    #[test]
    fn test_market_symbol_and_extract() {
        let adapter = CoinbaseAdapter;
        assert_eq!(adapter.market_symbol("eth", QuoteCurrency::USD), "ETH-USD");
        assert_eq!(
            adapter.extract_base_quote("ETH-USD"),
            Some(("ETH".to_string(), "USD".to_string()))
        );
        assert_eq!(adapter.extract_base_quote("ETHUSD"), None);
    }

    #[test]
    fn test_subscribe_message() {
        let msgs = CoinbaseAdapter.subscribe_messages(&["BTC-USD".into(), "ETH-USD".into()]);
        assert_eq!(msgs.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&msgs[0]).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["product_ids"][1], "ETH-USD");
        assert!(CoinbaseAdapter.subscribe_messages(&[]).is_empty());
    }

    #[test]
    fn test_rest_ticker() {
        let adapter = CoinbaseAdapter;
        assert_eq!(
            adapter.rest_ticker_url("BTC-USD"),
            "https://api.exchange.coinbase.com/products/BTC-USD/ticker"
        );
        let body = r#"{"ask":"60001.00","bid":"60000.00","volume":"1200.5","trade_id":1,"price":"60000.50","size":"0.1","time":"2024-01-01T00:00:00Z"}"#;
        assert_eq!(adapter.parse_rest_ticker("BTC-USD", body).unwrap(), 60000.5);
    }

    #[test]
    fn test_rest_not_found_is_unavailable() {
        let err = CoinbaseAdapter
            .parse_rest_ticker("FOO-USD", r#"{"message":"NotFound"}"#)
            .unwrap_err();
        assert!(matches!(err, FeedError::MarketUnavailable { .. }));
    }
}
