use arbitrage_core::{Exchange, QuoteCurrency};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{parse_price, AdapterMessage, ExchangeAdapter};
use crate::FeedError;

/// Kraken WebSocket v1 and public REST API.
///
/// Kraken spells BTC as XBT and DOGE as XDG on both surfaces, with a slash on
/// the stream ("XBT/USD") and without one on REST ("XBTUSD").
pub struct KrakenAdapter;

#[derive(Debug, Deserialize)]
struct KrakenTickerEntry {
    /// Last trade closed: [price, lot volume]
    c: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KrakenRestResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, KrakenTickerEntry>,
}

fn to_kraken(base: &str) -> String {
    match base.to_uppercase().as_str() {
        "BTC" => "XBT".to_string(),
        "DOGE" => "XDG".to_string(),
        other => other.to_string(),
    }
}

fn from_kraken(symbol: &str) -> String {
    match symbol.to_uppercase().as_str() {
        "XBT" => "BTC".to_string(),
        "XDG" => "DOGE".to_string(),
        other => other.to_string(),
    }
}

impl ExchangeAdapter for KrakenAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Kraken
    }

    fn ws_url(&self) -> &'static str {
        "wss://ws.kraken.com"
    }

    fn stream_quote(&self) -> QuoteCurrency {
        QuoteCurrency::USD
    }

    fn market_symbol(&self, base: &str, quote: QuoteCurrency) -> String {
        format!("{}/{}", to_kraken(base), quote.as_str())
    }

    fn rest_market(&self, base: &str, quote: QuoteCurrency) -> String {
        format!("{}{}", to_kraken(base), quote.as_str())
    }

    fn extract_base_quote(&self, symbol: &str) -> Option<(String, String)> {
        if let Some((base, quote)) = symbol.split_once('/') {
            if base.is_empty() || quote.is_empty() {
                return None;
            }
            return Some((from_kraken(base), quote.to_uppercase()));
        }

        let symbol = symbol.to_uppercase();
        const QUOTES: &[&str] = &["USDT", "USDC", "USD"];
        QUOTES.iter().find_map(|quote| {
            symbol
                .strip_suffix(quote)
                .filter(|base| !base.is_empty())
                .map(|base| (from_kraken(base), (*quote).to_string()))
        })
    }

    fn subscribe_messages(&self, markets: &[String]) -> Vec<String> {
        if markets.is_empty() {
            return Vec::new();
        }
        let msg = serde_json::json!({
            "event": "subscribe",
            "pair": markets,
            "subscription": { "name": "ticker" },
        });
        vec![msg.to_string()]
    }

    fn parse_message(&mut self, text: &str) -> Result<AdapterMessage, FeedError> {
        let value: Value = serde_json::from_str(text)?;

        // Objects are events: heartbeat, systemStatus, subscriptionStatus.
        let Value::Array(frame) = value else {
            return Ok(AdapterMessage::Ignored);
        };

        // [channelID, payload, channelName, pair]
        if frame.len() < 4 || frame[frame.len() - 2].as_str() != Some("ticker") {
            return Ok(AdapterMessage::Ignored);
        }

        let pair = frame[frame.len() - 1]
            .as_str()
            .ok_or_else(|| FeedError::ParseError("kraken ticker without pair".into()))?;
        let last = frame[1]
            .get("c")
            .and_then(|c| c.get(0))
            .and_then(|p| p.as_str())
            .ok_or_else(|| FeedError::ParseError(format!("kraken ticker for {} without close", pair)))?;

        Ok(AdapterMessage::Ticker {
            symbol: pair.to_string(),
            price: parse_price(last)?,
        })
    }

    fn rest_ticker_url(&self, market: &str) -> String {
        format!("https://api.kraken.com/0/public/Ticker?pair={}", market)
    }

    fn parse_rest_ticker(&self, market: &str, body: &str) -> Result<f64, FeedError> {
        let response: KrakenRestResponse = serde_json::from_str(body)?;

        if !response.error.is_empty() {
            if response.error.iter().any(|e| e.contains("Unknown asset pair")) {
                return Err(FeedError::MarketUnavailable {
                    exchange: Exchange::Kraken,
                    market: market.to_string(),
                });
            }
            return Err(FeedError::ParseError(response.error.join("; ")));
        }

        // Result keys use Kraken's internal names (e.g. XXBTZUSD), so take the only entry.
        let entry = response
            .result
            .into_values()
            .next()
            .ok_or_else(|| FeedError::MarketUnavailable {
                exchange: Exchange::Kraken,
                market: market.to_string(),
            })?;
        let last = entry
            .c
            .first()
            .ok_or_else(|| FeedError::ParseError(format!("kraken ticker for {} without close", market)))?;
        parse_price(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ticker_frame() {
        let json = r#"[340,{"a":["60001.0",0,"0.5"],"b":["60000.0",1,"1.0"],"c":["60000.5","0.0025"],"v":["100","200"]},"ticker","XBT/USD"]"#;
        let msg = KrakenAdapter.parse_message(json).unwrap();
        assert_eq!(
            msg,
            AdapterMessage::Ticker {
                symbol: "XBT/USD".into(),
                price: 60000.5
            }
        );
    }

    #[test]
    fn test_events_are_ignored() {
        let mut adapter = KrakenAdapter;
        for json in [
            r#"{"event":"heartbeat"}"#,
            r#"{"connectionID":1,"event":"systemStatus","status":"online","version":"1.9.0"}"#,
            r#"{"channelID":340,"channelName":"ticker","event":"subscriptionStatus","pair":"XBT/USD","status":"subscribed","subscription":{"name":"ticker"}}"#,
            r#"[42,[["60000.0","0.1","1700000000.1","b","l",""]],"trade","XBT/USD"]"#,
        ] {
            assert_eq!(adapter.parse_message(json).unwrap(), AdapterMessage::Ignored);
        }
    }

    #[test]
    fn test_ticker_without_close_is_error() {
        let json = r#"[340,{"a":["60001.0",0,"0.5"]},"ticker","XBT/USD"]"#;
        assert!(KrakenAdapter.parse_message(json).is_err());
    }

    #[test]
    fn test_symbol_aliases() {
        let adapter = KrakenAdapter;
        assert_eq!(adapter.market_symbol("BTC", QuoteCurrency::USD), "XBT/USD");
        assert_eq!(adapter.market_symbol("ETH", QuoteCurrency::USD), "ETH/USD");
        assert_eq!(adapter.rest_market("BTC", QuoteCurrency::USDT), "XBTUSDT");
        assert_eq!(
            adapter.extract_base_quote("XBT/USD"),
            Some(("BTC".to_string(), "USD".to_string()))
        );
        assert_eq!(
            adapter.extract_base_quote("XBTUSDT"),
            Some(("BTC".to_string(), "USDT".to_string()))
        );
    }

    #[test]
    fn test_doge_alias_is_symmetric() {
        let adapter = KrakenAdapter;
        let stream = adapter.market_symbol("DOGE", QuoteCurrency::USD);
        let rest = adapter.rest_market("DOGE", QuoteCurrency::USD);
        assert_eq!(stream, "XDG/USD");
        assert_eq!(rest, "XDGUSD");
        for market in [stream, rest] {
            assert_eq!(
                adapter.extract_base_quote(&market),
                Some(("DOGE".to_string(), "USD".to_string()))
            );
        }
    }

    #[test]
    fn test_subscribe_message() {
        let msgs = KrakenAdapter.subscribe_messages(&["XBT/USD".into()]);
        let value: serde_json::Value = serde_json::from_str(&msgs[0]).unwrap();
        assert_eq!(value["event"], "subscribe");
        assert_eq!(value["pair"][0], "XBT/USD");
        assert_eq!(value["subscription"]["name"], "ticker");
    }

    #[test]
    fn test_rest_ticker() {
        let adapter = KrakenAdapter;
        assert_eq!(
            adapter.rest_ticker_url("XBTUSD"),
            "https://api.kraken.com/0/public/Ticker?pair=XBTUSD"
        );
        let body = r#"{"error":[],"result":{"XXBTZUSD":{"a":["60001.0","1","1.000"],"b":["60000.0","1","1.000"],"c":["60000.10000","0.00100000"]}}}"#;
        assert_eq!(adapter.parse_rest_ticker("XBTUSD", body).unwrap(), 60000.1);
    }

    #[test]
    fn test_rest_unknown_pair_is_unavailable() {
        let body = r#"{"error":["EQuery:Unknown asset pair"]}"#;
        let err = KrakenAdapter.parse_rest_ticker("FOOUSD", body).unwrap_err();
        assert!(matches!(err, FeedError::MarketUnavailable { .. }));
    }
}
