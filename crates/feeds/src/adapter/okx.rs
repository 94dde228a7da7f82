use arbitrage_core::{Exchange, QuoteCurrency};
use serde::Deserialize;

use super::{parse_price, AdapterMessage, ExchangeAdapter};
use crate::FeedError;

pub struct OkxAdapter;

#[derive(Debug, Deserialize)]
struct OkxArg {
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Debug, Deserialize)]
struct OkxTicker {
    #[serde(rename = "instId", default)]
    inst_id: Option<String>,
    last: String,
}

#[derive(Debug, Deserialize)]
struct OkxPush {
    event: Option<String>,
    code: Option<String>,
    msg: Option<String>,
    arg: Option<OkxArg>,
    #[serde(default)]
    data: Vec<OkxTicker>,
}

#[derive(Debug, Deserialize)]
struct OkxRestResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<OkxTicker>,
}

// "Instrument ID does not exist"
const INSTRUMENT_NOT_FOUND: &str = "51001";

impl ExchangeAdapter for OkxAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    fn ws_url(&self) -> &'static str {
        "wss://ws.okx.com:8443/ws/v5/public"
    }

    fn stream_quote(&self) -> QuoteCurrency {
        QuoteCurrency::USDT
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
        let args: Vec<serde_json::Value> = markets
            .iter()
            .map(|inst_id| serde_json::json!({ "channel": "tickers", "instId": inst_id }))
            .collect();
        vec![serde_json::json!({ "op": "subscribe", "args": args }).to_string()]
    }

    fn parse_message(&mut self, text: &str) -> Result<AdapterMessage, FeedError> {
        if text.trim() == "pong" {
            return Ok(AdapterMessage::Ignored);
        }

        let push: OkxPush = serde_json::from_str(text)?;

        match push.event.as_deref() {
            Some("error") => {
                return Err(FeedError::ParseError(format!(
                    "okx error {}: {}",
                    push.code.unwrap_or_default(),
                    push.msg.unwrap_or_default()
                )))
            }
            Some(_) => return Ok(AdapterMessage::Ignored),
            None => {}
        }

        let Some(ticker) = push.data.into_iter().next() else {
            return Ok(AdapterMessage::Ignored);
        };
        let symbol = ticker
            .inst_id
            .or(push.arg.map(|arg| arg.inst_id))
            .ok_or_else(|| FeedError::ParseError("okx ticker without instId".into()))?;

        Ok(AdapterMessage::Ticker {
            price: parse_price(&ticker.last)?,
            symbol,
        })
    }

    fn keepalive_message(&self) -> Option<&'static str> {
        Some("ping")
    }

    fn rest_ticker_url(&self, market: &str) -> String {
        format!("https://www.okx.com/api/v5/market/ticker?instId={}", market)
    }

    fn parse_rest_ticker(&self, market: &str, body: &str) -> Result<f64, FeedError> {
        let response: OkxRestResponse = serde_json::from_str(body)?;

        if response.code == INSTRUMENT_NOT_FOUND
            || (response.code == "0" && response.data.is_empty())
        {
            return Err(FeedError::MarketUnavailable {
                exchange: Exchange::Okx,
                market: market.to_string(),
            });
        }
        if response.code != "0" {
            return Err(FeedError::ParseError(format!(
                "okx error {}: {}",
                response.code, response.msg
            )));
        }

        let ticker = &response.data[0];
        parse_price(&ticker.last)
    }
}
