//! Feed runner: turns raw WebSocket messages into Price Store updates.

use crate::adapter::{AdapterMessage, ExchangeAdapter};
use crate::{ApplyOutcome, ConnectionState, FeedError, FeedStatus, PriceStore, WsMessage};
use arbitrage_core::{PriceUpdate, Token};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Per-feed message counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    /// Updates written to the store.
    pub applied: u64,
    /// Control messages, unknown symbols, tokens outside the watch set, outdated updates.
    pub ignored: u64,
    /// Messages the adapter could not parse.
    pub malformed: u64,
    /// Prices the store refused.
    pub rejected: u64,
}

/// Consumes one exchange's `WsMessage` stream.
pub struct FeedRunner {
    adapter: Box<dyn ExchangeAdapter>,
    store: Arc<PriceStore>,
    tokens: HashSet<Token>,
    status: Arc<FeedStatus>,
    stats: RunnerStats,
}

impl FeedRunner {
    pub fn new(
        adapter: Box<dyn ExchangeAdapter>,
        store: Arc<PriceStore>,
        tokens: HashSet<Token>,
        status: Arc<FeedStatus>,
    ) -> Self {
        Self {
            adapter,
            store,
            tokens,
            status,
            stats: RunnerStats::default(),
        }
    }

    pub fn stats(&self) -> RunnerStats {
        self.stats
    }

    /// Run until the client side of the channel closes.
    pub async fn run(mut self, mut rx: mpsc::Receiver<WsMessage>) -> RunnerStats {
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        self.stats
    }

    /// Process one message from the client.
    pub fn handle(&mut self, msg: WsMessage) {
        let exchange = self.adapter.exchange();
        match msg {
            WsMessage::Connected => {
                info!("{}: Connected", exchange);
                self.status.set(exchange, ConnectionState::Connected);
            }
            WsMessage::Reconnected => {
                info!("{}: Reconnected", exchange);
                self.adapter.reset();
                self.status.set(exchange, ConnectionState::Connected);
            }
            WsMessage::Disconnected => {
                self.status.set(exchange, ConnectionState::Reconnecting);
            }
            WsMessage::Error(e) => warn!("{}: WebSocket error: {}", exchange, e),
            WsMessage::Text(text) => self.handle_text(&text),
            WsMessage::Binary(data) => match String::from_utf8(data) {
                Ok(text) => self.handle_text(&text),
                Err(e) => {
                    self.stats.malformed += 1;
                    debug!("{}: Undecodable binary frame: {}", exchange, e);
                }
            },
        }
    }

    fn handle_text(&mut self, text: &str) {
        match self.to_update(text) {
            Ok(Some(update)) => self.apply(update),
            Ok(None) => self.stats.ignored += 1,
            Err(e) => {
                self.stats.malformed += 1;
                debug!(
                    "{}: Dropping malformed message: {} ({})",
                    self.adapter.exchange(),
                    e,
                    text.chars().take(200).collect::<String>()
                );
            }
        }
    }

    /// Parse a frame into a canonical update for a watched token.
    fn to_update(&mut self, text: &str) -> Result<Option<PriceUpdate>, FeedError> {
        let AdapterMessage::Ticker { symbol, price } = self.adapter.parse_message(text)? else {
            return Ok(None);
        };

        let Some((base, _quote)) = self.adapter.extract_base_quote(&symbol) else {
            debug!("{}: Unknown market symbol {}", self.adapter.exchange(), symbol);
            return Ok(None);
        };

        let token = Token::new(&base);
        if !self.tokens.contains(&token) {
            return Ok(None);
        }

        Ok(Some(PriceUpdate::new(self.adapter.exchange(), token, price)))
    }

    fn apply(&mut self, update: PriceUpdate) {
        let exchange = update.exchange;
        match self.store.apply(update) {
            Ok(ApplyOutcome::Stored) => self.stats.applied += 1,
            Ok(ApplyOutcome::Outdated) => self.stats.ignored += 1,
            Err(e) => {
                self.stats.rejected += 1;
                debug!("{}: Rejected price: {}", exchange, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::adapter_for;
    use arbitrage_core::Exchange;
    use pretty_assertions::assert_eq;

    fn runner(exchange: Exchange, tokens: &[&str]) -> (FeedRunner, Arc<PriceStore>, Arc<FeedStatus>) {
        let store = Arc::new(PriceStore::default());
        let status = Arc::new(FeedStatus::default());
        let runner = FeedRunner::new(
            adapter_for(exchange),
            Arc::clone(&store),
            tokens.iter().map(|t| Token::new(t)).collect(),
            Arc::clone(&status),
        );
        (runner, store, status)
    }

    #[test]
    fn test_ticker_is_applied_under_canonical_token() {
        let (mut runner, store, _) = runner(Exchange::Kraken, &["BTC"]);
        runner.handle(WsMessage::Text(
            r#"[340,{"c":["60000.5","0.1"]},"ticker","XBT/USD"]"#.into(),
        ));

        let entry = store.last_known(Exchange::Kraken, &Token::new("BTC")).unwrap();
        assert_eq!(entry.price, 60000.5);
        assert_eq!(runner.stats().applied, 1);
    }

    #[test]
    fn test_unwatched_token_is_ignored() {
        let (mut runner, store, _) = runner(Exchange::Binance, &["ETH"]);
        runner.handle(WsMessage::Text(r#"{"e":"trade","s":"BTCUSDT","p":"60000"}"#.into()));
        assert!(store.is_empty());
        assert_eq!(runner.stats().ignored, 1);
    }

    #[test]
    fn test_malformed_and_rejected_messages_are_counted() {
        let (mut runner, store, _) = runner(Exchange::Binance, &["BTC"]);
        runner.handle(WsMessage::Text("{not json".into()));
        runner.handle(WsMessage::Binary(vec![0xff, 0xfe]));
        runner.handle(WsMessage::Text(r#"{"e":"trade","s":"BTCUSDT","p":"0"}"#.into()));

        assert!(store.is_empty());
        assert_eq!(
            runner.stats(),
            RunnerStats {
                applied: 0,
                ignored: 0,
                malformed: 2,
                rejected: 1,
            }
        );
    }

    #[test]
    fn test_binary_frames_are_decoded_as_text() {
        let (mut runner, store, _) = runner(Exchange::Okx, &["SOL"]);
        let frame = r#"{"arg":{"channel":"tickers","instId":"SOL-USDT"},"data":[{"instId":"SOL-USDT","last":"150.25"}]}"#;
        runner.handle(WsMessage::Binary(frame.as_bytes().to_vec()));
        assert_eq!(
            store.last_known(Exchange::Okx, &Token::new("SOL")).unwrap().price,
            150.25
        );
    }

    #[test]
    fn test_reconnect_resets_adapter_state() {
        let (mut runner, store, status) = runner(Exchange::Bitfinex, &["BTC"]);
        runner.handle(WsMessage::Connected);
        runner.handle(WsMessage::Text(
            r#"{"event":"subscribed","channel":"ticker","chanId":7,"symbol":"tBTCUSD"}"#.into(),
        ));
        runner.handle(WsMessage::Disconnected);
        assert_eq!(status.get(Exchange::Bitfinex), Some(ConnectionState::Reconnecting));

        runner.handle(WsMessage::Reconnected);
        assert_eq!(status.get(Exchange::Bitfinex), Some(ConnectionState::Connected));

        // Channel 7 belonged to the previous connection.
        runner.handle(WsMessage::Text("[7,[1,1,1,1,0,0,60000,1,1,1]]".into()));
        assert!(store.is_empty());
        assert_eq!(runner.stats().malformed, 1);
    }

    #[tokio::test]
    async fn test_run_drains_channel_until_closed() {
        let (runner, store, _) = runner(Exchange::Coinbase, &["BTC", "ETH"]);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(runner.run(rx));

        tx.send(WsMessage::Connected).await.unwrap();
        tx.send(WsMessage::Text(
            r#"{"type":"ticker","product_id":"BTC-USD","price":"60000"}"#.into(),
        ))
        .await
        .unwrap();
        tx.send(WsMessage::Text(
            r#"{"type":"ticker","product_id":"ETH-USD","price":"3000"}"#.into(),
        ))
        .await
        .unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.applied, 2);
        assert_eq!(store.snapshot().len(), 2);
    }
}
