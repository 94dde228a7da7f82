//! WebSocket feed manager.
//!
//! Handles feed configuration, connection status, and spawning one
//! client/runner pair per exchange.

use crate::adapter::{adapter_for, stream_markets};
use crate::{FeedError, FeedRunner, PriceStore, WsClient};
use arbitrage_core::{Exchange, Token};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Buffered WebSocket messages per feed before new ones are dropped.
pub const FEED_CHANNEL_BUFFER: usize = 1000;

/// Connection state for a WebSocket feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Stopped,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Shared view of every feed's connection state.
#[derive(Debug, Default)]
pub struct FeedStatus {
    states: RwLock<HashMap<Exchange, ConnectionState>>,
}

impl FeedStatus {
    pub fn set(&self, exchange: Exchange, state: ConnectionState) {
        self.states.write().insert(exchange, state);
    }

    pub fn get(&self, exchange: Exchange) -> Option<ConnectionState> {
        self.states.read().get(&exchange).copied()
    }

    /// All known states, ordered by exchange.
    pub fn all(&self) -> BTreeMap<Exchange, ConnectionState> {
        self.states.read().iter().map(|(e, s)| (*e, *s)).collect()
    }

    pub fn connected_count(&self) -> usize {
        self.states.read().values().filter(|s| s.is_connected()).count()
    }
}

/// Configuration for a feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL
    pub ws_url: String,
    /// Exchange identifier
    pub exchange: Exchange,
    /// Base delay before reconnecting (ms)
    pub reconnect_delay_ms: u64,
    /// Upper bound on the backoff delay (ms)
    pub max_reconnect_delay_ms: u64,
    /// Maximum consecutive reconnection attempts (0 = unlimited)
    pub max_reconnect_attempts: u32,
    /// Ping interval to keep connection alive (ms)
    pub ping_interval_ms: u64,
    /// Connection timeout (ms)
    pub connect_timeout_ms: u64,
    /// Reconnect when nothing arrives for this long (ms)
    pub stale_timeout_ms: u64,
    /// Reconnect when a ping goes unanswered for this long (ms)
    pub pong_timeout_ms: u64,
    /// A connection up this long resets the attempt counter (ms)
    pub stable_after_ms: u64,
    /// Text keep-alive sent instead of a ping frame
    pub keepalive: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            exchange: Exchange::Binance,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 300_000,
            max_reconnect_attempts: 0,
            ping_interval_ms: 20_000,
            connect_timeout_ms: 10_000,
            stale_timeout_ms: 120_000,
            pong_timeout_ms: 30_000,
            stable_after_ms: 300_000,
            keepalive: None,
        }
    }
}

impl FeedConfig {
    /// Create config for a specific exchange.
    pub fn for_exchange(exchange: Exchange) -> Self {
        let adapter = adapter_for(exchange);
        Self {
            ws_url: adapter.ws_url().to_string(),
            exchange,
            keepalive: adapter.keepalive_message().map(str::to_string),
            ..Default::default()
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(8);
        let delay_ms = self
            .reconnect_delay_ms
            .saturating_mul(factor)
            .min(self.max_reconnect_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Whether another reconnect is allowed after `attempt` failures.
    pub fn may_retry(&self, attempt: u32) -> bool {
        self.max_reconnect_attempts == 0 || attempt <= self.max_reconnect_attempts
    }

    /// Check the URL before any connection attempt.
    pub fn validate(&self) -> Result<(), FeedError> {
        let url = url::Url::parse(&self.ws_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(FeedError::ConnectionFailed(format!(
                "unsupported scheme {} for {}",
                other, self.exchange
            ))),
        }
    }
}

/// Resolve once shutdown is requested or the sender is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Spawns and tracks streaming feeds that write into one price store.
pub struct FeedManager {
    store: Arc<PriceStore>,
    tokens: Vec<Token>,
    status: Arc<FeedStatus>,
    shutdown: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl FeedManager {
    pub fn new(
        store: Arc<PriceStore>,
        tokens: Vec<Token>,
        status: Arc<FeedStatus>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            tokens,
            status,
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Spawn a WebSocket client and its runner for one exchange.
    pub fn spawn(&mut self, config: FeedConfig) {
        let exchange = config.exchange;
        let adapter = adapter_for(exchange);
        let markets = stream_markets(adapter.as_ref(), &self.tokens);
        let subscribe_msgs = adapter.subscribe_messages(&markets);

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_BUFFER);
        let client = WsClient::new(config, tx, self.shutdown.clone());
        let runner = FeedRunner::new(
            adapter,
            Arc::clone(&self.store),
            self.tokens.iter().cloned().collect(),
            Arc::clone(&self.status),
        );
        let status = Arc::clone(&self.status);

        info!("{}: Starting feed for {} markets", exchange, markets.len());
        status.set(exchange, ConnectionState::Connecting);

        self.handles.push(tokio::spawn(async move {
            let (result, stats) = tokio::join!(client.run(subscribe_msgs), runner.run(rx));
            if let Err(e) = result {
                error!("{}: Feed stopped: {}", exchange, e);
            }
            info!(
                "{}: Feed finished ({} applied, {} ignored, {} malformed, {} rejected)",
                exchange, stats.applied, stats.ignored, stats.malformed, stats.rejected
            );
            status.set(exchange, ConnectionState::Stopped);
        }));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every feed task to finish.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Feed task panicked: {}", e);
            }
        }
    }
}
