//! WebSocket client for exchange connections.

use crate::{wait_for_shutdown, FeedConfig, FeedError};
use futures_util::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Message received from WebSocket.
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    /// Text message (JSON).
    Text(String),
    /// Binary message.
    Binary(Vec<u8>),
    /// Connection established (first time).
    Connected,
    /// Connection closed.
    Disconnected,
    /// Reconnected after disconnection.
    /// Consumers should drop per-connection state when receiving this.
    Reconnected,
    /// Error occurred.
    Error(String),
}

/// How a single connection ended without error.
enum SessionEnd {
    Shutdown,
    ConsumerGone,
}

/// WebSocket client for a single exchange connection.
pub struct WsClient {
    config: FeedConfig,
    tx: mpsc::Sender<WsMessage>,
    shutdown: watch::Receiver<bool>,
    has_connected: bool,
    session_open: bool,
    dropped: u64,
}

impl WsClient {
    /// Create a new WebSocket client.
    pub fn new(config: FeedConfig, tx: mpsc::Sender<WsMessage>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            config,
            tx,
            shutdown,
            has_connected: false,
            session_open: false,
            dropped: 0,
        }
    }

    /// Connect, subscribe, and keep the connection alive until shutdown.
    ///
    /// Failures are retried with exponential backoff; the subscriptions are
    /// re-sent on every new connection. Returns `RetriesExhausted` once
    /// `max_reconnect_attempts` consecutive failures have happened.
    pub async fn run(mut self, subscribe_msgs: Vec<String>) -> Result<(), FeedError> {
        self.config.validate()?;
        let exchange = self.config.exchange;
        let mut reconnect_attempts = 0u32;

        loop {
            if *self.shutdown.borrow() {
                return Ok(());
            }

            let connection_start = Instant::now();
            self.session_open = false;

            let err = match self.connect_and_handle(&subscribe_msgs).await {
                Ok(SessionEnd::Shutdown) => {
                    debug!("{}: WebSocket closed for shutdown", exchange);
                    return Ok(());
                }
                Ok(SessionEnd::ConsumerGone) => {
                    debug!("{}: Receiver dropped, stopping client", exchange);
                    return Ok(());
                }
                Err(e) => e,
            };

            let connection_duration = connection_start.elapsed();

            // Reset reconnect counter if the connection was stable
            if connection_duration >= Duration::from_millis(self.config.stable_after_ms) {
                info!(
                    "{}: Connection was stable for {:?}, resetting reconnect counter",
                    exchange, connection_duration
                );
                reconnect_attempts = 0;
            }

            reconnect_attempts = reconnect_attempts.saturating_add(1);

            if self.session_open {
                let _ = self.tx.send(WsMessage::Disconnected).await;
            }

            if !self.config.may_retry(reconnect_attempts) {
                error!(
                    "{}: Giving up after {} reconnect attempts, last error: {}",
                    exchange, self.config.max_reconnect_attempts, err
                );
                return Err(FeedError::RetriesExhausted(self.config.max_reconnect_attempts));
            }

            let delay = self.config.backoff_delay(reconnect_attempts);
            warn!(
                "{}: WebSocket error after {:?}: {}. Reconnecting in {:.1}s (attempt #{})",
                exchange,
                connection_duration,
                err,
                delay.as_secs_f64(),
                reconnect_attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut self.shutdown) => return Ok(()),
            }
        }
    }

    async fn connect_and_handle(&mut self, subscribe_msgs: &[String]) -> Result<SessionEnd, FeedError> {
        let exchange = self.config.exchange;
        debug!("Connecting to {}: {}", exchange, self.config.ws_url);

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let connect = tokio::time::timeout(connect_timeout, connect_async(self.config.ws_url.as_str()));
        let (ws_stream, response) = tokio::select! {
            result = connect => result
                .map_err(|_| FeedError::Timeout(format!("connect to {} after {:?}", exchange, connect_timeout)))??,
            _ = wait_for_shutdown(&mut self.shutdown) => return Ok(SessionEnd::Shutdown),
        };
        debug!("{}: Connected (status: {:?})", exchange, response.status());

        let event = if self.has_connected {
            WsMessage::Reconnected
        } else {
            WsMessage::Connected
        };
        self.has_connected = true;
        self.session_open = true;
        if self.tx.send(event).await.is_err() {
            return Ok(SessionEnd::ConsumerGone);
        }

        let (mut write, mut read) = ws_stream.split();

        debug!("{}: Sending {} subscription message(s)", exchange, subscribe_msgs.len());
        for msg in subscribe_msgs {
            if let Err(e) = write.send(Message::Text(msg.clone())).await {
                error!("{}: Failed to send subscription: {}", exchange, e);
                return Err(FeedError::ConnectionFailed(format!("Subscription failed: {}", e)));
            }
        }

        let ping_interval = Duration::from_millis(self.config.ping_interval_ms);
        let mut ping_timer = tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);

        // Stale connection detection catches silent disconnects.
        let stale_timeout = Duration::from_millis(self.config.stale_timeout_ms);
        let mut last_message_time = Instant::now();

        let pong_timeout = Duration::from_millis(self.config.pong_timeout_ms);
        let mut awaiting_pong = false;
        let mut ping_sent_time = Instant::now();

        loop {
            if last_message_time.elapsed() > stale_timeout {
                warn!("{}: No messages received for {:?}, forcing reconnect",
                    exchange, last_message_time.elapsed());
                return Err(FeedError::Disconnected("Stale connection - no messages received".to_string()));
            }

            if awaiting_pong && ping_sent_time.elapsed() > pong_timeout {
                warn!("{}: No PONG received for {:?} after PING, forcing reconnect",
                    exchange, ping_sent_time.elapsed());
                return Err(FeedError::Disconnected("Ping timeout - no PONG received".to_string()));
            }

            tokio::select! {
                msg = read.next() => {
                    last_message_time = Instant::now();

                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.forward(WsMessage::Text(text)) {
                                return Ok(SessionEnd::ConsumerGone);
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if !self.forward(WsMessage::Binary(data)) {
                                return Ok(SessionEnd::ConsumerGone);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                error!("{}: Failed to send PONG: {}", exchange, e);
                                return Err(FeedError::ConnectionFailed(format!("PONG send failed: {}", e)));
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            awaiting_pong = false;
                            debug!("{}: Received WebSocket PONG (latency: {:?})",
                                exchange, ping_sent_time.elapsed());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("{}: Received close frame: {:?}", exchange, frame);
                            return Err(FeedError::Disconnected("Closed by server".to_string()));
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            let _ = self.tx.try_send(WsMessage::Error(e.to_string()));
                            return Err(FeedError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(FeedError::Disconnected("Stream ended".to_string()));
                        }
                    }
                }
                _ = ping_timer.tick() => {
                    if let Some(keepalive) = &self.config.keepalive {
                        // Application-level keep-alive; any reply counts as traffic.
                        if let Err(e) = write.send(Message::Text(keepalive.clone())).await {
                            return Err(FeedError::ConnectionFailed(format!("Keep-alive failed: {}", e)));
                        }
                    } else {
                        if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                            return Err(FeedError::ConnectionFailed(format!("PING failed: {}", e)));
                        }
                        if !awaiting_pong {
                            awaiting_pong = true;
                            ping_sent_time = Instant::now();
                        }
                    }
                }
                _ = wait_for_shutdown(&mut self.shutdown) => {
                    debug!("{}: Shutdown requested, closing connection", exchange);
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }

    /// Hand a message to the runner without blocking the socket.
    /// Returns false once the receiver is gone.
    fn forward(&mut self, msg: WsMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Prices are last-writer-wins, so a dropped frame is superseded by the next one.
                self.dropped += 1;
                if self.dropped % 1000 == 1 {
                    warn!("{}: Channel full, dropped {} messages so far", self.config.exchange, self.dropped);
                }
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
