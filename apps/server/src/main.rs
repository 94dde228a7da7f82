//! Arbitrage Bot - Headless Server
//!
//! Collects prices from several exchanges and scans them for cross-exchange
//! arbitrage cycles.

mod api;
mod config;
mod state;

use clap::Parser;
use config::AppConfig;
use state::{create_state, SharedState};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use arbitrage_feeds::{wait_for_shutdown, FeedManager, PollingCollector};

const STATS_INTERVAL: Duration = Duration::from_secs(30);
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Arbitrage Bot CLI
#[derive(Parser, Debug)]
#[command(name = "arbitrage-bot")]
#[command(about = "Cross-exchange crypto arbitrage detector", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log level: trace, debug, info, warn, error (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Disable WebSocket feeds
    #[arg(long, default_value_t = false)]
    no_stream: bool,

    /// Disable the REST poller
    #[arg(long, default_value_t = false)]
    no_poll: bool,

    /// HTTP API port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(port) = self.port {
            config.api_port = port;
        }
        if self.no_stream {
            config.streaming = false;
        }
        if self.no_poll {
            config.polling = false;
        }
    }
}

/// RUST_LOG wins over the configured level when set.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run_detector_loop(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    info!("Starting detector loop");

    let mut ticker =
        tokio::time::interval(Duration::from_millis(state.config.detector.scan_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_reported: Option<String> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wait_for_shutdown(&mut shutdown) => break,
        }

        let result = state.scan();
        match (result.describe(), result.profit_pct) {
            (Some(cycle), Some(pct)) => {
                if last_reported.as_deref() != Some(cycle.as_str()) {
                    info!("🎯 Arbitrage: {} | Profit: {:.4}%", cycle, pct);
                    last_reported = Some(cycle);
                } else {
                    debug!("Arbitrage still open: {} | Profit: {:.4}%", cycle, pct);
                }
            }
            _ => {
                if last_reported.take().is_some() {
                    info!("Arbitrage closed");
                }
            }
        }
    }

    info!("Detector loop stopped");
}

async fn run_stats_reporter(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wait_for_shutdown(&mut shutdown) => return,
        }

        let summary = state.stats.summary();
        info!(
            "📊 Stats | Uptime: {}s | Prices: {} | Feeds up: {} | Scans: {} | Cycles: {}",
            summary.uptime_secs,
            state.store.len(),
            state.feed_status.connected_count(),
            summary.scans,
            summary.cycles_found
        );
    }
}

async fn await_task(name: &str, handle: JoinHandle<()>) {
    match tokio::time::timeout(TASK_STOP_TIMEOUT, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{} task failed: {}", name, e),
        Err(_) => warn!("{} did not stop within {:?}", name, TASK_STOP_TIMEOUT),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    init_logging(&config.log_level);
    config.validate()?;

    info!("🚀 Arbitrage Bot starting...");
    info!("  Exchanges: {:?}", config.exchanges);
    info!("  Tokens: {}", config.tokens.len());
    info!("  Streaming: {}", config.streaming);
    info!("  Polling: {}", config.polling);
    info!("  API Port: {}", config.api_port);

    let state = create_state(config.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let api_handle = api::start_api_server(state.clone(), config.api_port, shutdown_rx.clone()).await?;

    let mut feeds = FeedManager::new(
        state.store.clone(),
        config.tokens.clone(),
        state.feed_status.clone(),
        shutdown_rx.clone(),
    );
    if config.streaming {
        for &exchange in &config.exchanges {
            feeds.spawn(config.feed_config(exchange));
        }
    }

    let poller_handle = if config.polling {
        let collector = PollingCollector::new(config.poller_config())?;
        let store = state.store.clone();
        let shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            collector.run(store, shutdown).await;
        }))
    } else {
        None
    };

    let detector_handle = tokio::spawn(run_detector_loop(state.clone(), shutdown_rx.clone()));
    let stats_handle = tokio::spawn(run_stats_reporter(state.clone(), shutdown_rx));

    info!("Press Ctrl+C to stop...");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    await_task("Detector", detector_handle).await;
    await_task("Stats reporter", stats_handle).await;
    if let Some(handle) = poller_handle {
        await_task("Poller", handle).await;
    }
    if tokio::time::timeout(TASK_STOP_TIMEOUT, feeds.join()).await.is_err() {
        warn!("Feeds did not stop within {:?}", TASK_STOP_TIMEOUT);
    }
    await_task("API server", api_handle).await;

    let summary = state.stats.summary();
    info!("📈 Final Stats:");
    info!("  Total uptime: {} seconds", summary.uptime_secs);
    info!("  Scans: {}", summary.scans);
    info!("  Cycles found: {}", summary.cycles_found);

    info!("👋 Arbitrage Bot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbitrage_core::{Exchange, PriceUpdate, Token};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from(["arbitrage-bot", "--no-poll", "--port", "8080", "-l", "debug"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.log_level, "debug");
        assert!(config.streaming);
        assert!(!config.polling);
    }

    #[test]
    fn test_args_defaults_keep_config() {
        let args = Args::parse_from(["arbitrage-bot"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(args.config, "config.json");
        assert_eq!(config.api_port, AppConfig::default().api_port);
        assert!(config.streaming && config.polling);
    }

    #[tokio::test]
    async fn test_detector_loop_scans_until_shutdown() {
        let mut config = AppConfig::default();
        config.detector.scan_interval_ms = 10;
        let state = create_state(config);
        state
            .store
            .apply(PriceUpdate::new(Exchange::Binance, Token::new("BTC"), 60000.0))
            .unwrap();
        state
            .store
            .apply(PriceUpdate::new(Exchange::Okx, Token::new("BTC"), 60300.0))
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_detector_loop(state.clone(), rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();

        let summary = state.stats.summary();
        assert!(summary.scans > 0);
        assert_eq!(summary.cycles_found, 0);
        assert!(!state.latest().is_found());
    }
}
