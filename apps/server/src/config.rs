//! Application configuration.

use arbitrage_core::{Exchange, QuoteCurrency, Token};
use arbitrage_engine::DetectorConfig;
use arbitrage_feeds::{FeedConfig, PollerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Exchanges to collect from.
    pub exchanges: Vec<Exchange>,
    /// Tokens to watch.
    pub tokens: Vec<Token>,
    /// Quote currencies tried in order by the poller.
    pub candidate_quotes: Vec<QuoteCurrency>,
    /// Prices older than this are left out of snapshots (0 disables).
    pub staleness_ms: u64,
    /// Run WebSocket feeds.
    pub streaming: bool,
    /// Run the REST poller.
    pub polling: bool,
    /// Polling settings.
    pub poll: PollSettings,
    /// WebSocket feed settings.
    pub feed: FeedSettings,
    /// Detector settings.
    pub detector: DetectorSettings,
    /// HTTP API port.
    pub api_port: u16,
    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchanges: Exchange::all().to_vec(),
            tokens: Token::defaults(),
            candidate_quotes: QuoteCurrency::default_candidates(),
            staleness_ms: 120_000,
            streaming: true,
            polling: true,
            poll: PollSettings::default(),
            feed: FeedSettings::default(),
            detector: DetectorSettings::default(),
            api_port: 9001,
            log_level: "info".to_string(),
        }
    }
}

/// Polling Collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    /// Timeout for a single ticker request.
    pub request_timeout_ms: u64,
    /// Budget for one exchange's fetch in a cycle.
    pub exchange_timeout_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            request_timeout_ms: 10_000,
            exchange_timeout_ms: 30_000,
        }
    }
}

/// WebSocket feed settings shared by every exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    /// 0 retries forever.
    pub max_reconnect_attempts: u32,
    pub ping_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub stale_timeout_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        let defaults = FeedConfig::default();
        Self {
            reconnect_delay_ms: defaults.reconnect_delay_ms,
            max_reconnect_delay_ms: defaults.max_reconnect_delay_ms,
            max_reconnect_attempts: defaults.max_reconnect_attempts,
            ping_interval_ms: defaults.ping_interval_ms,
            connect_timeout_ms: defaults.connect_timeout_ms,
            stale_timeout_ms: defaults.stale_timeout_ms,
        }
    }
}

/// Detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Minimum improvement for a relaxation to count.
    pub tolerance: f64,
    /// Scan interval in milliseconds.
    pub scan_interval_ms: u64,
    /// Fee fraction a spread must beat to be listed.
    pub spread_fee_rate: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            tolerance: DetectorConfig::default().tolerance,
            scan_interval_ms: 1_000,
            spread_fee_rate: 0.002,
        }
    }
}

impl From<&DetectorSettings> for DetectorConfig {
    fn from(settings: &DetectorSettings) -> Self {
        DetectorConfig {
            tolerance: settings.tolerance,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: display,
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::Invalid("no exchanges configured".into()));
        }
        if self.tokens.is_empty() {
            return Err(ConfigError::Invalid("no tokens configured".into()));
        }
        if !self.streaming && !self.polling {
            return Err(ConfigError::Invalid(
                "both streaming and polling are disabled".into(),
            ));
        }
        if self.polling && (self.poll.interval_ms == 0 || self.candidate_quotes.is_empty()) {
            return Err(ConfigError::Invalid(
                "polling needs a non-zero interval and at least one quote".into(),
            ));
        }
        if self.polling
            && (self.poll.request_timeout_ms == 0
                || self.poll.request_timeout_ms >= self.poll.exchange_timeout_ms)
        {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive and below exchange_timeout_ms".into(),
            ));
        }
        if self.detector.scan_interval_ms == 0 {
            return Err(ConfigError::Invalid("scan_interval_ms must be positive".into()));
        }
        if !(self.detector.tolerance >= 0.0) || !(self.detector.spread_fee_rate >= 0.0) {
            return Err(ConfigError::Invalid(
                "tolerance and spread_fee_rate must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Staleness horizon for the price store.
    pub fn max_age(&self) -> Option<Duration> {
        (self.staleness_ms > 0).then(|| Duration::from_millis(self.staleness_ms))
    }

    pub fn detector_config(&self) -> DetectorConfig {
        (&self.detector).into()
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            exchanges: self.exchanges.clone(),
            tokens: self.tokens.clone(),
            candidate_quotes: self.candidate_quotes.clone(),
            request_timeout: Duration::from_millis(self.poll.request_timeout_ms),
            exchange_timeout: Duration::from_millis(self.poll.exchange_timeout_ms),
            interval: Duration::from_millis(self.poll.interval_ms),
        }
    }

    pub fn feed_config(&self, exchange: Exchange) -> FeedConfig {
        FeedConfig {
            reconnect_delay_ms: self.feed.reconnect_delay_ms,
            max_reconnect_delay_ms: self.feed.max_reconnect_delay_ms,
            max_reconnect_attempts: self.feed.max_reconnect_attempts,
            ping_interval_ms: self.feed.ping_interval_ms,
            connect_timeout_ms: self.feed.connect_timeout_ms,
            stale_timeout_ms: self.feed.stale_timeout_ms,
            ..FeedConfig::for_exchange(exchange)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("arbitrage-bot-{}-{}.json", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.exchanges.len(), 5);
        assert_eq!(config.tokens.len(), 9);
        assert_eq!(
            config.candidate_quotes,
            vec![QuoteCurrency::USDT, QuoteCurrency::USD, QuoteCurrency::USDC]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("/definitely/not/here/config.json").unwrap();
        assert_eq!(config.api_port, AppConfig::default().api_port);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_file(
            "partial",
            r#"{"exchanges":["kraken","okx"],"tokens":["btc","eth"],"detector":{"scan_interval_ms":250}}"#,
        );
        let config = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.exchanges, vec![Exchange::Kraken, Exchange::Okx]);
        assert_eq!(config.tokens, vec![Token::new("BTC"), Token::new("ETH")]);
        assert_eq!(config.detector.scan_interval_ms, 250);
        assert_eq!(config.detector.tolerance, 1e-9);
        assert_eq!(config.poll.interval_ms, 60_000);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let path = temp_file("malformed", "{ not json");
        let result = AppConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let mut config = AppConfig::default();
        config.streaming = false;
        config.polling = false;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tokens.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.detector.tolerance = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.poll.request_timeout_ms = config.poll.exchange_timeout_ms;
        assert!(config.validate().is_err());
        config.polling = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_component_configs() {
        let mut config = AppConfig::default();
        config.staleness_ms = 0;
        config.feed.reconnect_delay_ms = 250;
        config.poll.request_timeout_ms = 3_000;
        config.poll.exchange_timeout_ms = 20_000;

        assert_eq!(config.max_age(), None);
        let poller = config.poller_config();
        assert_eq!(poller.request_timeout, Duration::from_secs(3));
        assert_eq!(poller.exchange_timeout, Duration::from_secs(20));

        let feed = config.feed_config(Exchange::Okx);
        assert_eq!(feed.exchange, Exchange::Okx);
        assert_eq!(feed.reconnect_delay_ms, 250);
        assert_eq!(feed.keepalive.as_deref(), Some("ping"));
        assert!(feed.ws_url.starts_with("wss://"));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tokens, config.tokens);
        assert_eq!(parsed.detector.spread_fee_rate, config.detector.spread_fee_rate);
    }
}
