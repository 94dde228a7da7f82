//! Shared application state.

use crate::config::AppConfig;
use arbitrage_core::{now_ms, ArbitrageResult, PriceSnapshot, Spread};
use arbitrage_engine::{detect_arbitrage, find_spreads, DetectorConfig};
use arbitrage_feeds::{FeedStatus, PriceStore};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Detection counters.
#[derive(Debug)]
pub struct BotStats {
    pub started_at_ms: u64,
    pub scans: AtomicU64,
    pub cycles_found: AtomicU64,
    pub last_scan_ms: AtomicU64,
}

impl Default for BotStats {
    fn default() -> Self {
        Self {
            started_at_ms: now_ms(),
            scans: AtomicU64::new(0),
            cycles_found: AtomicU64::new(0),
            last_scan_ms: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub uptime_secs: u64,
    pub scans: u64,
    pub cycles_found: u64,
    pub last_scan_ms: u64,
}

impl BotStats {
    pub fn record_scan(&self, found: bool) {
        self.scans.fetch_add(1, Ordering::Relaxed);
        if found {
            self.cycles_found.fetch_add(1, Ordering::Relaxed);
        }
        self.last_scan_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            uptime_secs: now_ms().saturating_sub(self.started_at_ms) / 1000,
            scans: self.scans.load(Ordering::Relaxed),
            cycles_found: self.cycles_found.load(Ordering::Relaxed),
            last_scan_ms: self.last_scan_ms.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the collectors, the detection loop, and the API.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<PriceStore>,
    pub feed_status: Arc<FeedStatus>,
    pub stats: BotStats,
    detector: DetectorConfig,
    latest: RwLock<ArbitrageResult>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            store: Arc::new(PriceStore::new(config.max_age())),
            feed_status: Arc::new(FeedStatus::default()),
            stats: BotStats::default(),
            detector: config.detector_config(),
            latest: RwLock::new(ArbitrageResult::none()),
            config,
        }
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        self.store.snapshot()
    }

    /// Detect on a fresh snapshot and record the outcome.
    pub fn scan(&self) -> ArbitrageResult {
        let result = detect_arbitrage(&self.snapshot(), &self.detector);
        self.stats.record_scan(result.is_found());
        *self.latest.write() = result.clone();
        result
    }

    /// Result of the most recent scan.
    pub fn latest(&self) -> ArbitrageResult {
        self.latest.read().clone()
    }

    pub fn spreads(&self) -> Vec<Spread> {
        find_spreads(&self.snapshot(), self.config.detector.spread_fee_rate)
    }
}

pub fn create_state(config: AppConfig) -> SharedState {
    Arc::new(AppState::new(config))
}
