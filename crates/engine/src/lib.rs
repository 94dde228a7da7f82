//! Arbitrage detection engine.
//!
//! Builds the exchange-rate graph from a price snapshot, searches it for a
//! negative cycle, and prices whatever cycle it finds. Everything here works
//! on an immutable snapshot and needs no locking.

pub mod detector;
pub mod error;
pub mod graph;
pub mod profit;
pub mod spreads;

pub use detector::*;
pub use error::*;
pub use graph::*;
pub use profit::*;
pub use spreads::*;

use arbitrage_core::{ArbitrageResult, PriceSnapshot};
use tracing::{debug, error};

/// Run graph construction, cycle detection, and profit calculation.
pub fn detect_arbitrage(snapshot: &PriceSnapshot, config: &DetectorConfig) -> ArbitrageResult {
    let graph = GraphBuilder::build(snapshot);
    if graph.is_empty() {
        debug!("No token is quoted on two exchanges, skipping detection");
        return ArbitrageResult::none();
    }

    let Some(cycle) = CycleDetector::new(*config).detect(&graph) else {
        return ArbitrageResult::none();
    };

    match profit_pct(&graph, &cycle) {
        Ok(pct) => ArbitrageResult::found(cycle.to_vertices(&graph), pct),
        Err(e) => {
            error!("Detected cycle could not be priced: {}", e);
            ArbitrageResult::none()
        }
    }
}
