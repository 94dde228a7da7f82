//! HTTP API over the shared state.

use crate::state::{SharedState, StatsSummary};
use arbitrage_core::{ArbitrageResult, Exchange, PriceSnapshot, Spread};
use arbitrage_feeds::{wait_for_shutdown, ConnectionState};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub feeds: BTreeMap<Exchange, ConnectionState>,
    pub stored_prices: usize,
    pub stats: StatsSummary,
    pub latest: ArbitrageResult,
}

pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/prices", get(prices_handler))
        .route("/arbitrage", get(arbitrage_handler))
        .route("/spreads", get(spreads_handler))
        .route("/status", get(status_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn prices_handler(State(state): State<SharedState>) -> Json<PriceSnapshot> {
    Json(state.snapshot())
}

/// Runs a detection on the current prices.
async fn arbitrage_handler(State(state): State<SharedState>) -> Json<ArbitrageResult> {
    Json(state.scan())
}

async fn spreads_handler(State(state): State<SharedState>) -> Json<Vec<Spread>> {
    Json(state.spreads())
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        feeds: state.feed_status.all(),
        stored_prices: state.store.len(),
        stats: state.stats.summary(),
        latest: state.latest(),
    })
}

/// Serve the API on an already bound listener until shutdown.
pub fn serve(
    listener: TcpListener,
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let app = create_router(state);
    tokio::spawn(async move {
        let graceful = async move { wait_for_shutdown(&mut shutdown).await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .await
        {
            error!("API server error: {}", e);
        }
    })
}

pub async fn start_api_server(
    state: SharedState,
    port: u16,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<JoinHandle<()>> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("API server listening on http://0.0.0.0:{}", port);
    Ok(serve(listener, state, shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::create_state;
    use arbitrage_core::{PriceUpdate, Token};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    async fn spawn_api(state: SharedState) -> (String, watch::Sender<bool>, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = watch::channel(false);
        let handle = serve(listener, state, rx);
        (base, tx, handle)
    }

    fn seeded_state() -> SharedState {
        let state = create_state(AppConfig::default());
        for (exchange, price) in [(Exchange::Binance, 60000.0), (Exchange::Coinbase, 60300.0)] {
            state
                .store
                .apply(PriceUpdate::new(exchange, Token::new("BTC"), price))
                .unwrap();
        }
        state
    }

    #[tokio::test]
    async fn test_health() {
        let (base, _tx, _handle) = spawn_api(create_state(AppConfig::default())).await;
        let body = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_prices_and_arbitrage() {
        let state = seeded_state();
        let (base, _tx, _handle) = spawn_api(state.clone()).await;

        let prices: Value = reqwest::get(format!("{}/prices", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(prices["binance"]["BTC"]["price"], 60000.0);
        assert_eq!(prices["coinbase"]["BTC"]["price"], 60300.0);

        let body: Value = reqwest::get(format!("{}/arbitrage", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"cycle": null, "profit_pct": null}));
        assert!(!state.latest().is_found());
        assert_eq!(state.stats.summary().scans, 1);
        assert_eq!(state.stats.summary().cycles_found, 0);
    }

    #[tokio::test]
    async fn test_empty_state_reports_no_cycle() {
        let (base, _tx, _handle) = spawn_api(create_state(AppConfig::default())).await;

        let body: Value = reqwest::get(format!("{}/arbitrage", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"cycle": null, "profit_pct": null}));

        let spreads: Vec<Spread> = reqwest::get(format!("{}/spreads", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(spreads.is_empty());
    }

    #[tokio::test]
    async fn test_status() {
        let state = seeded_state();
        state.feed_status.set(Exchange::Kraken, ConnectionState::Reconnecting);
        let (base, _tx, _handle) = spawn_api(state).await;

        let status: Value = reqwest::get(format!("{}/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["feeds"]["kraken"], "reconnecting");
        assert_eq!(status["stored_prices"], 2);
        assert_eq!(status["stats"]["scans"], 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_server() {
        let (_base, tx, handle) = spawn_api(create_state(AppConfig::default())).await;
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
