//! Price collection from exchanges.
//!
//! This crate streams live prices over WebSocket, polls REST tickers, and
//! keeps the latest price per (exchange, token) in a shared store.
//!
//! ## Architecture
//!
//! - `adapter/` - Exchange-specific symbols, wire formats, and REST tickers
//! - `websocket` - Reconnecting WebSocket client emitting `WsMessage`
//! - `runner` - Applies parsed tickers to the `PriceStore`
//! - `manager` - Feed configuration, connection status, task spawning
//! - `rest` - Polling Collector
//! - `store` - Concurrency-safe latest-price store

pub mod adapter;
pub mod error;
pub mod manager;
pub mod rest;
pub mod runner;
pub mod store;
pub mod websocket;

pub use adapter::{
    adapter_for, stream_markets, AdapterMessage, BinanceAdapter, BitfinexAdapter,
    CoinbaseAdapter, ExchangeAdapter, KrakenAdapter, OkxAdapter,
};
pub use error::*;
pub use manager::*;
pub use rest::*;
pub use runner::*;
pub use store::*;
pub use websocket::*;
