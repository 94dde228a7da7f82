//! Polling Collector: REST ticker snapshots across exchanges.
//!
//! One task per exchange, each bounded by a deadline. Within an exchange the
//! tokens are resolved one after another, trying each candidate quote in
//! priority order until a market answers. Every request has its own timeout,
//! and prices resolved before the deadline are kept.

use crate::adapter::{adapter_for, ExchangeAdapter};
use crate::{wait_for_shutdown, FeedError, PriceStore};
use arbitrage_core::{now_ms, validate_price, Exchange, QuoteCurrency, Token};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

/// Prices from one polling cycle: exchange -> token -> price.
pub type PollResult = HashMap<Exchange, HashMap<Token, f64>>;

/// Configuration for the Polling Collector.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub exchanges: Vec<Exchange>,
    pub tokens: Vec<Token>,
    /// Quote currencies tried in order for every token.
    pub candidate_quotes: Vec<QuoteCurrency>,
    /// Timeout for a single ticker request.
    pub request_timeout: Duration,
    /// Budget for one exchange's whole fetch.
    pub exchange_timeout: Duration,
    /// Pause between polling cycles.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            exchanges: Exchange::all().to_vec(),
            tokens: Token::defaults(),
            candidate_quotes: QuoteCurrency::default_candidates(),
            request_timeout: Duration::from_secs(10),
            exchange_timeout: Duration::from_secs(30),
            interval: Duration::from_secs(60),
        }
    }
}

/// Exchange market symbols to try for a token, in priority order.
/// A token is never quoted against itself.
pub fn candidate_markets(
    adapter: &dyn ExchangeAdapter,
    token: &Token,
    quotes: &[QuoteCurrency],
) -> Vec<String> {
    quotes
        .iter()
        .filter(|quote| quote.as_str() != token.as_str())
        .map(|quote| adapter.rest_market(token.as_str(), *quote))
        .collect()
}

/// REST ticker poller.
pub struct PollingCollector {
    config: PollerConfig,
    client: reqwest::Client,
    endpoints: HashMap<Exchange, Url>,
}

impl PollingCollector {
    pub fn new(config: PollerConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            endpoints: HashMap::new(),
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Send an exchange's REST requests to another host, keeping path and query.
    pub fn with_endpoint(mut self, exchange: Exchange, base: &str) -> Result<Self, FeedError> {
        self.endpoints.insert(exchange, Url::parse(base)?);
        Ok(self)
    }

    /// Fetch the latest price of every configured token from every configured
    /// exchange. Exchanges that fail or resolve nothing are omitted; an
    /// exchange that runs out of time keeps the prices it already resolved.
    pub async fn fetch_prices(&self) -> PollResult {
        let handles: Vec<_> = self
            .config
            .exchanges
            .iter()
            .map(|&exchange| {
                let client = self.client.clone();
                let tokens = self.config.tokens.clone();
                let quotes = self.config.candidate_quotes.clone();
                let endpoint = self.endpoints.get(&exchange).cloned();
                let deadline = Instant::now() + self.config.exchange_timeout;

                let handle = tokio::spawn(async move {
                    let adapter = adapter_for(exchange);
                    fetch_exchange(
                        &client,
                        adapter.as_ref(),
                        endpoint.as_ref(),
                        &tokens,
                        &quotes,
                        deadline,
                    )
                    .await
                });
                (exchange, handle)
            })
            .collect();

        let (exchanges, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut prices = PollResult::new();
        for (exchange, result) in exchanges.into_iter().zip(results) {
            match result {
                Ok(tokens) if !tokens.is_empty() => {
                    debug!("{}: Polled {} prices", exchange, tokens.len());
                    prices.insert(exchange, tokens);
                }
                Ok(_) => debug!("{}: No prices resolved", exchange),
                Err(e) => error!("{}: Polling task failed: {}", exchange, e),
            }
        }
        prices
    }

    /// Run one polling cycle and write the results into the store.
    pub async fn poll_once(&self, store: &PriceStore) -> usize {
        let prices = self.fetch_prices().await;
        store.apply_poll(&prices, now_ms())
    }

    /// Poll on a fixed interval until shutdown.
    pub async fn run(&self, store: Arc<PriceStore>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stored = self.poll_once(&store).await;
                    info!("Polling cycle stored {} prices", stored);
                }
                _ = wait_for_shutdown(&mut shutdown) => {
                    debug!("Polling collector stopping");
                    return;
                }
            }
        }
    }
}

async fn fetch_exchange(
    client: &reqwest::Client,
    adapter: &dyn ExchangeAdapter,
    endpoint: Option<&Url>,
    tokens: &[Token],
    quotes: &[QuoteCurrency],
    deadline: Instant,
) -> HashMap<Token, f64> {
    let exchange = adapter.exchange();
    let mut prices = HashMap::new();

    for token in tokens {
        for market in candidate_markets(adapter, token, quotes) {
            let fetch = fetch_ticker(client, adapter, endpoint, &market);
            let Ok(result) = tokio::time::timeout_at(deadline, fetch).await else {
                warn!(
                    "{}: Polling budget spent at {}, keeping {} prices",
                    exchange,
                    market,
                    prices.len()
                );
                return prices;
            };
            match result {
                Ok(price) => {
                    match validate_price(price) {
                        Ok(price) => {
                            prices.insert(token.clone(), price);
                        }
                        Err(e) => debug!("{}: Ignoring {} price: {}", exchange, market, e),
                    }
                    break;
                }
                Err(FeedError::MarketUnavailable { .. }) => {
                    debug!("{}: No market {}, trying next quote", exchange, market);
                }
                Err(e) => {
                    warn!("{}: Failed to fetch {}: {}", exchange, market, e);
                    break;
                }
            }
        }
    }

    prices
}

async fn fetch_ticker(
    client: &reqwest::Client,
    adapter: &dyn ExchangeAdapter,
    endpoint: Option<&Url>,
    market: &str,
) -> Result<f64, FeedError> {
    let url = ticker_url(adapter.rest_ticker_url(market), endpoint)?;
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::NOT_FOUND {
        return Err(FeedError::MarketUnavailable {
            exchange: adapter.exchange(),
            market: market.to_string(),
        });
    }
    if !status.is_success() {
        return Err(FeedError::Http {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    adapter.parse_rest_ticker(market, &body)
}

fn ticker_url(raw: String, endpoint: Option<&Url>) -> Result<Url, FeedError> {
    let mut url = Url::parse(&raw)?;
    if let Some(base) = endpoint {
        let redirect_failed = || FeedError::ConnectionFailed(format!("cannot redirect {} to {}", raw, base));
        url.set_scheme(base.scheme()).map_err(|_| redirect_failed())?;
        url.set_host(base.host_str())?;
        url.set_port(base.port()).map_err(|_| redirect_failed())?;
    }
    Ok(url)
}
