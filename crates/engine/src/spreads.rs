//! Cross-exchange spread scan.

use arbitrage_core::{Exchange, PriceSnapshot, Spread};

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// For every token quoted on two or more exchanges, pair the cheapest and the
/// dearest quote. A spread is reported when `sell > buy * (1 + fee_rate)`.
/// Results are sorted by token; equal prices resolve to the first exchange.
pub fn find_spreads(snapshot: &PriceSnapshot, fee_rate: f64) -> Vec<Spread> {
    let mut spreads = Vec::new();

    for token in snapshot.tokens() {
        let quotes: Vec<(Exchange, f64)> = snapshot
            .exchanges()
            .filter_map(|exchange| snapshot.price(exchange, &token).map(|p| (exchange, p)))
            .collect();
        if quotes.len() < 2 {
            continue;
        }

        let mut buy = quotes[0];
        let mut sell = quotes[0];
        for &(exchange, price) in &quotes[1..] {
            if price < buy.1 {
                buy = (exchange, price);
            }
            if price > sell.1 {
                sell = (exchange, price);
            }
        }

        if sell.1 > buy.1 * (1.0 + fee_rate) {
            spreads.push(Spread {
                token,
                buy_exchange: buy.0,
                buy_price: buy.1,
                sell_exchange: sell.0,
                sell_price: sell.1,
                spread_pct: round4((sell.1 - buy.1) / buy.1 * 100.0),
            });
        }
    }

    spreads
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbitrage_core::Token;
    use pretty_assertions::assert_eq;

    fn snapshot(prices: Vec<(Exchange, &str, f64)>) -> PriceSnapshot {
        PriceSnapshot::from_prices(prices, 1)
    }

    #[test]
    fn test_reports_cheapest_and_dearest() {
        let snap = snapshot(vec![
            (Exchange::Binance, "BTC", 60000.0),
            (Exchange::Coinbase, "BTC", 60300.0),
            (Exchange::Kraken, "BTC", 60100.0),
        ]);
        assert_eq!(
            find_spreads(&snap, 0.0),
            vec![Spread {
                token: Token::new("BTC"),
                buy_exchange: Exchange::Binance,
                buy_price: 60000.0,
                sell_exchange: Exchange::Coinbase,
                sell_price: 60300.0,
                spread_pct: 0.5,
            }]
        );
    }

    #[test]
    fn test_fee_filters_thin_spreads() {
        let snap = snapshot(vec![
            (Exchange::Binance, "ETH", 3000.0),
            (Exchange::Okx, "ETH", 3003.0),
        ]);
        assert_eq!(find_spreads(&snap, 0.0005).len(), 1);
        assert!(find_spreads(&snap, 0.002).is_empty());
    }

    #[test]
    fn test_single_quote_and_equal_prices_are_skipped() {
        let snap = snapshot(vec![
            (Exchange::Binance, "SOL", 150.0),
            (Exchange::Binance, "DOT", 7.0),
            (Exchange::Kraken, "DOT", 7.0),
        ]);
        assert!(find_spreads(&snap, 0.0).is_empty());
    }

    #[test]
    fn test_sorted_by_token_and_rounded() {
        let snap = snapshot(vec![
            (Exchange::Binance, "SOL", 150.0),
            (Exchange::Kraken, "SOL", 151.0),
            (Exchange::Binance, "ADA", 0.3),
            (Exchange::Bitfinex, "ADA", 0.31),
        ]);
        let spreads = find_spreads(&snap, 0.0);
        let tokens: Vec<&str> = spreads.iter().map(|s| s.token.as_str()).collect();
        assert_eq!(tokens, vec!["ADA", "SOL"]);
        assert_eq!(spreads[0].spread_pct, 3.3333);
        assert_eq!(spreads[1].spread_pct, 0.6667);
    }
}
