//! Profit of a detected cycle.

use crate::{Cycle, EngineError, ExchangeGraph};

/// Percentage gained by pushing one unit around `cycle`.
///
/// Rates are recovered from the stored edge weights (`exp(-w)`), never from
/// current prices, so the figure matches the graph the cycle was found in.
pub fn profit_pct(graph: &ExchangeGraph, cycle: &Cycle) -> Result<f64, EngineError> {
    let ids = cycle.ids();
    if ids.len() < 2 {
        return Err(EngineError::DegenerateCycle(ids.len()));
    }

    let mut amount = 1.0;
    for pair in ids.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let weight = graph.weight(from, to).ok_or_else(|| EngineError::MissingEdge {
            from: graph.label(from),
            to: graph.label(to),
        })?;
        amount *= (-weight).exp();
    }

    Ok((amount - 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbitrage_core::Vertex;
    use pretty_assertions::assert_eq;

    fn triangle() -> ExchangeGraph {
        let mut graph = ExchangeGraph::new();
        let ids: Vec<_> = ["BTC@binance", "BTC@kraken", "BTC@okx"]
            .iter()
            .map(|label| graph.add_vertex(label.parse::<Vertex>().unwrap()))
            .collect();
        graph.add_edge(ids[0], ids[1], -0.10);
        graph.add_edge(ids[1], ids[2], 0.05);
        graph.add_edge(ids[2], ids[0], 0.0);
        graph
    }

    #[test]
    fn test_profit_compounds_edge_rates() {
        let graph = triangle();
        let pct = profit_pct(&graph, &Cycle::new(vec![0, 1, 2, 0])).unwrap();
        let expected = (0.05f64.exp() - 1.0) * 100.0;
        assert!((pct - expected).abs() < 1e-9, "{} vs {}", pct, expected);
        assert!(pct > 5.12 && pct < 5.13);
    }

    #[test]
    fn test_missing_edge_is_error() {
        let graph = triangle();
        assert_eq!(
            profit_pct(&graph, &Cycle::new(vec![0, 2, 0])),
            Err(EngineError::MissingEdge {
                from: "BTC@binance".into(),
                to: "BTC@okx".into(),
            })
        );
    }

    #[test]
    fn test_degenerate_cycle_is_error() {
        let graph = triangle();
        assert_eq!(
            profit_pct(&graph, &Cycle::new(vec![0])),
            Err(EngineError::DegenerateCycle(1))
        );
    }
}
