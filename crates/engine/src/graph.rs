//! Exchange-rate graph.
//!
//! Vertices are (token, exchange) pairs. An edge `t@e1 -> t@e2` carries the
//! weight `-ln(p2 / p1)`, so a cycle whose weights sum below zero compounds
//! to a rate product above one.

use arbitrage_core::{PriceSnapshot, Vertex};
use std::collections::HashMap;
use tracing::debug;

/// Index of a vertex in its graph.
pub type VertexId = usize;

/// Directed weighted edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    pub weight: f64,
}

/// Weight of converting at rate `to_price / from_price`.
#[inline]
pub fn edge_weight(from_price: f64, to_price: f64) -> f64 {
    -(to_price / from_price).ln()
}

/// Directed graph with vertices and edges kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeGraph {
    vertices: Vec<Vertex>,
    vertex_ids: HashMap<Vertex, VertexId>,
    edges: Vec<Edge>,
    edge_ids: HashMap<(VertexId, VertexId), usize>,
}

impl ExchangeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `vertex`, inserting it on first use.
    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        if let Some(&id) = self.vertex_ids.get(&vertex) {
            return id;
        }
        let id = self.vertices.len();
        self.vertex_ids.insert(vertex.clone(), id);
        self.vertices.push(vertex);
        id
    }

    /// Add a directed edge, or replace the weight of an existing one.
    /// Self-loops are refused and return false.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId, weight: f64) -> bool {
        if from == to || from >= self.vertices.len() || to >= self.vertices.len() {
            return false;
        }
        match self.edge_ids.get(&(from, to)) {
            Some(&idx) => self.edges[idx].weight = weight,
            None => {
                self.edge_ids.insert((from, to), self.edges.len());
                self.edges.push(Edge { from, to, weight });
            }
        }
        true
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn vertex_id(&self, vertex: &Vertex) -> Option<VertexId> {
        self.vertex_ids.get(vertex).copied()
    }

    /// Weight of the edge `from -> to`, if present.
    pub fn weight(&self, from: VertexId, to: VertexId) -> Option<f64> {
        self.edge_ids.get(&(from, to)).map(|&idx| self.edges[idx].weight)
    }

    /// Weight of the edge between two labelled vertices, if present.
    pub fn weight_between(&self, from: &Vertex, to: &Vertex) -> Option<f64> {
        self.weight(self.vertex_id(from)?, self.vertex_id(to)?)
    }

    /// Label used in logs and errors; unknown ids render as `#id`.
    pub fn label(&self, id: VertexId) -> String {
        self.vertex(id)
            .map(Vertex::to_string)
            .unwrap_or_else(|| format!("#{}", id))
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Builds the same-token cross-exchange graph from a price snapshot.
pub struct GraphBuilder;

impl GraphBuilder {
    /// For every unordered exchange pair and every token both quote, add the
    /// two reciprocal edges. Returns an empty graph when fewer than two
    /// vertices result.
    pub fn build(snapshot: &PriceSnapshot) -> ExchangeGraph {
        let mut graph = ExchangeGraph::new();
        let exchanges: Vec<_> = snapshot.exchanges().collect();

        for (i, &first) in exchanges.iter().enumerate() {
            let Some(first_prices) = snapshot.prices_for(first) else {
                continue;
            };
            for &second in &exchanges[i + 1..] {
                for (token, first_entry) in first_prices {
                    let Some(second_entry) = snapshot.get(second, token) else {
                        continue;
                    };
                    let (p1, p2) = (first_entry.price, second_entry.price);
                    if !(p1 > 0.0 && p2 > 0.0 && p1.is_finite() && p2.is_finite()) {
                        continue;
                    }

                    let u = graph.add_vertex(Vertex::new(token.clone(), first));
                    let v = graph.add_vertex(Vertex::new(token.clone(), second));
                    graph.add_edge(u, v, edge_weight(p1, p2));
                    graph.add_edge(v, u, edge_weight(p2, p1));
                }
            }
        }

        if graph.vertex_count() < 2 {
            return ExchangeGraph::new();
        }

        debug!(
            "Built graph with {} vertices and {} edges",
            graph.vertex_count(),
            graph.edge_count()
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbitrage_core::{Exchange, Token};
    use pretty_assertions::assert_eq;

    fn vertex(label: &str) -> Vertex {
        label.parse().unwrap()
    }

    #[test]
    fn test_edge_weight_sign() {
        assert!(edge_weight(100.0, 101.0) < 0.0);
        assert!(edge_weight(101.0, 100.0) > 0.0);
        assert_eq!(edge_weight(5.0, 5.0), 0.0);
    }

    #[test]
    fn test_add_vertex_is_idempotent() {
        let mut graph = ExchangeGraph::new();
        let a = graph.add_vertex(vertex("BTC@binance"));
        let b = graph.add_vertex(vertex("BTC@kraken"));
        assert_eq!(graph.add_vertex(vertex("BTC@binance")), a);
        assert_eq!((a, b), (0, 1));
        assert_eq!(graph.vertex_count(), 2);
    }

    #[test]
    fn test_add_edge_refuses_self_loops_and_unknown_ids() {
        let mut graph = ExchangeGraph::new();
        let a = graph.add_vertex(vertex("ETH@okx"));
        assert!(!graph.add_edge(a, a, -1.0));
        assert!(!graph.add_edge(a, 7, -1.0));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_add_edge_replaces_weight_in_place() {
        let mut graph = ExchangeGraph::new();
        let a = graph.add_vertex(vertex("ETH@okx"));
        let b = graph.add_vertex(vertex("ETH@kraken"));
        graph.add_edge(a, b, 0.5);
        graph.add_edge(b, a, -0.5);
        graph.add_edge(a, b, 0.25);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edges()[0], Edge { from: a, to: b, weight: 0.25 });
        assert_eq!(graph.weight(a, b), Some(0.25));
        assert_eq!(graph.weight_between(&vertex("ETH@kraken"), &vertex("ETH@okx")), Some(-0.5));
    }

    #[test]
    fn test_build_skips_tokens_on_one_exchange() {
        let snapshot = PriceSnapshot::from_prices(
            vec![
                (Exchange::Binance, "BTC", 60000.0),
                (Exchange::Binance, "SOL", 150.0),
                (Exchange::Kraken, "BTC", 60100.0),
            ],
            1,
        );
        let graph = GraphBuilder::build(&snapshot);

        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph
            .vertices()
            .iter()
            .all(|v| v.token == Token::new("BTC")));
    }

    #[test]
    fn test_build_orders_vertices_by_exchange_pair() {
        let snapshot = PriceSnapshot::from_prices(
            vec![
                (Exchange::Kraken, "ETH", 3001.0),
                (Exchange::Coinbase, "ETH", 3002.0),
                (Exchange::Binance, "ETH", 3000.0),
            ],
            1,
        );
        let graph = GraphBuilder::build(&snapshot);
        let labels: Vec<String> = graph.vertices().iter().map(Vertex::to_string).collect();

        assert_eq!(labels, vec!["ETH@binance", "ETH@coinbase", "ETH@kraken"]);
        // Three exchange pairs, two edges each.
        assert_eq!(graph.edge_count(), 6);
    }
}
