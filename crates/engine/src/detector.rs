//! Bellman-Ford negative-cycle detection.
//!
//! A virtual source with zero-weight edges to every vertex makes every
//! negative cycle reachable regardless of graph connectivity.

use crate::{ExchangeGraph, VertexId};
use arbitrage_core::Vertex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error};

/// Configuration for the cycle detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// A relaxation must improve a distance by more than this to count.
    /// Keeps floating-point noise on reciprocal edges from looking like profit.
    pub tolerance: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { tolerance: 1e-9 }
    }
}

/// Closed walk through the graph; the first and last vertex are the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    vertices: Vec<VertexId>,
}

impl Cycle {
    pub fn new(vertices: Vec<VertexId>) -> Self {
        Self { vertices }
    }

    pub fn ids(&self) -> &[VertexId] {
        &self.vertices
    }

    /// Number of edges in the cycle.
    pub fn len(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve ids to labelled vertices. Ids not in `graph` are skipped.
    pub fn to_vertices(&self, graph: &ExchangeGraph) -> Vec<Vertex> {
        self.vertices
            .iter()
            .filter_map(|&id| graph.vertex(id).cloned())
            .collect()
    }
}

/// Negative-cycle finder.
#[derive(Debug, Clone, Default)]
pub struct CycleDetector {
    config: DetectorConfig,
}

impl CycleDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Find one negative cycle, or `None` when there is no arbitrage.
    ///
    /// Edges are relaxed in insertion order, so an unchanged graph always
    /// yields the same cycle: the first one reached in edge-scan order.
    pub fn detect(&self, graph: &ExchangeGraph) -> Option<Cycle> {
        let n = graph.vertex_count();
        if n < 2 || graph.edge_count() == 0 {
            return None;
        }

        let source = n;
        let total = n + 1;
        let tolerance = self.config.tolerance;

        let mut dist = vec![f64::INFINITY; total];
        let mut pred: Vec<Option<VertexId>> = vec![None; total];
        dist[source] = 0.0;

        let virtual_edges = (0..n).map(|v| (source, v, 0.0));
        let real_edges = graph.edges().iter().map(|e| (e.from, e.to, e.weight));
        let all_edges: Vec<(VertexId, VertexId, f64)> = virtual_edges.chain(real_edges).collect();

        let mut passes = 0;
        for _ in 0..total {
            passes += 1;
            let mut updated = false;
            for &(u, v, w) in &all_edges {
                if dist[u].is_finite() && dist[u] + w < dist[v] - tolerance {
                    dist[v] = dist[u] + w;
                    pred[v] = Some(u);
                    updated = true;
                }
            }
            if !updated {
                break;
            }
        }
        debug!("Bellman-Ford settled after {} of {} passes", passes, total);

        for edge in graph.edges() {
            let (u, v, w) = (edge.from, edge.to, edge.weight);
            if dist[u] + w < dist[v] - tolerance {
                pred[v] = Some(u);
                return self.reconstruct(graph, &pred, v, total);
            }
        }

        None
    }

    /// Walk predecessors from `start` into the cycle and collect it.
    /// Every walk is bounded by `steps`; a chain that breaks or never closes
    /// is reported and yields `None`.
    fn reconstruct(
        &self,
        graph: &ExchangeGraph,
        pred: &[Option<VertexId>],
        start: VertexId,
        steps: usize,
    ) -> Option<Cycle> {
        let source = steps - 1;
        let step_back = |x: VertexId| pred[x].filter(|&p| p != source);

        let mut anchor = start;
        for _ in 0..steps {
            match step_back(anchor) {
                Some(p) => anchor = p,
                None => {
                    error!(
                        "Predecessor chain from {} ended at {} before reaching a cycle",
                        graph.label(start),
                        graph.label(anchor)
                    );
                    return None;
                }
            }
        }

        let mut cycle = vec![anchor];
        let mut seen = HashSet::from([anchor]);
        let mut current = anchor;
        for _ in 0..steps {
            let Some(p) = step_back(current) else {
                break;
            };
            if p == anchor {
                cycle.push(anchor);
                cycle.reverse();
                return Some(Cycle::new(cycle));
            }
            if !seen.insert(p) {
                break;
            }
            cycle.push(p);
            current = p;
        }

        error!(
            "Predecessor chain from {} did not close within {} steps",
            graph.label(anchor),
            steps
        );
        None
    }
}
