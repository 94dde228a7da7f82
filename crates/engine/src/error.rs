//! Error types for the detection engine.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A cycle refers to an edge the graph does not contain.
    #[error("no edge {from} -> {to} in graph")]
    MissingEdge { from: String, to: String },

    /// A cycle needs at least one edge.
    #[error("cycle has {0} vertices, need at least 2")]
    DegenerateCycle(usize),
}
