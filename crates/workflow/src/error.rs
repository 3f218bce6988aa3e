//! Errors surfaced by graph construction and analysis.

use kestrel_core::{EdgeId, NodeId};
use thiserror::Error;

/// Failures produced while building or analyzing a [`crate::graph::DependencyGraph`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Two nodes share the same `node_id`.
    #[error("duplicate node id {0}")]
    DuplicateNodeId(NodeId),

    /// An edge references a node id that isn't in the workflow.
    #[error("edge {edge_id} references unknown node {node_id}")]
    DanglingEdge {
        /// The offending edge.
        edge_id: EdgeId,
        /// The node id it points at.
        node_id: NodeId,
    },

    /// The workflow has no nodes.
    #[error("workflow has no nodes")]
    EmptyWorkflow,

    /// Topological ordering was requested over a condensation that still
    /// contains an illegal cycle (a caller bug — the compiler must reject
    /// illegal cycles before calling `topological_order`).
    #[error("graph still contains an unresolved cycle touching node {0}")]
    UnresolvedCycle(NodeId),
}
