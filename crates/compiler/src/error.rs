//! Compilation error and warning types.

use kestrel_core::NodeId;
use kestrel_workflow::WorkflowError;
use thiserror::Error;

/// A fatal error that stops compilation before an [`crate::ExecutionPlan`] is produced.
#[derive(Debug, Error)]
pub enum CompilationError {
    /// The workflow's graph structure is invalid (duplicate id, dangling edge, empty).
    #[error("structural: {0}")]
    Structural(#[from] WorkflowError),

    /// A node's `type_tag` does not resolve against the registry.
    #[error("unknown node type {type_tag} on node {node_id}")]
    UnknownNodeType {
        /// The offending node.
        node_id: NodeId,
        /// The unresolved type tag.
        type_tag: String,
    },

    /// A strongly connected component of size greater than one contains no
    /// loop-carrying node type.
    #[error("illegal cycle through nodes {node_ids:?}: no loop-carrying node type in the cycle")]
    CycleError {
        /// The node ids forming the illegal cycle.
        node_ids: Vec<NodeId>,
    },

    /// `workflow.settings.strict_orphans` is set and unreachable nodes exist.
    #[error("orphan nodes unreachable from any entry point: {node_ids:?}")]
    OrphanError {
        /// The unreachable node ids.
        node_ids: Vec<NodeId>,
    },

    /// A node's credential reference could not be bound.
    #[error("credential error on node {node_id}: {reason}")]
    CredentialError {
        /// The offending node.
        node_id: NodeId,
        /// Why binding failed.
        reason: String,
    },

    /// A node's `config` does not satisfy its handler's declared fields.
    #[error("config error on node {node_id}, field {field}: {reason}")]
    ConfigError {
        /// The offending node.
        node_id: NodeId,
        /// The offending field name.
        field: String,
        /// Why the field failed validation.
        reason: String,
    },

    /// A node id was looked up in a plan that does not contain it.
    #[error("node not found in plan: {0}")]
    NodeNotFound(NodeId),
}

/// A non-fatal issue surfaced alongside a successfully produced plan.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilationWarning {
    /// Nodes unreachable from any entry point, when not running in strict mode.
    OrphanNodes(Vec<NodeId>),
    /// An upstream node's declared output and a downstream node's declared
    /// input look incompatible, but neither side declares a concrete enough
    /// schema to reject outright.
    TypeMismatch {
        /// The upstream node.
        source_node_id: NodeId,
        /// The downstream node.
        target_node_id: NodeId,
        /// Human-readable description of the mismatch.
        reason: String,
    },
}
