//! The Compiler's output: a validated, handler-bound execution plan.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use kestrel_core::{NodeId, WorkflowId};
use kestrel_node::NodeHandler;

use crate::error::CompilationError;

/// One node's handler binding and effective per-node policy, as resolved
/// by the Compiler.
#[derive(Clone)]
pub struct BoundNode {
    /// The node's identifier.
    pub node_id: NodeId,
    /// The resolved handler capability.
    pub handler: Arc<dyn NodeHandler>,
    /// Effective per-attempt timeout: `node.config.timeout_ms ?? workflow.default_timeout_ms ?? SYSTEM_DEFAULT`.
    pub effective_timeout_ms: u64,
    /// Effective retry count, resolved the same way.
    pub effective_max_retries: u32,
    /// Effective cap on this node's own loop iterations:
    /// `node.config.max_loop_count ?? SYSTEM_MAX_LOOPS`. Only meaningful for
    /// a loop-declaring node; the Graph Runner forces its `done` handle once
    /// its iteration count reaches this value, independent of the global
    /// `SYSTEM_MAX_LOOPS` ceiling it also enforces.
    pub max_loop_count: u64,
    /// `true` if this node is part of a legal cycle (exempt from plain
    /// acyclicity expectations downstream).
    pub is_loop_carrying: bool,
}

impl fmt::Debug for BoundNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundNode")
            .field("node_id", &self.node_id)
            .field("handler", &"<dyn NodeHandler>")
            .field("effective_timeout_ms", &self.effective_timeout_ms)
            .field("effective_max_retries", &self.effective_max_retries)
            .field("max_loop_count", &self.max_loop_count)
            .field("is_loop_carrying", &self.is_loop_carrying)
            .finish()
    }
}

/// A validated, handler-bound plan ready to drive an execution.
///
/// Reusable across any number of executions of the same workflow version —
/// it carries no execution-specific state.
#[derive(Clone)]
pub struct ExecutionPlan {
    /// The workflow this plan was compiled from.
    pub workflow_id: WorkflowId,
    /// Deterministic dispatch order over the loop-condensed DAG.
    pub topological_order: Vec<NodeId>,
    /// Nodes with no incoming edges.
    pub entry_nodes: Vec<NodeId>,
    /// Nodes with no outgoing edges.
    pub exit_nodes: Vec<NodeId>,
    /// Adjacency indexed by `(source_node_id, output_handle)`, so "given
    /// node N just finished with handle H, return its next nodes" is
    /// O(outgoing(N)).
    adjacency: HashMap<(NodeId, String), Vec<NodeId>>,
    /// Per-node handler binding and effective policy.
    nodes: HashMap<NodeId, BoundNode>,
    /// Node ids participating in a legal loop cycle.
    pub loop_carrying_node_ids: BTreeSet<NodeId>,
}

impl fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("workflow_id", &self.workflow_id)
            .field("topological_order", &self.topological_order)
            .field("entry_nodes", &self.entry_nodes)
            .field("exit_nodes", &self.exit_nodes)
            .field("adjacency", &self.adjacency)
            .field("nodes", &self.nodes)
            .field("loop_carrying_node_ids", &self.loop_carrying_node_ids)
            .finish()
    }
}

impl ExecutionPlan {
    /// Assemble a plan from its already-validated constituents.
    pub(crate) fn new(
        workflow_id: WorkflowId,
        topological_order: Vec<NodeId>,
        entry_nodes: Vec<NodeId>,
        exit_nodes: Vec<NodeId>,
        adjacency: HashMap<(NodeId, String), Vec<NodeId>>,
        nodes: HashMap<NodeId, BoundNode>,
        loop_carrying_node_ids: BTreeSet<NodeId>,
    ) -> Self {
        Self {
            workflow_id,
            topological_order,
            entry_nodes,
            exit_nodes,
            adjacency,
            nodes,
            loop_carrying_node_ids,
        }
    }

    /// The bound node for `node_id`.
    pub fn node(&self, node_id: NodeId) -> Result<&BoundNode, CompilationError> {
        self.nodes
            .get(&node_id)
            .ok_or(CompilationError::NodeNotFound(node_id))
    }

    /// The next nodes reachable from `node_id` via `handle`.
    #[must_use]
    pub fn next_nodes(&self, node_id: NodeId, handle: &str) -> &[NodeId] {
        self.adjacency
            .get(&(node_id, handle.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of nodes in the plan.
    #[must_use]
    pub fn total_nodes(&self) -> usize {
        self.topological_order.len()
    }
}
