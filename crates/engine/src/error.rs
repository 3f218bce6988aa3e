//! Graph Runner error types.

use kestrel_core::NodeId;
use thiserror::Error;

/// Errors the Graph Runner can raise while driving an execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A node referenced by the plan's adjacency has no binding.
    #[error("node not found in plan: {0}")]
    NodeNotFound(NodeId),

    /// A `config` template reference could not be resolved.
    #[error("template error: {0}")]
    Template(String),

    /// `SYSTEM_MAX_LOOPS` was exceeded for this execution.
    #[error("loop limit exceeded (max {max})")]
    LoopLimitExceeded {
        /// The hard ceiling that was exceeded.
        max: u64,
    },

    /// A hook returned `Abort`.
    #[error("aborted at node {node_id}: {reason}")]
    Aborted {
        /// The node being processed when the abort was issued.
        node_id: NodeId,
        /// Human-readable reason, if the hook gave one.
        reason: String,
    },

    /// The execution's cancellation token fired.
    #[error("execution cancelled")]
    Cancelled,

    /// A node failed and the error reached no `"error"` handle, or
    /// `error_policy` was `fail_fast`.
    #[error("node {node_id} failed: {message}")]
    NodeFailed {
        /// The node that failed.
        node_id: NodeId,
        /// The underlying error message.
        message: String,
    },

    /// Error from the compiler's `ExecutionPlan`.
    #[error("plan error: {0}")]
    Plan(#[from] kestrel_compiler::CompilationError),

    /// Error from the execution state/transition layer.
    #[error("execution state error: {0}")]
    Execution(#[from] kestrel_execution::ExecutionError),

    /// Error from the workflow structural layer (building the predecessor
    /// graph for routing).
    #[error("workflow error: {0}")]
    Workflow(#[from] kestrel_workflow::WorkflowError),
}
