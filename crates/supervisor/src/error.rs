//! Control-layer errors, and the aggregate [`KernelError`] the Supervisor's
//! public operations return.

use kestrel_core::{ExecutionId, HitlRequestId};
use thiserror::Error;

/// Errors raised by the Supervisor's own control operations, as opposed to
/// compilation or node-execution errors.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No execution or HITL request exists with the given id.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity looked up (`"execution"` or `"hitl request"`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The caller does not own the execution or request it addressed.
    #[error("user is not authorized for this operation")]
    NotAuthorized,

    /// The execution has already reached a terminal state.
    #[error("execution {0} has already reached a terminal state")]
    AlreadyTerminal(ExecutionId),

    /// The execution is already waiting on a HITL request.
    #[error("execution {0} is already waiting on a human response")]
    AlreadyPending(ExecutionId),

    /// The HITL request has already been responded to, timed out, or
    /// been cancelled.
    #[error("hitl request {0} is not pending")]
    NotPending(HitlRequestId),

    /// A HITL request's timeout elapsed before a response arrived.
    #[error("hitl request {0} timed out")]
    TimedOut(HitlRequestId),

    /// Starting a sub-workflow would exceed `workflow.max_nesting_depth`.
    #[error("sub-workflow nesting depth {depth} exceeds the limit of {limit}")]
    NestingDepthExceeded {
        /// The depth the new child execution would be created at.
        depth: u32,
        /// The configured limit.
        limit: u32,
    },

    /// A sub-workflow's `workflow_id` already appears in its own ancestor
    /// chain.
    #[error("workflow {0} already appears in its own sub-workflow ancestor chain")]
    SubworkflowCycle(kestrel_core::WorkflowId),
}

/// Every error surface the Supervisor's public API can return, composing
/// each sub-crate's own error type.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A workflow failed compilation.
    #[error(transparent)]
    Compilation(#[from] kestrel_compiler::CompilationError),

    /// The Graph Runner failed while driving an execution.
    #[error(transparent)]
    Engine(#[from] kestrel_engine::EngineError),

    /// A control operation was rejected.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// A credential could not be resolved through the configured port.
    #[error(transparent)]
    Ports(#[from] kestrel_ports::PortsError),
}
