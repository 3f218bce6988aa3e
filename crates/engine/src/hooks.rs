//! The Supervisor/Graph Runner hook contract.
//!
//! The runner never decides policy on its own — every suspension point and
//! every terminal-failure decision is delegated to a [`RunnerHooks`]
//! implementation owned by the Supervisor. A bare [`NoopHooks`] is provided
//! for tests and for callers that don't need pause/cancel/HITL semantics.

use async_trait::async_trait;
use kestrel_core::{ExecutionId, NodeId};
use kestrel_node::HandlerError;

use crate::outcome::NodeOutcome;

/// What the runner should do next, returned by every hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proceed as normal.
    Continue,
    /// Stop driving this execution immediately.
    Abort,
    /// Only meaningful from `on_error`: re-attempt the node from a fresh
    /// attempt budget instead of escalating the failure.
    Retry,
}

/// Hook points the Graph Runner calls into at well-defined points in the
/// driving algorithm. Implementations may block — each call is a
/// suspension point (the pause gate and the cancellation check live here).
#[async_trait]
pub trait RunnerHooks: Send + Sync {
    /// Called before a node is dispatched. Implementations should await
    /// any pause gate here, then check the cancellation flag.
    async fn before_node(&self, execution_id: ExecutionId, node_id: NodeId) -> Decision;

    /// Called after a node reaches a terminal per-attempt outcome
    /// (success, or exhausted retries routed through `"error"`).
    async fn after_node(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        outcome: &NodeOutcome,
    ) -> Decision;

    /// Called when a node's retries are exhausted without success.
    /// The default policy is [`Decision::Abort`]; implementations may
    /// consult `workflow.settings.error_policy` and/or a human.
    async fn on_error(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        error: &HandlerError,
    ) -> Decision;
}

/// A hook set that always continues and never pauses — useful for tests
/// and for embedding the runner without Supervisor-level control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl RunnerHooks for NoopHooks {
    async fn before_node(&self, _execution_id: ExecutionId, _node_id: NodeId) -> Decision {
        Decision::Continue
    }

    async fn after_node(
        &self,
        _execution_id: ExecutionId,
        _node_id: NodeId,
        _outcome: &NodeOutcome,
    ) -> Decision {
        Decision::Continue
    }

    async fn on_error(
        &self,
        _execution_id: ExecutionId,
        _node_id: NodeId,
        _error: &HandlerError,
    ) -> Decision {
        Decision::Abort
    }
}
