//! The externally-visible snapshot of one execution's control state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kestrel_core::{ExecutionId, HitlRequestId, NodeId, UserId, WorkflowId};
use kestrel_execution::ExecutionStatus;
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of one execution's control-plane state.
///
/// This is distinct from [`kestrel_execution::ExecutionState`]: that type
/// is the Graph Runner's internal per-node bookkeeping; this is what
/// `status` and the other control operations hand back to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// This execution's identifier.
    pub execution_id: ExecutionId,
    /// The workflow being run.
    pub workflow_id: WorkflowId,
    /// The user who started this execution.
    pub user_id: UserId,
    /// Current control-plane status.
    pub state: ExecutionStatus,
    /// The node currently dispatched, if any.
    pub current_node: Option<NodeId>,
    /// Fraction of reachable nodes completed, in `[0.0, 1.0]`.
    pub progress: f64,
    /// When the execution was created.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// The HITL request this execution is currently blocked on, if any.
    pub pending_hitl: Option<HitlRequestId>,
    /// Loop iteration counters, keyed by the loop-carrying node id.
    pub loop_counters: HashMap<NodeId, u64>,
    /// The terminal error message, if `state` is `Failed`.
    pub error: Option<String>,
    /// The parent execution, if this is a sub-workflow execution.
    pub parent_execution_id: Option<ExecutionId>,
    /// Sub-workflow nesting depth; `0` for a top-level execution.
    pub nesting_depth: u32,
}

impl ExecutionHandle {
    /// Construct a freshly created, `Pending` handle.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        user_id: UserId,
        parent_execution_id: Option<ExecutionId>,
        nesting_depth: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            user_id,
            state: ExecutionStatus::Pending,
            current_node: None,
            progress: 0.0,
            started_at: now,
            completed_at: None,
            pending_hitl: None,
            loop_counters: HashMap::new(),
            error: None,
            parent_execution_id,
            nesting_depth,
        }
    }
}
