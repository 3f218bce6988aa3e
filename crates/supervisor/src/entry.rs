//! Per-execution control state tracked by the Supervisor while an
//! execution is active.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use kestrel_core::{NodeId, WorkflowId};
use kestrel_workflow::ErrorPolicy;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::handle::ExecutionHandle;
use crate::hitl::PendingHitl;
use crate::pause::PauseGate;

/// Everything the Supervisor needs to control one active execution, shared
/// between the control-operation API and the spawned runner task via hooks.
pub struct ExecutionEntry {
    /// The externally-visible control-plane snapshot.
    pub handle: RwLock<ExecutionHandle>,
    /// Cooperative pause gate consulted by `before_node`.
    pub pause: PauseGate,
    /// Cancellation token shared with this execution's [`kestrel_execution::ExecutionContext`].
    pub cancellation: CancellationToken,
    /// The currently outstanding HITL request, if any.
    pub hitl: RwLock<Option<PendingHitl>>,
    /// Loop iteration counters, keyed by `(node id, output handle)`, for
    /// external visibility. [`kestrel_engine::GraphRunner`] enforces
    /// `SYSTEM_MAX_LOOPS` and each node's own `max_loop_count` itself; this
    /// is reporting only.
    pub loop_counters: DashMap<(NodeId, String), u64>,
    /// This execution's partial-failure policy, consulted by `on_error`.
    pub error_policy: ErrorPolicy,
    /// Ancestor workflow ids, innermost first, for sub-workflow cycle
    /// detection. Empty for a top-level execution.
    pub ancestor_workflow_ids: Vec<WorkflowId>,
}

impl ExecutionEntry {
    /// Construct a fresh entry for a newly created execution.
    #[must_use]
    pub fn new(handle: ExecutionHandle, error_policy: ErrorPolicy) -> Self {
        Self {
            handle: RwLock::new(handle),
            pause: PauseGate::new(),
            cancellation: CancellationToken::new(),
            hitl: RwLock::new(None),
            loop_counters: DashMap::new(),
            error_policy,
            ancestor_workflow_ids: Vec::new(),
        }
    }

    /// Construct a sub-workflow execution's entry, inheriting its parent's
    /// ancestor chain plus the parent's own workflow id.
    #[must_use]
    pub fn new_child(handle: ExecutionHandle, error_policy: ErrorPolicy, mut ancestor_workflow_ids: Vec<WorkflowId>, parent_workflow_id: WorkflowId) -> Self {
        ancestor_workflow_ids.push(parent_workflow_id);
        Self {
            handle: RwLock::new(handle),
            pause: PauseGate::new(),
            cancellation: CancellationToken::new(),
            hitl: RwLock::new(None),
            loop_counters: DashMap::new(),
            error_policy,
            ancestor_workflow_ids,
        }
    }

    /// Snapshot the loop counters into a plain map keyed by node id, summing
    /// across every output handle that node has looped on, for folding into
    /// a status response.
    #[must_use]
    pub fn loop_counters_snapshot(&self) -> HashMap<NodeId, u64> {
        let mut snapshot = HashMap::new();
        for entry in self.loop_counters.iter() {
            let (node_id, _handle) = entry.key();
            *snapshot.entry(*node_id).or_insert(0) += *entry.value();
        }
        snapshot
    }
}
