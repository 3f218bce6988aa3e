//! The Graph Runner hook implementation the Supervisor installs for every
//! execution it spawns.
//!
//! Each hook call is a suspension point: `before_node` blocks on the pause
//! gate, then checks cancellation; `after_node` and `on_error` update the
//! externally-visible [`ExecutionHandle`](crate::handle::ExecutionHandle)
//! and emit the matching [`KernelEvent`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{Clock, ExecutionId, NodeId};
use kestrel_engine::{Decision, NodeOutcome, RunnerHooks};
use kestrel_node::HandlerError;
use kestrel_telemetry::{EventBus, KernelEvent};
use kestrel_workflow::ErrorPolicy;

use crate::entry::ExecutionEntry;

/// Truncation threshold for output values copied into an emitted event.
/// Execution state itself keeps the full value; this only bounds what
/// goes out over the event sink.
const MAX_EVENT_OUTPUT_BYTES: usize = 32 * 1024;

/// One execution's [`RunnerHooks`] implementation, bound to its
/// [`ExecutionEntry`] and the process-wide event bus.
pub struct SupervisorHooks {
    entry: Arc<ExecutionEntry>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    /// Node ids the compiled plan marked as loop-carrying. `after_node`
    /// only bumps the reporting-only loop counter for these — every other
    /// node completes exactly once, so counting it as a "loop iteration"
    /// would misreport plain completions as loops.
    loop_carrying_node_ids: Arc<BTreeSet<NodeId>>,
}

impl SupervisorHooks {
    /// Bind hooks to one execution's control state.
    #[must_use]
    pub fn new(
        entry: Arc<ExecutionEntry>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        loop_carrying_node_ids: Arc<BTreeSet<NodeId>>,
    ) -> Self {
        Self { entry, events, clock, loop_carrying_node_ids }
    }
}

#[async_trait]
impl RunnerHooks for SupervisorHooks {
    async fn before_node(&self, execution_id: ExecutionId, node_id: NodeId) -> Decision {
        self.entry.pause.wait().await;

        if self.entry.cancellation.is_cancelled() {
            return Decision::Abort;
        }

        self.entry.handle.write().current_node = Some(node_id);
        self.events.emit(KernelEvent::NodeStarted { execution_id, node_id });
        Decision::Continue
    }

    async fn after_node(&self, execution_id: ExecutionId, node_id: NodeId, outcome: &NodeOutcome) -> Decision {
        if self.loop_carrying_node_ids.contains(&node_id) {
            let key = (node_id, outcome.output_handle.clone());
            *self.entry.loop_counters.entry(key).or_insert(0) += 1;
        }

        let serialized = serde_json::to_vec(&outcome.data).unwrap_or_default();
        let truncated = serialized.len() > MAX_EVENT_OUTPUT_BYTES;

        self.events.emit(KernelEvent::NodeCompleted {
            execution_id,
            node_id,
            output_handle: outcome.output_handle.clone(),
            duration_ms: 0,
            truncated_output: truncated,
        });

        if self.entry.cancellation.is_cancelled() {
            Decision::Abort
        } else {
            Decision::Continue
        }
    }

    async fn on_error(&self, execution_id: ExecutionId, node_id: NodeId, error: &HandlerError) -> Decision {
        self.events.emit(KernelEvent::NodeFailed {
            execution_id,
            node_id,
            error_kind: if error.is_fatal() { "fatal".into() } else { "retryable".into() },
            message: error.to_string(),
        });

        let _ = self.clock.now();
        match self.entry.error_policy {
            ErrorPolicy::Continue => Decision::Continue,
            ErrorPolicy::FailFast => Decision::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ExecutionEntry;
    use crate::handle::ExecutionHandle;
    use kestrel_core::{FixedClock, UserId, WorkflowId};
    use kestrel_node::HandlerError;
    use serde_json::json;

    fn entry(error_policy: ErrorPolicy) -> Arc<ExecutionEntry> {
        let now = chrono::Utc::now();
        let handle = ExecutionHandle::new(ExecutionId::v4(), WorkflowId::v4(), UserId::v4(), None, 0, now);
        Arc::new(ExecutionEntry::new(handle, error_policy))
    }

    fn hooks_with_loop_carriers(entry: Arc<ExecutionEntry>, loop_carrying: impl IntoIterator<Item = NodeId>) -> SupervisorHooks {
        SupervisorHooks::new(
            entry,
            Arc::new(EventBus::new(16)),
            Arc::new(FixedClock::default()),
            Arc::new(loop_carrying.into_iter().collect()),
        )
    }

    #[tokio::test]
    async fn before_node_continues_when_not_cancelled() {
        let entry = entry(ErrorPolicy::FailFast);
        let hooks = hooks_with_loop_carriers(entry.clone(), []);
        let decision = hooks.before_node(entry.handle.read().execution_id, NodeId::v4()).await;
        assert_eq!(decision, Decision::Continue);
    }

    #[tokio::test]
    async fn before_node_aborts_when_cancelled() {
        let entry = entry(ErrorPolicy::FailFast);
        entry.cancellation.cancel();
        let hooks = hooks_with_loop_carriers(entry.clone(), []);
        let decision = hooks.before_node(entry.handle.read().execution_id, NodeId::v4()).await;
        assert_eq!(decision, Decision::Abort);
    }

    #[tokio::test]
    async fn after_node_increments_loop_counter_for_loop_carrying_nodes() {
        let entry = entry(ErrorPolicy::FailFast);
        let node = NodeId::v4();
        let hooks = hooks_with_loop_carriers(entry.clone(), [node]);
        let outcome = NodeOutcome::success(json!({"ok": true}), "loop");
        hooks.after_node(entry.handle.read().execution_id, node, &outcome).await;
        hooks.after_node(entry.handle.read().execution_id, node, &outcome).await;
        assert_eq!(entry.loop_counters_snapshot().get(&node), Some(&2));
    }

    #[tokio::test]
    async fn after_node_ignores_nodes_outside_the_loop_carrying_set() {
        let entry = entry(ErrorPolicy::FailFast);
        let node = NodeId::v4();
        let hooks = hooks_with_loop_carriers(entry.clone(), []);
        let outcome = NodeOutcome::success(json!({"ok": true}), "default");
        hooks.after_node(entry.handle.read().execution_id, node, &outcome).await;
        assert!(entry.loop_counters_snapshot().get(&node).is_none());
    }

    #[tokio::test]
    async fn on_error_aborts_under_fail_fast() {
        let entry = entry(ErrorPolicy::FailFast);
        let hooks = hooks_with_loop_carriers(entry.clone(), []);
        let decision = hooks
            .on_error(entry.handle.read().execution_id, NodeId::v4(), &HandlerError::fatal("boom"))
            .await;
        assert_eq!(decision, Decision::Abort);
    }

    #[tokio::test]
    async fn on_error_continues_under_continue_policy() {
        let entry = entry(ErrorPolicy::Continue);
        let hooks = hooks_with_loop_carriers(entry.clone(), []);
        let decision = hooks
            .on_error(entry.handle.read().execution_id, NodeId::v4(), &HandlerError::fatal("boom"))
            .await;
        assert_eq!(decision, Decision::Continue);
    }
}
