//! Runtime execution context shared across a single execution's node handlers.

use std::collections::HashMap;
use std::sync::Arc;

use kestrel_core::{ExecutionId, NodeId};
use kestrel_workflow::Workflow;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::output::NodeOutput;

/// Shared, mutable runtime state for one execution.
///
/// Owned by exactly one execution; destroyed at its terminal transition.
/// Credential material does not live here — it is handed to each node's
/// [`kestrel_node::NodeContext`] directly by the dispatcher, scoped to that
/// one call, and is never retained across nodes.
#[derive(Clone)]
pub struct ExecutionContext {
    /// This execution's identifier.
    pub execution_id: ExecutionId,
    /// The compiled workflow this execution is running.
    pub workflow: Arc<Workflow>,
    node_outputs: Arc<RwLock<HashMap<NodeId, NodeOutput>>>,
    /// Cooperative cancellation signal for this execution.
    pub cancellation: CancellationToken,
    variables: Arc<RwLock<Map<String, Value>>>,
    loop_counts: Arc<RwLock<HashMap<NodeId, u64>>>,
    loop_items: Arc<RwLock<HashMap<NodeId, Vec<Value>>>>,
    batch_cursors: Arc<RwLock<HashMap<NodeId, usize>>>,
    accumulated: Arc<RwLock<HashMap<NodeId, Vec<Value>>>>,
}

impl ExecutionContext {
    /// Create a new context for `execution_id` over `workflow`.
    #[must_use]
    pub fn new(execution_id: ExecutionId, workflow: Arc<Workflow>) -> Self {
        Self {
            execution_id,
            workflow,
            node_outputs: Arc::new(RwLock::new(HashMap::new())),
            cancellation: CancellationToken::new(),
            variables: Arc::new(RwLock::new(Map::new())),
            loop_counts: Arc::new(RwLock::new(HashMap::new())),
            loop_items: Arc::new(RwLock::new(HashMap::new())),
            batch_cursors: Arc::new(RwLock::new(HashMap::new())),
            accumulated: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Attach an externally-owned cancellation token, e.g. one shared with
    /// a parent execution for sub-workflow cancellation propagation.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Seed initial execution variables.
    #[must_use]
    pub fn with_variables(self, variables: Map<String, Value>) -> Self {
        *self.variables.write() = variables;
        self
    }

    /// Record a node's output.
    pub fn set_node_output(&self, node_id: NodeId, output: NodeOutput) {
        self.node_outputs.write().insert(node_id, output);
    }

    /// Look up a previously recorded node output.
    #[must_use]
    pub fn get_node_output(&self, node_id: NodeId) -> Option<NodeOutput> {
        self.node_outputs.read().get(&node_id).cloned()
    }

    /// Snapshot every recorded node output, for final result assembly.
    #[must_use]
    pub fn all_node_outputs(&self) -> HashMap<NodeId, NodeOutput> {
        self.node_outputs.read().clone()
    }

    /// Set an execution-scoped variable.
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.variables.write().insert(name.into(), value);
    }

    /// Read an execution-scoped variable.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).cloned()
    }

    /// Snapshot every execution-scoped variable.
    #[must_use]
    pub fn all_variables(&self) -> Map<String, Value> {
        self.variables.read().clone()
    }

    /// Clone of the shared variable handle, for handing to a node's
    /// [`kestrel_node::NodeContext`] so `set_variable` calls made inside a
    /// handler are visible to every node dispatched afterward.
    #[must_use]
    pub fn variables_handle(&self) -> Arc<RwLock<Map<String, Value>>> {
        self.variables.clone()
    }

    /// Current iteration count recorded against a loop-carrying node.
    #[must_use]
    pub fn loop_count(&self, node_id: NodeId) -> u64 {
        self.loop_counts.read().get(&node_id).copied().unwrap_or(0)
    }

    /// Record one more iteration against a loop-carrying node and return the
    /// new count.
    pub fn increment_loop(&self, node_id: NodeId) -> u64 {
        let mut counts = self.loop_counts.write();
        let count = counts.entry(node_id).or_insert(0);
        *count += 1;
        *count
    }

    /// The item list a batch/`for_each`-style loop node is iterating over,
    /// if one has been set.
    #[must_use]
    pub fn get_items(&self, node_id: NodeId) -> Option<Vec<Value>> {
        self.loop_items.read().get(&node_id).cloned()
    }

    /// Seed the item list a loop node iterates over.
    pub fn set_items(&self, node_id: NodeId, items: Vec<Value>) {
        self.loop_items.write().insert(node_id, items);
    }

    /// The next unconsumed index into a loop node's item list.
    #[must_use]
    pub fn batch_cursor(&self, node_id: NodeId) -> usize {
        self.batch_cursors.read().get(&node_id).copied().unwrap_or(0)
    }

    /// Advance a loop node's cursor into its item list.
    pub fn set_batch_cursor(&self, node_id: NodeId, cursor: usize) {
        self.batch_cursors.write().insert(node_id, cursor);
    }

    /// Append one loop-body iteration's output to the results a loop node
    /// publishes once it reaches its `done` handle.
    pub fn accumulate_result(&self, node_id: NodeId, value: Value) {
        self.accumulated.write().entry(node_id).or_default().push(value);
    }

    /// Every result accumulated so far for a loop node, in iteration order.
    #[must_use]
    pub fn accumulated_results(&self, node_id: NodeId) -> Vec<Value> {
        self.accumulated.read().get(&node_id).cloned().unwrap_or_default()
    }

    /// Returns an error if this execution has been cancelled.
    pub fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.cancellation.is_cancelled() {
            Err(ExecutionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sum of recorded output sizes across all nodes.
    #[must_use]
    pub fn total_output_bytes(&self) -> u64 {
        self.node_outputs.read().values().map(|o| o.bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ExecutionOutput;
    use chrono::Utc;
    use kestrel_core::{UserId, WorkflowId};
    use kestrel_workflow::{Workflow, WorkflowSettings};
    use kestrel_workflow::NodeState;
    use serde_json::json;

    fn workflow() -> Arc<Workflow> {
        Arc::new(Workflow {
            id: WorkflowId::v4(),
            owner_id: UserId::v4(),
            nodes: Vec::new(),
            edges: Vec::new(),
            settings: WorkflowSettings::default(),
        })
    }

    #[test]
    fn variables_round_trip() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        ctx.set_variable("x", json!(42));
        assert_eq!(ctx.get_variable("x"), Some(json!(42)));
        assert!(ctx.get_variable("missing").is_none());
    }

    #[test]
    fn with_variables_seeds_initial_set() {
        let mut seed = Map::new();
        seed.insert("seeded".into(), json!(true));
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow()).with_variables(seed);
        assert_eq!(ctx.get_variable("seeded"), Some(json!(true)));
    }

    #[test]
    fn node_outputs_round_trip() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        let node = NodeId::v4();
        let output = NodeOutput::new(ExecutionOutput::inline(json!("ok")), NodeState::Completed, Utc::now(), None);
        ctx.set_node_output(node, output);
        assert!(ctx.get_node_output(node).is_some());
        assert!(ctx.get_node_output(NodeId::v4()).is_none());
    }

    #[test]
    fn total_output_bytes_sums_recorded_outputs() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        ctx.set_node_output(
            NodeId::v4(),
            NodeOutput::new(ExecutionOutput::inline(json!("ab")), NodeState::Completed, Utc::now(), None),
        );
        ctx.set_node_output(
            NodeId::v4(),
            NodeOutput::new(ExecutionOutput::inline(json!("cd")), NodeState::Completed, Utc::now(), None),
        );
        assert!(ctx.total_output_bytes() > 0);
    }

    #[test]
    fn check_cancelled_reflects_token() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancellation.cancel();
        assert!(ctx.check_cancelled().is_err());
    }

    #[test]
    fn with_cancellation_shares_external_token() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow()).with_cancellation(token.clone());
        token.cancel();
        assert!(ctx.check_cancelled().is_err());
    }

    #[test]
    fn increment_loop_counts_up_from_zero() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        let node = NodeId::v4();
        assert_eq!(ctx.loop_count(node), 0);
        assert_eq!(ctx.increment_loop(node), 1);
        assert_eq!(ctx.increment_loop(node), 2);
        assert_eq!(ctx.loop_count(node), 2);
    }

    #[test]
    fn items_and_batch_cursor_round_trip() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        let node = NodeId::v4();
        assert!(ctx.get_items(node).is_none());
        assert_eq!(ctx.batch_cursor(node), 0);

        ctx.set_items(node, vec![json!(1), json!(2), json!(3)]);
        ctx.set_batch_cursor(node, 2);
        assert_eq!(ctx.get_items(node), Some(vec![json!(1), json!(2), json!(3)]));
        assert_eq!(ctx.batch_cursor(node), 2);
    }

    #[test]
    fn accumulate_result_preserves_iteration_order() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        let node = NodeId::v4();
        assert!(ctx.accumulated_results(node).is_empty());

        ctx.accumulate_result(node, json!("first"));
        ctx.accumulate_result(node, json!("second"));
        assert_eq!(ctx.accumulated_results(node), vec![json!("first"), json!("second")]);
    }

    #[test]
    fn all_node_outputs_snapshot() {
        let ctx = ExecutionContext::new(ExecutionId::v4(), workflow());
        let node = NodeId::v4();
        ctx.set_node_output(
            node,
            NodeOutput::new(ExecutionOutput::inline(json!(1)), NodeState::Completed, Utc::now(), None),
        );
        let snapshot = ctx.all_node_outputs();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&node));
    }
}
