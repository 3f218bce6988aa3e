//! Persistent execution and node state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kestrel_core::{ExecutionId, NodeId, WorkflowId};
use kestrel_workflow::NodeState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attempt::NodeAttempt;
use crate::error::ExecutionError;
use crate::output::NodeOutput;
use crate::status::ExecutionStatus;
use crate::transition::{validate_execution_transition, validate_node_transition};

/// Tracked state of a single node across all of its attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionState {
    /// Current node-level state.
    pub state: NodeState,
    /// All attempts made so far, in order.
    pub attempts: Vec<NodeAttempt>,
    /// The output currently recorded for this node, if any.
    pub current_output: Option<NodeOutput>,
    /// When the node became `Ready`.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the node became `Running` (on its most recent attempt).
    pub started_at: Option<DateTime<Utc>>,
    /// When the node reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// The last recorded error message, if the node is in an error state.
    pub error_message: Option<String>,
}

impl NodeExecutionState {
    /// Create a node state starting as `Pending`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: NodeState::Pending,
            attempts: Vec::new(),
            current_output: None,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Number of attempts made so far.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// The most recent attempt, if any.
    #[must_use]
    pub fn latest_attempt(&self) -> Option<&NodeAttempt> {
        self.attempts.last()
    }

    /// Validate and apply a state transition, stamping the relevant
    /// timestamp field from `now`.
    pub fn transition_to(&mut self, new_state: NodeState, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        validate_node_transition(self.state, new_state)?;
        match new_state {
            NodeState::Ready => self.scheduled_at = Some(now),
            NodeState::Running => self.started_at = Some(now),
            _ if new_state.is_terminal() => self.completed_at = Some(now),
            _ => {}
        }
        self.state = new_state;
        Ok(())
    }
}

impl Default for NodeExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Full persistent state of one execution: its status and the state of
/// every node in the compiled plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    /// This execution's identifier.
    pub execution_id: ExecutionId,
    /// The workflow this execution is running.
    pub workflow_id: WorkflowId,
    /// Current execution-level status.
    pub status: ExecutionStatus,
    /// Per-node state, keyed by node id.
    pub node_states: HashMap<NodeId, NodeExecutionState>,
    /// Optimistic-concurrency version, bumped on every status transition.
    pub version: u64,
    /// When this execution was created.
    pub created_at: DateTime<Utc>,
    /// When this execution's state was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the execution started running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the execution reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Total retry attempts across all nodes.
    pub total_retries: u32,
    /// Total bytes of node output recorded.
    pub total_output_bytes: u64,
    /// Execution-scoped variables.
    pub variables: Map<String, Value>,
}

impl ExecutionState {
    /// Create a fresh, `Pending` execution state for a workflow with the
    /// given node ids.
    #[must_use]
    pub fn new(execution_id: ExecutionId, workflow_id: WorkflowId, node_ids: &[NodeId], now: DateTime<Utc>) -> Self {
        let node_states = node_ids.iter().map(|id| (*id, NodeExecutionState::new())).collect();
        Self {
            execution_id,
            workflow_id,
            status: ExecutionStatus::Pending,
            node_states,
            version: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            total_retries: 0,
            total_output_bytes: 0,
            variables: Map::new(),
        }
    }

    /// Borrow a node's state.
    #[must_use]
    pub fn node_state(&self, node_id: NodeId) -> Option<&NodeExecutionState> {
        self.node_states.get(&node_id)
    }

    /// Mutably borrow a node's state.
    pub fn node_state_mut(&mut self, node_id: NodeId) -> Option<&mut NodeExecutionState> {
        self.node_states.get_mut(&node_id)
    }

    /// Returns `true` if every node has reached a terminal state.
    #[must_use]
    pub fn all_nodes_terminal(&self) -> bool {
        self.node_states.values().all(|s| s.state.is_terminal())
    }

    /// Node ids currently active (not terminal, not pending).
    #[must_use]
    pub fn active_node_ids(&self) -> Vec<NodeId> {
        self.node_states
            .iter()
            .filter(|(_, s)| s.state.is_active())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Node ids that completed successfully.
    #[must_use]
    pub fn completed_node_ids(&self) -> Vec<NodeId> {
        self.node_states
            .iter()
            .filter(|(_, s)| s.state == NodeState::Completed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Node ids that failed.
    #[must_use]
    pub fn failed_node_ids(&self) -> Vec<NodeId> {
        self.node_states
            .iter()
            .filter(|(_, s)| s.state == NodeState::Failed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Validate and apply an execution-level transition, bumping the
    /// version and stamping timestamps from `now`.
    pub fn transition_status(&mut self, new_status: ExecutionStatus, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        validate_execution_transition(self.status, new_status)?;
        if new_status == ExecutionStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if new_status.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = new_status;
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (ExecutionId, WorkflowId, NodeId) {
        (ExecutionId::v4(), WorkflowId::v4(), NodeId::v4())
    }

    #[test]
    fn new_node_state_is_pending() {
        let state = NodeExecutionState::new();
        assert_eq!(state.state, NodeState::Pending);
        assert_eq!(state.attempt_count(), 0);
        assert!(state.latest_attempt().is_none());
    }

    #[test]
    fn node_transition_to_ready_stamps_scheduled_at() {
        let mut state = NodeExecutionState::new();
        let now = Utc::now();
        state.transition_to(NodeState::Ready, now).unwrap();
        assert_eq!(state.scheduled_at, Some(now));
        assert!(state.started_at.is_none());
    }

    #[test]
    fn node_transition_to_running_stamps_started_at() {
        let mut state = NodeExecutionState::new();
        let t1 = Utc::now();
        state.transition_to(NodeState::Ready, t1).unwrap();
        let t2 = t1 + chrono::Duration::milliseconds(5);
        state.transition_to(NodeState::Running, t2).unwrap();
        assert_eq!(state.started_at, Some(t2));
    }

    #[test]
    fn node_transition_to_terminal_stamps_completed_at() {
        let mut state = NodeExecutionState::new();
        let t1 = Utc::now();
        state.transition_to(NodeState::Ready, t1).unwrap();
        state.transition_to(NodeState::Running, t1).unwrap();
        let t2 = t1 + chrono::Duration::seconds(1);
        state.transition_to(NodeState::Completed, t2).unwrap();
        assert_eq!(state.completed_at, Some(t2));
    }

    #[test]
    fn node_invalid_transition_rejected() {
        let mut state = NodeExecutionState::new();
        let err = state.transition_to(NodeState::Running, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
    }

    #[test]
    fn new_execution_state_tracks_all_nodes_pending() {
        let (exec, wf, node) = ids();
        let state = ExecutionState::new(exec, wf, &[node], Utc::now());
        assert_eq!(state.status, ExecutionStatus::Pending);
        assert_eq!(state.node_state(node).unwrap().state, NodeState::Pending);
        assert!(!state.all_nodes_terminal());
        assert_eq!(state.version, 0);
    }

    #[test]
    fn transition_status_bumps_version_and_updated_at() {
        let (exec, wf, node) = ids();
        let t0 = Utc::now();
        let mut state = ExecutionState::new(exec, wf, &[node], t0);
        let t1 = t0 + chrono::Duration::seconds(1);
        state.transition_status(ExecutionStatus::Running, t1).unwrap();
        assert_eq!(state.version, 1);
        assert_eq!(state.updated_at, t1);
        assert_eq!(state.started_at, Some(t1));
    }

    #[test]
    fn transition_status_to_terminal_stamps_completed_at() {
        let (exec, wf, node) = ids();
        let t0 = Utc::now();
        let mut state = ExecutionState::new(exec, wf, &[node], t0);
        state.transition_status(ExecutionStatus::Running, t0).unwrap();
        let t1 = t0 + chrono::Duration::seconds(2);
        state.transition_status(ExecutionStatus::Completed, t1).unwrap();
        assert_eq!(state.completed_at, Some(t1));
    }

    #[test]
    fn transition_status_invalid_rejected() {
        let (exec, wf, node) = ids();
        let mut state = ExecutionState::new(exec, wf, &[node], Utc::now());
        let err = state.transition_status(ExecutionStatus::Completed, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));
    }

    #[test]
    fn active_completed_failed_node_id_queries() {
        let (exec, wf, _) = ids();
        let a = NodeId::v4();
        let b = NodeId::v4();
        let mut state = ExecutionState::new(exec, wf, &[a, b], Utc::now());
        state.node_state_mut(a).unwrap().transition_to(NodeState::Ready, Utc::now()).unwrap();
        state.node_state_mut(a).unwrap().transition_to(NodeState::Running, Utc::now()).unwrap();
        state.node_state_mut(b).unwrap().transition_to(NodeState::Ready, Utc::now()).unwrap();
        state.node_state_mut(b).unwrap().transition_to(NodeState::Running, Utc::now()).unwrap();
        state.node_state_mut(b).unwrap().transition_to(NodeState::Failed, Utc::now()).unwrap();

        assert_eq!(state.active_node_ids(), vec![a]);
        assert_eq!(state.failed_node_ids(), vec![b]);
        assert!(state.completed_node_ids().is_empty());
    }

    #[test]
    fn all_nodes_terminal_true_once_both_done() {
        let (exec, wf, _) = ids();
        let a = NodeId::v4();
        let b = NodeId::v4();
        let mut state = ExecutionState::new(exec, wf, &[a, b], Utc::now());
        for id in [a, b] {
            state.node_state_mut(id).unwrap().transition_to(NodeState::Ready, Utc::now()).unwrap();
            state.node_state_mut(id).unwrap().transition_to(NodeState::Running, Utc::now()).unwrap();
            state.node_state_mut(id).unwrap().transition_to(NodeState::Completed, Utc::now()).unwrap();
        }
        assert!(state.all_nodes_terminal());
    }

    #[test]
    fn missing_node_state_returns_none() {
        let (exec, wf, node) = ids();
        let state = ExecutionState::new(exec, wf, &[node], Utc::now());
        assert!(state.node_state(NodeId::v4()).is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let (exec, wf, node) = ids();
        let state = ExecutionState::new(exec, wf, &[node], Utc::now());
        let json = serde_json::to_string(&state).unwrap();
        let back: ExecutionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution_id, exec);
        assert_eq!(back.node_states.len(), 1);
    }
}
