//! The Graph Runner's final report for one driven execution.

use kestrel_core::NodeId;
use kestrel_execution::{ExecutionStatus, JournalEntry};
use serde_json::Value;

/// What [`crate::runner::GraphRunner::run`] returns once an execution
/// reaches a terminal status.
#[derive(Debug)]
pub struct EngineOutcome {
    /// The terminal status reached.
    pub status: ExecutionStatus,
    /// The recorded execution output — the single terminal leaf's output,
    /// or an object merging every terminal leaf's output keyed by node id
    /// if more than one leaf completed.
    pub output: Value,
    /// The node whose failure terminated the execution, if `status` is
    /// `Failed`.
    pub failing_node_id: Option<NodeId>,
    /// The failure message, if `status` is `Failed`.
    pub error_message: Option<String>,
    /// Every lifecycle event emitted while driving this execution, in
    /// program order.
    pub journal: Vec<JournalEntry>,
}

impl EngineOutcome {
    /// `true` if the execution reached `Completed`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_outcome_reports_is_success() {
        let outcome = EngineOutcome {
            status: ExecutionStatus::Completed,
            output: json!({"ok": true}),
            failing_node_id: None,
            error_message: None,
            journal: Vec::new(),
        };
        assert!(outcome.is_success());
    }

    #[test]
    fn failed_outcome_is_not_success() {
        let outcome = EngineOutcome {
            status: ExecutionStatus::Failed,
            output: Value::Null,
            failing_node_id: Some(NodeId::v4()),
            error_message: Some("boom".into()),
            journal: Vec::new(),
        };
        assert!(!outcome.is_success());
    }
}
