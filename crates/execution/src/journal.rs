//! Execution journal for audit and replay.

use chrono::{DateTime, Utc};
use kestrel_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::status::ExecutionStatus;

/// A journal entry recording a significant event during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    /// The execution was started.
    ExecutionStarted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
    },
    /// A node was scheduled for execution.
    NodeScheduled {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node that was scheduled.
        node_id: NodeId,
    },
    /// A node started executing.
    NodeStarted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node that started.
        node_id: NodeId,
        /// Which attempt number (0-indexed).
        attempt: u32,
    },
    /// A node completed successfully.
    NodeCompleted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node that completed.
        node_id: NodeId,
        /// Output size in bytes.
        output_bytes: u64,
        /// The output handle the node selected.
        output_handle: String,
    },
    /// A node failed.
    NodeFailed {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node that failed.
        node_id: NodeId,
        /// Error message.
        error: String,
    },
    /// A node was skipped because the branch leading to it was not taken.
    NodeSkipped {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node that was skipped.
        node_id: NodeId,
        /// Reason for skipping.
        reason: String,
    },
    /// A node is being retried.
    NodeRetrying {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node being retried.
        node_id: NodeId,
        /// Which attempt is being made (0-indexed).
        attempt: u32,
    },
    /// The entire execution completed successfully.
    ExecutionCompleted {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Final execution status.
        status: ExecutionStatus,
    },
    /// The entire execution failed.
    ExecutionFailed {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// The node whose failure terminated the execution, if any.
        failing_node_id: Option<NodeId>,
        /// Error message.
        error: String,
    },
    /// A cancellation was requested.
    CancellationRequested {
        /// When the event occurred.
        timestamp: DateTime<Utc>,
        /// Reason for cancellation.
        reason: String,
    },
}

impl JournalEntry {
    /// Get the timestamp of this entry.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ExecutionStarted { timestamp }
            | Self::NodeScheduled { timestamp, .. }
            | Self::NodeStarted { timestamp, .. }
            | Self::NodeCompleted { timestamp, .. }
            | Self::NodeFailed { timestamp, .. }
            | Self::NodeSkipped { timestamp, .. }
            | Self::NodeRetrying { timestamp, .. }
            | Self::ExecutionCompleted { timestamp, .. }
            | Self::ExecutionFailed { timestamp, .. }
            | Self::CancellationRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get the node ID associated with this entry, if any.
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::NodeScheduled { node_id, .. }
            | Self::NodeStarted { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeSkipped { node_id, .. }
            | Self::NodeRetrying { node_id, .. } => Some(*node_id),
            Self::ExecutionFailed { failing_node_id, .. } => *failing_node_id,
            Self::ExecutionStarted { .. }
            | Self::ExecutionCompleted { .. }
            | Self::CancellationRequested { .. } => None,
        }
    }

    /// Returns `true` if this is a node-level event.
    #[must_use]
    pub fn is_node_event(&self) -> bool {
        matches!(
            self,
            Self::NodeScheduled { .. }
                | Self::NodeStarted { .. }
                | Self::NodeCompleted { .. }
                | Self::NodeFailed { .. }
                | Self::NodeSkipped { .. }
                | Self::NodeRetrying { .. }
        )
    }

    /// Returns `true` if this is an execution-level event.
    #[must_use]
    pub fn is_execution_event(&self) -> bool {
        !self.is_node_event()
    }

    /// Serialize this entry to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize an entry from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
