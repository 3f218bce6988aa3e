//! Node output data.
//!
//! A node output is always inline JSON — this kernel has no blob store, so
//! large outputs are the caller's problem, not ours.
//! `approximate_size_bytes` exists so callers *can* enforce their own caps
//! (e.g. truncating before emitting a `node_completed` event).

use chrono::{DateTime, Utc};
use kestrel_workflow::NodeState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON value produced by a node attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ExecutionOutput(Value);

impl ExecutionOutput {
    /// Wrap an inline JSON value.
    #[must_use]
    pub fn inline(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume and return the underlying value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// A node's recorded output, with metadata about when and how long it took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutput {
    /// The produced value.
    pub data: ExecutionOutput,
    /// Node state at the time this output was recorded (`Completed` or `Failed`).
    pub status: NodeState,
    /// When the output was produced.
    pub produced_at: DateTime<Utc>,
    /// Wall-clock duration of the attempt that produced it, if known.
    #[serde(with = "crate::serde_duration_opt")]
    pub duration: Option<std::time::Duration>,
    /// Approximate size in bytes.
    pub bytes: u64,
}

impl NodeOutput {
    /// Record a new output at `now`.
    #[must_use]
    pub fn new(
        data: ExecutionOutput,
        status: NodeState,
        now: DateTime<Utc>,
        duration: Option<std::time::Duration>,
    ) -> Self {
        let bytes = serde_json::to_vec(data.as_value()).map(|v| v.len() as u64).unwrap_or(0);
        Self {
            data,
            status,
            produced_at: now,
            duration,
            bytes,
        }
    }

    /// Borrow the output's value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        self.data.as_value()
    }
}
