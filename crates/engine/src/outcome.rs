//! The value the runner passes to `after_node` and records as a node's
//! terminal per-attempt result.

use serde_json::Value;

/// A node's terminal outcome for one dispatch round, as seen by
/// [`crate::hooks::RunnerHooks::after_node`].
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    /// The published output value.
    pub data: Value,
    /// The output handle selected (`"default"` unless the handler chose
    /// another declared handle).
    pub output_handle: String,
}

impl NodeOutcome {
    /// Construct a successful outcome.
    #[must_use]
    pub fn success(data: Value, output_handle: impl Into<String>) -> Self {
        Self {
            data,
            output_handle: output_handle.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_carries_handle_and_data() {
        let outcome = NodeOutcome::success(json!({"x": 1}), "true");
        assert_eq!(outcome.output_handle, "true");
        assert_eq!(outcome.data, json!({"x": 1}));
    }
}
