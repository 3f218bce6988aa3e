//! The value a node handler returns from one invocation.

use serde_json::{Map, Value};

/// What a node handler produces from one invocation.
///
/// `output_handle` selects which outgoing edges fire — the Graph Runner
/// matches it against each outgoing edge's `source_handle`
/// (`"default"` if the handler doesn't set one). A handler may report
/// failure either by returning `output_handle = "error"` (routable, if the
/// node has an `"error"` edge) or by returning `Err(HandlerError)` from
/// `execute` (caught by the runner and subject to retry).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeResult {
    /// Value map published into downstream scope under this node's id.
    pub data: Map<String, Value>,
    /// Selects the outgoing edges this result routes through.
    pub output_handle: String,
}

impl NodeResult {
    /// A successful result on the `"default"` handle.
    #[must_use]
    pub fn default_handle(data: Map<String, Value>) -> Self {
        Self {
            data,
            output_handle: "default".to_string(),
        }
    }

    /// A result routed through a named handle (e.g. `"true"`, `"loop"`,
    /// `"done"`, `"error"`).
    #[must_use]
    pub fn with_handle(data: Map<String, Value>, handle: impl Into<String>) -> Self {
        Self {
            data,
            output_handle: handle.into(),
        }
    }

    /// An empty successful result on the `"default"` handle.
    #[must_use]
    pub fn empty() -> Self {
        Self::default_handle(Map::new())
    }

    /// `true` if this result selects the conventional `"error"` handle.
    #[must_use]
    pub fn is_error_handle(&self) -> bool {
        self.output_handle == "error"
    }

    /// Approximate serialized size of `data`, used for output-size budget
    /// accounting.
    #[must_use]
    pub fn approximate_size_bytes(&self) -> u64 {
        serde_json::to_vec(&self.data).map_or(0, |bytes| bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handle_result() {
        let mut data = Map::new();
        data.insert("x".into(), Value::from(1));
        let r = NodeResult::default_handle(data.clone());
        assert_eq!(r.output_handle, "default");
        assert_eq!(r.data, data);
        assert!(!r.is_error_handle());
    }

    #[test]
    fn error_handle_detected() {
        let r = NodeResult::with_handle(Map::new(), "error");
        assert!(r.is_error_handle());
    }

    #[test]
    fn empty_result_has_empty_data() {
        let r = NodeResult::empty();
        assert!(r.data.is_empty());
        assert_eq!(r.output_handle, "default");
    }

    #[test]
    fn size_accounts_for_data() {
        let mut data = Map::new();
        data.insert("x".into(), Value::from("hello"));
        let r = NodeResult::default_handle(data);
        assert!(r.approximate_size_bytes() > 0);
    }
}
