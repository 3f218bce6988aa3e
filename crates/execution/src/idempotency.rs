//! Idempotency keys for deduplicating node attempts.

use std::collections::HashSet;
use std::fmt;

use kestrel_core::{ExecutionId, NodeId};
use serde::{Deserialize, Serialize};

/// Deterministic key identifying a single attempt of a single node within a
/// single execution: `"{execution_id}:{node_id}:{attempt}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generate the key for a given execution, node and attempt number.
    #[must_use]
    pub fn generate(execution_id: ExecutionId, node_id: NodeId, attempt: u32) -> Self {
        Self(format!("{execution_id}:{node_id}:{attempt}"))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks which idempotency keys have already been observed within a single
/// execution, so a retried dispatch never re-runs a handler that already
/// completed under the same key.
#[derive(Debug, Default)]
pub struct IdempotencyManager {
    seen: HashSet<String>,
}

impl IdempotencyManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as seen, returning `true` if it was newly inserted and
    /// `false` if it had already been recorded.
    pub fn check_and_mark(&mut self, key: &IdempotencyKey) -> bool {
        self.seen.insert(key.as_str().to_owned())
    }

    /// Returns `true` if `key` has already been recorded.
    #[must_use]
    pub fn is_seen(&self, key: &IdempotencyKey) -> bool {
        self.seen.contains(key.as_str())
    }

    /// Forget every recorded key.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Number of distinct keys recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if no keys have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
