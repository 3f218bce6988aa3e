//! Per-attempt tracking for a single node dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::idempotency::IdempotencyKey;
use crate::output::ExecutionOutput;

/// Record of one dispatch attempt of a node handler.
///
/// Timestamps are passed in rather than captured internally so that callers
/// always go through a `Clock`, keeping replay and testing deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAttempt {
    /// 0-indexed attempt number within the node's retry sequence.
    pub attempt_number: u32,
    /// Deduplication key for this attempt.
    pub idempotency_key: IdempotencyKey,
    /// When the attempt was dispatched.
    pub started_at: DateTime<Utc>,
    /// When the attempt reached a terminal outcome, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// The attempt's output, once it has succeeded.
    pub output: Option<ExecutionOutput>,
    /// The attempt's error message, once it has failed.
    pub error: Option<String>,
    /// Approximate size in bytes of the recorded output.
    pub output_bytes: u64,
}

impl NodeAttempt {
    /// Start a new attempt at `now`.
    #[must_use]
    pub fn new(attempt_number: u32, idempotency_key: IdempotencyKey, now: DateTime<Utc>) -> Self {
        Self {
            attempt_number,
            idempotency_key,
            started_at: now,
            completed_at: None,
            output: None,
            error: None,
            output_bytes: 0,
        }
    }

    /// Mark the attempt successful at `now`.
    pub fn complete_success(&mut self, output: ExecutionOutput, output_bytes: u64, now: DateTime<Utc>) {
        self.output = Some(output);
        self.output_bytes = output_bytes;
        self.completed_at = Some(now);
    }

    /// Mark the attempt failed at `now`.
    pub fn complete_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.error = Some(error.into());
        self.completed_at = Some(now);
    }

    /// Returns `true` if the attempt has reached a terminal outcome.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Returns `true` if the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.is_complete() && self.error.is_none()
    }

    /// Returns `true` if the attempt failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Wall-clock duration of the attempt, once complete.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::{ExecutionId, NodeId};
    use serde_json::json;

    fn key() -> IdempotencyKey {
        IdempotencyKey::generate(ExecutionId::v4(), NodeId::v4(), 0)
    }

    #[test]
    fn new_attempt_is_incomplete() {
        let attempt = NodeAttempt::new(0, key(), Utc::now());
        assert!(!attempt.is_complete());
        assert!(!attempt.is_success());
        assert!(!attempt.is_failure());
    }

    #[test]
    fn complete_success_sets_output_and_timestamp() {
        let mut attempt = NodeAttempt::new(0, key(), Utc::now());
        attempt.complete_success(ExecutionOutput::inline(json!({"ok": true})), 12, Utc::now());
        assert!(attempt.is_complete());
        assert!(attempt.is_success());
        assert!(!attempt.is_failure());
        assert_eq!(attempt.output_bytes, 12);
    }

    #[test]
    fn complete_failure_sets_error() {
        let mut attempt = NodeAttempt::new(0, key(), Utc::now());
        attempt.complete_failure("boom", Utc::now());
        assert!(attempt.is_complete());
        assert!(attempt.is_failure());
        assert!(!attempt.is_success());
        assert_eq!(attempt.error.as_deref(), Some("boom"));
    }

    #[test]
    fn duration_none_while_incomplete() {
        let attempt = NodeAttempt::new(0, key(), Utc::now());
        assert!(attempt.duration().is_none());
    }

    #[test]
    fn duration_some_once_complete() {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(250);
        let mut attempt = NodeAttempt::new(0, key(), start);
        attempt.complete_failure("x", end);
        assert_eq!(attempt.duration(), Some(chrono::Duration::milliseconds(250)));
    }

    #[test]
    fn attempt_number_preserved() {
        let attempt = NodeAttempt::new(3, key(), Utc::now());
        assert_eq!(attempt.attempt_number, 3);
    }

    #[test]
    fn idempotency_key_preserved() {
        let k = key();
        let attempt = NodeAttempt::new(0, k.clone(), Utc::now());
        assert_eq!(attempt.idempotency_key, k);
    }

    #[test]
    fn serde_roundtrip() {
        let mut attempt = NodeAttempt::new(1, key(), Utc::now());
        attempt.complete_success(ExecutionOutput::inline(json!([1, 2, 3])), 7, Utc::now());
        let json = serde_json::to_string(&attempt).unwrap();
        let back: NodeAttempt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attempt_number, 1);
        assert_eq!(back.output_bytes, 7);
    }

    #[test]
    fn failure_then_never_success() {
        let mut attempt = NodeAttempt::new(0, key(), Utc::now());
        attempt.complete_failure("nope", Utc::now());
        assert!(attempt.output.is_none());
    }
}
