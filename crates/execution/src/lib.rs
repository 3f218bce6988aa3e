#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Execution
//!
//! Runtime execution state, journals, idempotency, and planning for the
//! Kestrel workflow kernel.
//!
//! This crate models execution-time concepts — it does NOT drive them. It
//! defines:
//!
//! - [`ExecutionStatus`] — execution-level state machine (7 states)
//! - [`ExecutionState`] and [`NodeExecutionState`] — persistent state tracking
//! - [`ExecutionContext`] — runtime context with shared state and cancellation
//! - [`JournalEntry`] — audit log of execution events
//! - [`NodeOutput`] — node output data with metadata
//! - [`NodeAttempt`] — individual execution attempt tracking
//! - [`IdempotencyKey`] and [`IdempotencyManager`] — exactly-once guarantees
//! - State machine transitions validated by the [`transition`] module
//!
//! All timestamps here are parameters, never internally-captured `Utc::now()`
//! calls — callers thread a single `kestrel_core::Clock` reading through a
//! whole state transition so replay and tests stay deterministic.

pub mod attempt;
pub mod context;
pub mod error;
pub mod idempotency;
pub mod journal;
pub mod output;
pub mod state;
pub mod status;
pub mod transition;

pub use attempt::NodeAttempt;
pub use context::ExecutionContext;
pub use error::ExecutionError;
pub use idempotency::{IdempotencyKey, IdempotencyManager};
pub use journal::JournalEntry;
pub use output::{ExecutionOutput, NodeOutput};
pub use state::{ExecutionState, NodeExecutionState};
pub use status::ExecutionStatus;

/// Serde helper for `Option<Duration>` serialized as milliseconds.
pub(crate) mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(d)?;
        Ok(opt.map(Duration::from_millis))
    }
}
