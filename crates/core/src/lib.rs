#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Core
//!
//! Identifiers, the clock abstraction, and shared constants used by every
//! other crate in the Kestrel workflow execution kernel.

pub mod clock;
pub mod constants;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use constants::{
    CANCELLATION_GRACE_WINDOW, RETRY_BACKOFF_BASE, RETRY_BACKOFF_CAP, SYSTEM_DEFAULT_TIMEOUT,
    SYSTEM_MAX_LOOPS,
};
pub use id::{CredentialId, EdgeId, ExecutionId, HitlRequestId, NodeId, UserId, WorkflowId};
