//! System-wide limits and defaults.

use std::time::Duration;

/// Hard ceiling on loop-node iterations, enforced by the Graph Runner
/// regardless of any per-node `max_loop_count` configured in a workflow.
pub const SYSTEM_MAX_LOOPS: u64 = 1000;

/// Default per-node timeout when neither the node nor the workflow
/// overrides it.
pub const SYSTEM_DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Base delay for exponential retry backoff.
pub const RETRY_BACKOFF_BASE: Duration = Duration::from_secs(5);

/// Cap on retry backoff delay.
pub const RETRY_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Grace window the runner waits for an abandoned handler before forcing
/// a `CANCELLED` transition.
pub const CANCELLATION_GRACE_WINDOW: Duration = Duration::from_secs(5);
