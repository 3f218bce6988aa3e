//! Clock abstraction so execution timing is deterministic under test.
//!
//! The kernel never calls `Utc::now()` or `Instant::now()` directly outside
//! this module — every timestamp and timeout deadline is derived from a
//! `Clock` so tests can inject [`FixedClock`] or a manually-advanced fake
//! without sleeping real wall-clock time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of truth for "now", both wall-clock and monotonic.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time, used for timestamps recorded in state.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic instant used for timeout/backoff arithmetic.
    ///
    /// Expressed as milliseconds since an arbitrary, clock-specific epoch —
    /// callers only ever compare two values from the same `Clock`.
    fn monotonic_ms(&self) -> i64;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_ms(&self) -> i64 {
        // `Instant` isn't `Copy`-comparable across threads as an i64, so we
        // derive a monotonic counter from the wall clock; good enough for
        // timeout/backoff arithmetic which only needs relative deltas.
        Utc::now().timestamp_millis()
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only moves
/// when [`FixedClock::advance`] is called.
#[derive(Debug)]
pub struct FixedClock {
    start: DateTime<Utc>,
    elapsed_ms: AtomicI64,
}

impl FixedClock {
    /// Create a clock pinned at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            elapsed_ms: AtomicI64::new(0),
        }
    }

    /// Advance the clock by `delta`, affecting subsequent `now()`/`monotonic_ms()` calls.
    pub fn advance(&self, delta: Duration) {
        self.elapsed_ms
            .fetch_add(delta.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::milliseconds(self.elapsed_ms.load(Ordering::SeqCst))
    }

    fn monotonic_ms(&self) -> i64 {
        self.elapsed_ms.load(Ordering::SeqCst)
    }
}
