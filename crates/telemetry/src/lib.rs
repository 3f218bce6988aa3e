#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Telemetry
//!
//! The event bus ([`EventBus`]/[`KernelEvent`]) used for lifecycle
//! notifications, and an in-memory [`MetricsRegistry`] for the kernel's
//! own operational counters.
//!
//! Events are **projections**, not the source of truth — execution state
//! held by the supervisor is authoritative.

pub mod event;
pub mod metrics;

pub use event::{EventBus, EventSubscriber, KernelEvent};
pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry};
