//! The event bus: broadcast fan-out of execution lifecycle events.
//!
//! Events are **projections**, not the source of truth — the execution
//! state held by the supervisor is authoritative. Delivery is best-effort;
//! consumers must tolerate drops and must only rely on ordering within a
//! single `node_id`.

use std::sync::atomic::{AtomicU64, Ordering};

use kestrel_core::{ExecutionId, HitlRequestId, NodeId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Execution lifecycle event, emitted by the Graph Runner and Supervisor
/// as an execution progresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum KernelEvent {
    /// A new execution was created and is about to start.
    ExecutionCreated {
        /// The execution identifier.
        execution_id: ExecutionId,
    },
    /// The execution's top-level status changed.
    StateChanged {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The new status, as its `Display` string (e.g. `"running"`).
        state: String,
    },
    /// A node began executing.
    NodeStarted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
    },
    /// A node completed successfully.
    NodeCompleted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
        /// The output handle the node selected.
        output_handle: String,
        /// Wall-clock duration of the final attempt, in milliseconds.
        duration_ms: u64,
        /// `true` if the emitted output was truncated for size.
        truncated_output: bool,
    },
    /// A node exhausted its retries without completing.
    NodeFailed {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
        /// A coarse classification of the failure (e.g. `"fatal"`, `"timeout"`).
        error_kind: String,
        /// Human-readable error message.
        message: String,
    },
    /// A node requested human input and the execution is waiting on it.
    HitlRequested {
        /// The request identifier used to submit a response.
        request_id: HitlRequestId,
        /// The kind of request (e.g. `"approval"`, `"input"`).
        kind: String,
        /// Message shown to the human reviewer.
        message: String,
        /// Allowed response options, if constrained.
        options: Vec<String>,
    },
    /// A pending human-in-the-loop request was resolved.
    HitlResolved {
        /// The request identifier that was resolved.
        request_id: HitlRequestId,
        /// The response payload submitted.
        response: serde_json::Value,
    },
    /// The execution reached a successful terminal state.
    ExecutionCompleted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The execution's final output.
        output: serde_json::Value,
    },
    /// The execution reached a failed terminal state.
    ExecutionFailed {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// Coarse error classification.
        error_kind: String,
        /// The node whose failure terminated the execution, if any.
        failing_node_id: Option<NodeId>,
        /// Human-readable error message.
        message: String,
    },
    /// The execution was cancelled.
    ExecutionCancelled {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// Why the execution was cancelled.
        reason: String,
    },
}

/// Broadcast-based event bus.
///
/// Delivers events to all active subscribers. If no subscribers are
/// listening, events are silently dropped.
pub struct EventBus {
    sender: broadcast::Sender<KernelEvent>,
    emitted: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity. When the
    /// channel is full, the oldest buffered events are dropped for lagging
    /// subscribers (they observe a lag and resume from the next event).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Returns silently if none are
    /// listening.
    pub fn emit(&self, event: KernelEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Total number of events emitted since creation.
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of currently active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Subscription handle for receiving events from an [`EventBus`].
pub struct EventSubscriber {
    receiver: broadcast::Receiver<KernelEvent>,
}

impl EventSubscriber {
    /// Receive the next event, skipping past any lag gaps.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<KernelEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Option<KernelEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
