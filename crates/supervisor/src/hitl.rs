//! Human-in-the-loop request modeling and the one-shot rendezvous used to
//! deliver a response (or a timeout) back to the waiting `ask_human` call.

use chrono::{DateTime, Utc};
use kestrel_core::{ExecutionId, HitlRequestId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// The kind of human input a node is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlKind {
    /// A yes/no or option-constrained approval gate.
    Approval,
    /// A free-form or option-constrained clarification request.
    Clarification,
    /// A request to decide how to recover from a node failure.
    ErrorRecovery,
}

/// Lifecycle status of one [`HitlRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStatus {
    /// Awaiting a response.
    Pending,
    /// A response was delivered.
    Responded,
    /// No response arrived before the configured timeout.
    TimedOut,
    /// The owning execution was cancelled before a response arrived.
    Cancelled,
}

/// One human-in-the-loop request, as exposed to callers (e.g. a "pending
/// approvals" list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlRequest {
    /// This request's identifier.
    pub id: HitlRequestId,
    /// The execution that is blocked on this request.
    pub execution_id: ExecutionId,
    /// The user authorized to respond.
    pub user_id: UserId,
    /// What kind of input is being requested.
    pub kind: HitlKind,
    /// Short title shown to the reviewer.
    pub title: String,
    /// The message/prompt shown to the reviewer.
    pub message: String,
    /// Allowed response options; empty means free-form.
    pub options: Vec<String>,
    /// How long to wait before the request times out.
    pub timeout_seconds: u64,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: HitlStatus,
    /// The response payload, once `status` is `Responded`.
    pub response: Option<serde_json::Value>,
}

/// Server-side bookkeeping for a request awaiting a response: the public
/// [`HitlRequest`] record plus the one-shot channel that wakes the
/// `ask_human` caller.
pub struct PendingHitl {
    /// The public request record, kept in sync with `status`/`response`.
    pub request: HitlRequest,
    sender: Option<oneshot::Sender<serde_json::Value>>,
}

impl PendingHitl {
    /// Create a pending request with its delivery channel.
    #[must_use]
    pub fn new(request: HitlRequest) -> (Self, oneshot::Receiver<serde_json::Value>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                request,
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Deliver a response, marking the request `Responded`.
    ///
    /// Returns `false` if the request was not `Pending` (already
    /// responded, timed out, or cancelled) or if the waiter has gone away.
    pub fn respond(&mut self, response: serde_json::Value) -> bool {
        if self.request.status != HitlStatus::Pending {
            return false;
        }
        let Some(sender) = self.sender.take() else {
            return false;
        };
        if sender.send(response.clone()).is_err() {
            return false;
        }
        self.request.status = HitlStatus::Responded;
        self.request.response = Some(response);
        true
    }

    /// Mark the request as no longer pending without delivering a value
    /// (timeout or cancellation); drops the sender so the waiter's
    /// receiver resolves to an error.
    pub fn close(&mut self, status: HitlStatus) {
        self.request.status = status;
        self.sender = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HitlRequest {
        HitlRequest {
            id: HitlRequestId::v4(),
            execution_id: ExecutionId::v4(),
            user_id: UserId::v4(),
            kind: HitlKind::Approval,
            title: "Approve refund".into(),
            message: "Refund $50 to customer?".into(),
            options: vec!["yes".into(), "no".into()],
            timeout_seconds: 300,
            created_at: Utc::now(),
            status: HitlStatus::Pending,
            response: None,
        }
    }

    #[tokio::test]
    async fn respond_delivers_through_channel() {
        let (mut pending, receiver) = PendingHitl::new(request());
        assert!(pending.respond(serde_json::json!("yes")));
        assert_eq!(pending.request.status, HitlStatus::Responded);
        assert_eq!(receiver.await.unwrap(), serde_json::json!("yes"));
    }

    #[test]
    fn respond_twice_fails_second_time() {
        let (mut pending, _receiver) = PendingHitl::new(request());
        assert!(pending.respond(serde_json::json!("yes")));
        assert!(!pending.respond(serde_json::json!("no")));
    }

    #[tokio::test]
    async fn close_drops_sender_and_errors_receiver() {
        let (mut pending, receiver) = PendingHitl::new(request());
        pending.close(HitlStatus::TimedOut);
        assert_eq!(pending.request.status, HitlStatus::TimedOut);
        assert!(receiver.await.is_err());
    }
}
