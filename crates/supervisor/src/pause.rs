//! The per-execution pause gate consulted at `before_node`.
//!
//! Pausing is cooperative: setting the flag does not interrupt a node
//! handler already running, it only blocks the runner before it dispatches
//! the *next* node.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A gate that `before_node` awaits on while an execution is paused.
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: AtomicBool,
    notify: Notify,
}

impl PauseGate {
    /// Construct a gate that starts open (not paused).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate: the next `wait` call blocks until `resume`.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Open the gate and wake anyone blocked in `wait`.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// `true` if the gate is currently closed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Block until the gate is open. A no-op if it already is.
    pub async fn wait(&self) {
        while self.paused.load(Ordering::SeqCst) {
            let notified = self.notify.notified();
            // Re-check after subscribing: `resume` between the load above
            // and this subscription would otherwise be missed.
            if !self.paused.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn starts_open() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_open() {
        let gate = PauseGate::new();
        tokio::time::timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("should not block");
    }

    #[tokio::test]
    async fn wait_blocks_until_resume() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();
        assert!(gate.is_paused());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.wait().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.resume();
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("waiter should complete after resume")
            .unwrap();
    }
}
