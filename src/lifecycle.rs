//! Server run state
//!
//! A single shared `Idle -> Running -> Stopped` flag observed by the acceptor
//! and every session. `Stopped` is terminal.

use std::sync::Arc;

use tokio::sync::watch;

/// Server run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

/// Shared handle to the run state
///
/// Cheap to clone; every clone observes the same state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<RunState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// Move `Idle -> Running`. Returns false if the server was already started or stopped.
    pub fn start(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == RunState::Idle {
                *state = RunState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Stopped`. Returns false if it was already stopped.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == RunState::Stopped {
                false
            } else {
                *state = RunState::Stopped;
                true
            }
        })
    }

    pub fn state(&self) -> RunState {
        *self.tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == RunState::Stopped
    }

    /// Resolves once the state becomes `Stopped`.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only errors if it is torn down mid-wait.
        let _ = rx.wait_for(|state| *state == RunState::Stopped).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), RunState::Idle);
        assert!(!lifecycle.is_running());

        assert!(lifecycle.start());
        assert!(lifecycle.is_running());
        assert!(!lifecycle.start());

        assert!(lifecycle.stop());
        assert!(lifecycle.is_stopped());
        assert!(!lifecycle.stop());
    }

    #[test]
    fn test_stopped_is_terminal() {
        let lifecycle = Lifecycle::new();
        lifecycle.stop();

        assert!(!lifecycle.start());
        assert_eq!(lifecycle.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_stopped_wakes_waiters() {
        let lifecycle = Lifecycle::new();
        lifecycle.start();

        let observer = lifecycle.clone();
        let waiter = tokio::spawn(async move { observer.stopped().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        lifecycle.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_returns_immediately_when_already_stopped() {
        let lifecycle = Lifecycle::new();
        lifecycle.stop();
        tokio::time::timeout(Duration::from_millis(100), lifecycle.stopped())
            .await
            .expect("already stopped");
    }
}
