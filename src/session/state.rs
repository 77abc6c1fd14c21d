//! Shared, observable session state.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::models::session::SessionState;

/// State of one session, shared by the controller, launcher and exit watcher.
///
/// Transitions are validated against [`SessionState::can_transition_to`];
/// an invalid request leaves the state untouched.
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<SessionState>>,
}

impl StateCell {
    /// Create a cell holding `initial`.
    #[must_use]
    pub fn new(initial: SessionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Move to `next` if the lifecycle allows it. Returns whether it moved.
    pub fn transition(&self, next: SessionState) -> bool {
        let moved = self.tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if !moved {
            debug!(current = ?self.get(), requested = ?next, "state transition ignored");
        }
        moved
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}
