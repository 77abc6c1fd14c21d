//! Session registry: the single source of truth for live sessions.
//!
//! Maps a session id to everything teardown must release. The map lock is
//! only held for insert/remove/lookup, never across process or stream I/O.
//! Input is only ever enqueued for the session's writer task.
//!
//! An id is first *reserved* (`Launching` slot) so that a second `open` for
//! the same id is rejected while the first is still spawning, then
//! *activated* with the live entry. Removing the slot is the idempotency
//! guard for teardown: whoever removes it owns the cleanup. A reservation
//! carries the tokens teardown needs to abort a launch in progress and to
//! wait until the opener has let go of the process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::models::event::EventSink;
use crate::session::state::StateCell;
use crate::{AppError, Result};

/// Resources owned by one live session.
#[derive(Debug)]
pub struct SessionEntry {
    /// Lifecycle state shared with the exit watcher.
    pub state: StateCell,
    /// Outbound channel for the session's client.
    pub events: EventSink,
    /// Queue feeding the session's stdin writer task.
    pub input: mpsc::Sender<String>,
    /// OS process id at spawn time.
    pub pid: Option<u32>,
    /// Fired by teardown: kills the process and stops the pumps.
    pub shutdown: CancellationToken,
    /// The stdout and stderr pump tasks.
    pub pumps: TaskTracker,
    /// Task that owns the child and reports its exit.
    pub exit_watcher: JoinHandle<Option<i32>>,
    /// Task that writes queued input to the program's stdin.
    pub writer: JoinHandle<Option<AppError>>,
    /// Compiled output to delete on teardown.
    pub artifact_location: Option<PathBuf>,
}

/// Claim on an id held by an `open` that is still launching.
#[derive(Debug, Clone, Default)]
pub struct Reservation {
    /// Fired by teardown: the launch must kill what it spawned and give up.
    pub cancel: CancellationToken,
    /// Fired by the opener once it no longer holds the process.
    pub settled: CancellationToken,
}

/// A registry slot.
#[derive(Debug)]
pub enum Slot {
    /// Id claimed by an `open` that is still launching.
    Launching(Reservation),
    /// Process running (or finished but not yet torn down).
    Live(SessionEntry),
}

/// Handles needed to forward one inbound payload.
#[derive(Debug, Clone)]
pub struct InputRoute {
    /// Queue feeding the stdin writer.
    pub input: mpsc::Sender<String>,
    /// Session state at lookup time.
    pub state: StateCell,
}

/// Concurrent map of session id to slot.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id` for a launch.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::DoubleOpen`] if the id is already reserved or live.
    pub async fn reserve(&self, session_id: &str) -> Result<Reservation> {
        let mut guard = self.slots.lock().await;
        if guard.contains_key(session_id) {
            return Err(AppError::DoubleOpen(format!(
                "session {session_id} already has a registered process"
            )));
        }
        let reservation = Reservation::default();
        guard.insert(session_id.to_owned(), Slot::Launching(reservation.clone()));
        Ok(reservation)
    }

    /// Replace the reservation for `session_id` with the live entry.
    ///
    /// # Errors
    ///
    /// Hands `entry` back if the reservation is gone (torn down mid-launch)
    /// or the slot is already live.
    pub async fn activate(
        &self,
        session_id: &str,
        entry: SessionEntry,
    ) -> std::result::Result<(), SessionEntry> {
        let mut guard = self.slots.lock().await;
        match guard.get_mut(session_id) {
            Some(slot) if matches!(slot, Slot::Launching(_)) => {
                *slot = Slot::Live(entry);
                Ok(())
            }
            _ => Err(entry),
        }
    }

    /// Drop a reservation that never became live. Live slots are left alone.
    pub async fn release(&self, session_id: &str) {
        let mut guard = self.slots.lock().await;
        if matches!(guard.get(session_id), Some(Slot::Launching(_))) {
            guard.remove(session_id);
        }
    }

    /// Remove whatever occupies `session_id`.
    pub async fn remove(&self, session_id: &str) -> Option<Slot> {
        self.slots.lock().await.remove(session_id)
    }

    /// Stdin route for a live session.
    pub async fn input_route(&self, session_id: &str) -> Option<InputRoute> {
        match self.slots.lock().await.get(session_id) {
            Some(Slot::Live(entry)) => Some(InputRoute {
                input: entry.input.clone(),
                state: entry.state.clone(),
            }),
            _ => None,
        }
    }

    /// State handle for a live session.
    pub async fn state_of(&self, session_id: &str) -> Option<StateCell> {
        match self.slots.lock().await.get(session_id) {
            Some(Slot::Live(entry)) => Some(entry.state.clone()),
            _ => None,
        }
    }

    /// Whether `session_id` has a live entry.
    pub async fn is_live(&self, session_id: &str) -> bool {
        matches!(self.slots.lock().await.get(session_id), Some(Slot::Live(_)))
    }

    /// Whether `session_id` is reserved or live.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.slots.lock().await.contains_key(session_id)
    }

    /// Ids of every reserved or live session.
    pub async fn ids(&self) -> Vec<String> {
        self.slots.lock().await.keys().cloned().collect()
    }

    /// Number of reserved or live sessions.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// `true` when no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
