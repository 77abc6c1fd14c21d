//! Session controller: open, relay, teardown.
//!
//! Every fault on behalf of a session is turned into an `Error` event on
//! that session's channel and returned to the caller for logging. Nothing
//! here panics or affects other sessions.

use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::models::event::{EventSink, OutboundEvent};
use crate::models::session::SessionState;
use crate::process::launcher::{attach, Launcher};
use crate::process::stdin::INPUT_FAILED_NOTICE;
use crate::session::registry::{Reservation, SessionEntry, SessionRegistry, Slot};
use crate::session::state::StateCell;
use crate::store::{discard_artifact, ArtifactStore};
use crate::{AppError, Result};

/// Sent when an attach carries no session id.
pub const MSG_ID_REQUIRED: &str = "ExecutionId is required.";
/// Sent when no descriptor waits under the id.
pub const MSG_NO_ARTIFACT: &str =
    "No compilation data found for this execution. It might have expired or failed.";
/// Sent when the descriptor is a failed compilation.
pub const MSG_COMPILE_FAILED: &str = "Compilation was not successful. Cannot start process.";
/// Sent when the id already has a process.
pub const MSG_ALREADY_RUNNING: &str = "A program is already running for this execution.";
/// Sent when the process could not be started.
pub const MSG_LAUNCH_FAILED: &str = "Could not start the program.";
/// Sent when input arrives and no process is registered.
pub const MSG_NOT_RUNNING: &str = "Program is not running or not accepting input.";
/// Sent when input could not be handed to the program.
pub const MSG_INPUT_FAILED: &str = INPUT_FAILED_NOTICE;

/// Upper bound teardown waits for each of the launch, process, writer and pumps.
const TEARDOWN_WAIT: Duration = Duration::from_secs(5);

/// Orchestrates the lifecycle of interactive execution sessions.
#[derive(Debug, Clone)]
pub struct SessionController {
    store: ArtifactStore,
    registry: SessionRegistry,
    launcher: Launcher,
}

impl SessionController {
    /// Create a controller over shared store and registry.
    #[must_use]
    pub fn new(store: ArtifactStore, registry: SessionRegistry, launcher: Launcher) -> Self {
        Self {
            store,
            registry,
            launcher,
        }
    }

    /// Descriptors waiting to be claimed.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Live sessions.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Claim the artifact for `session_id`, launch it and register the session.
    ///
    /// Returns the state reached by the launch: `Running`, or `Exited` /
    /// `TimedOut` when the long-running wait already settled the process.
    ///
    /// # Errors
    ///
    /// - [`AppError::SessionNotFound`] for an empty id.
    /// - [`AppError::DoubleOpen`] if the id already has a process.
    /// - [`AppError::ArtifactNotFound`] if no descriptor waits under the id.
    /// - [`AppError::LaunchFailed`] for a failed compilation or spawn.
    ///
    /// Each error has already been sent to `events` as an `Error` event.
    pub async fn open(&self, session_id: &str, events: &EventSink) -> Result<SessionState> {
        let span = info_span!("open_session", session_id);
        self.open_inner(session_id, events).instrument(span).await
    }

    async fn open_inner(&self, session_id: &str, events: &EventSink) -> Result<SessionState> {
        if session_id.trim().is_empty() {
            emit(session_id, events, OutboundEvent::Error(MSG_ID_REQUIRED.into())).await;
            return Err(AppError::SessionNotFound("session id is empty".into()));
        }

        let reservation = match self.registry.reserve(session_id).await {
            Ok(reservation) => reservation,
            Err(err) => {
                warn!(%err, "rejecting second open for live session");
                emit(session_id, events, OutboundEvent::Error(MSG_ALREADY_RUNNING.into())).await;
                return Err(err);
            }
        };
        // Teardown waits on this until every exit path below has run.
        let _settled = reservation.settled.clone().drop_guard();

        let state = StateCell::new(SessionState::AwaitingArtifact);

        let Some(descriptor) = self.store.take(session_id).await else {
            let err = AppError::ArtifactNotFound(format!("no artifact for session {session_id}"));
            return Err(self.reject(session_id, events, &state, MSG_NO_ARTIFACT, err).await);
        };

        if !descriptor.is_success() {
            let err = AppError::LaunchFailed(format!(
                "compilation failed with {} diagnostic(s)",
                descriptor.diagnostics().len()
            ));
            return Err(self.reject(session_id, events, &state, MSG_COMPILE_FAILED, err).await);
        }

        state.transition(SessionState::Launching);
        let artifact_location = descriptor.artifact_location().map(std::path::Path::to_path_buf);

        let launched = match self
            .launcher
            .launch(&descriptor, events, &state, &reservation.cancel)
            .await
        {
            Ok(launched) => launched,
            Err(err) => {
                if let Some(location) = &artifact_location {
                    discard_artifact(session_id, location).await;
                }
                if reservation.cancel.is_cancelled() {
                    info!(%err, "launch abandoned by teardown");
                    state.transition(SessionState::LaunchFailed);
                    state.transition(SessionState::TornDown);
                    return Err(AppError::SessionNotFound(format!(
                        "session {session_id} was torn down during launch"
                    )));
                }
                return Err(self.reject(session_id, events, &state, MSG_LAUNCH_FAILED, err).await);
            }
        };
        let flagged = launched.flagged;

        let entry = attach(launched, events.clone(), state.clone(), artifact_location);
        if let Err(entry) = self.registry.activate(session_id, entry).await {
            warn!("session torn down while launching, releasing process");
            release_entry(session_id, entry).await;
            return Err(AppError::SessionNotFound(format!(
                "session {session_id} was torn down during launch"
            )));
        }

        let reached = state.get();
        info!(state = ?reached, flagged, "session open");
        Ok(reached)
    }

    /// Report a failed open, end the state machine and free the reservation.
    async fn reject(
        &self,
        session_id: &str,
        events: &EventSink,
        state: &StateCell,
        message: &str,
        err: AppError,
    ) -> AppError {
        warn!(%err, "session open failed");
        emit(session_id, events, OutboundEvent::Error(message.into())).await;
        state.transition(SessionState::LaunchFailed);
        state.transition(SessionState::TornDown);
        self.registry.release(session_id).await;
        err
    }

    /// Queue one client payload for the session's program.
    ///
    /// Never waits on the program: the payload is handed to the session's
    /// writer task, which reports a failed write on the event channel
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::WriteFailed`] when no process is registered, the
    /// process has exited, the writer has stopped, or its queue is full. An
    /// `Error` event has already been sent to `events`.
    pub async fn on_inbound_message(
        &self,
        session_id: &str,
        payload: &str,
        events: &EventSink,
    ) -> Result<()> {
        let Some(route) = self.registry.input_route(session_id).await else {
            warn!(session_id, "input for a session without a process, discarded");
            emit(session_id, events, OutboundEvent::Error(MSG_NOT_RUNNING.into())).await;
            return Err(AppError::WriteFailed(format!(
                "no process registered for session {session_id}"
            )));
        };

        let state = route.state.get();
        if state != SessionState::Running {
            debug!(session_id, ?state, "input after process exit, discarded");
            emit(session_id, events, OutboundEvent::Error(MSG_INPUT_FAILED.into())).await;
            return Err(AppError::WriteFailed(format!("process is no longer running ({state:?})")));
        }

        match route.input.try_send(payload.to_owned()) {
            Ok(()) => Ok(()),
            Err(err) => {
                let reason = match err {
                    TrySendError::Full(_) => "input queue is full, program is not reading",
                    TrySendError::Closed(_) => "stdin writer has stopped",
                };
                warn!(session_id, reason, "input discarded");
                emit(session_id, events, OutboundEvent::Error(MSG_INPUT_FAILED.into())).await;
                Err(AppError::WriteFailed(reason.into()))
            }
        }
    }

    /// Release everything held for `session_id`.
    ///
    /// Safe to call any number of times, concurrently, and racing with the
    /// process's own exit: only the caller that removes the registry slot
    /// does the work. Returns `true` for that caller. A session caught
    /// mid-launch has its process killed and reaped before this returns.
    pub async fn teardown(&self, session_id: &str) -> bool {
        let span = info_span!("teardown", session_id);
        async {
            if let Some(descriptor) = self.store.take(session_id).await {
                if let Some(location) = descriptor.artifact_location() {
                    discard_artifact(session_id, location).await;
                }
            }

            match self.registry.remove(session_id).await {
                None => {
                    debug!("teardown: nothing registered");
                    false
                }
                Some(Slot::Launching(reservation)) => {
                    abort_launch(session_id, &reservation).await;
                    true
                }
                Some(Slot::Live(entry)) => {
                    release_entry(session_id, entry).await;
                    true
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Tear down every registered session. Returns how many were released.
    pub async fn shutdown(&self) -> usize {
        let ids = self.registry.ids().await;
        let released = join_all(ids.iter().map(|id| self.teardown(id))).await;
        let count = released.into_iter().filter(|done| *done).count();
        info!(count, "all sessions torn down");
        count
    }
}

/// Stop a launch in progress and wait until its opener has let go.
async fn abort_launch(session_id: &str, reservation: &Reservation) {
    reservation.cancel.cancel();
    if tokio::time::timeout(TEARDOWN_WAIT, reservation.settled.cancelled())
        .await
        .is_err()
    {
        warn!(session_id, "teardown: launch did not settle in time");
    } else {
        info!(session_id, "teardown: launch aborted");
    }
}

/// Kill the process if alive, wait for it, stop the tasks and delete storage.
async fn release_entry(session_id: &str, entry: SessionEntry) {
    let SessionEntry {
        state,
        input,
        pid,
        shutdown,
        pumps,
        mut exit_watcher,
        mut writer,
        artifact_location,
        ..
    } = entry;

    shutdown.cancel();
    drop(input);

    match tokio::time::timeout(TEARDOWN_WAIT, &mut exit_watcher).await {
        Ok(Ok(code)) => debug!(session_id, ?code, "teardown: process gone"),
        Ok(Err(err)) => warn!(session_id, %err, "teardown: exit watcher failed"),
        Err(_elapsed) => {
            warn!(session_id, ?pid, "teardown: process did not exit in time, abandoning it");
            exit_watcher.abort();
        }
    }

    if tokio::time::timeout(TEARDOWN_WAIT, pumps.wait()).await.is_err() {
        warn!(session_id, "teardown: pumps did not stop in time");
    }

    match tokio::time::timeout(TEARDOWN_WAIT, &mut writer).await {
        Ok(Ok(Some(err))) => debug!(session_id, %err, "teardown: stdin writer had failed"),
        Ok(Ok(None)) => {}
        Ok(Err(err)) => warn!(session_id, %err, "teardown: stdin writer failed"),
        Err(_elapsed) => {
            warn!(session_id, "teardown: stdin writer did not stop in time");
            writer.abort();
        }
    }

    if let Some(location) = artifact_location {
        discard_artifact(session_id, &location).await;
    }

    state.transition(SessionState::TornDown);
    info!(session_id, ?pid, "session torn down");
}

async fn emit(session_id: &str, events: &EventSink, event: OutboundEvent) {
    if events.send(event).await.is_err() {
        debug!(session_id, "event channel closed, dropping event");
    }
}
