//! Exit watcher and exit-code policy.
//!
//! One watcher task per session owns the [`Child`]. It publishes a single
//! `Finished` event however the process ends: natural exit, a kill after the
//! long-running timeout, or a kill requested by teardown through the
//! session's cancellation token.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::models::event::{EventSink, OutboundEvent};
use crate::models::session::SessionState;
use crate::session::state::StateCell;

/// How long the watcher lets the pumps drain buffered output before it
/// reports the exit code.
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Exit code reported for `status`; a signal death maps to `128 + signal`.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    signal_of(status).map_or(-1, |signal| 128 + signal)
}

#[cfg(unix)]
fn signal_of(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: ExitStatus) -> Option<i32> {
    None
}

/// `true` when `code` means "killed by the forced-termination signal".
///
/// Both SIGKILL (what a forced kill sends) and SIGTERM count; runtimes that
/// wrap the program may re-raise either as `128 + signal`.
#[cfg(unix)]
#[must_use]
pub fn is_termination_code(code: i32) -> bool {
    use nix::sys::signal::Signal;
    code == 128 + Signal::SIGKILL as i32 || code == 128 + Signal::SIGTERM as i32
}

/// `true` when `code` means "killed by the forced-termination call".
#[cfg(not(unix))]
#[must_use]
pub fn is_termination_code(code: i32) -> bool {
    code == 1
}

/// Whether a `Finished` event should be sent for `code`.
///
/// After a timeout kill the client already got the timeout notice, so the
/// expected termination code is not reported a second time.
#[must_use]
pub fn should_report_exit(state: SessionState, code: i32) -> bool {
    !(state == SessionState::TimedOut && is_termination_code(code))
}

/// Spawn the watcher for `child`.
///
/// When `shutdown` fires before the process exits, the process is killed.
/// The returned handle resolves to the exit code once the process is gone,
/// or `None` if waiting on it failed.
#[must_use]
pub fn spawn_exit_watcher(
    session_id: String,
    mut child: Child,
    state: StateCell,
    events: EventSink,
    pumps: TaskTracker,
    shutdown: CancellationToken,
) -> JoinHandle<Option<i32>> {
    tokio::spawn(async move {
        let result = tokio::select! {
            result = child.wait() => result,
            () = shutdown.cancelled() => {
                debug!(session_id, "exit watcher: teardown requested, killing process");
                if let Err(err) = child.start_kill() {
                    debug!(session_id, %err, "exit watcher: kill skipped");
                }
                child.wait().await
            }
        };

        let status = match result {
            Ok(status) => status,
            Err(err) => {
                warn!(session_id, %err, "exit watcher: error waiting for process");
                return None;
            }
        };
        let code = exit_code(status);
        state.transition(SessionState::Exited);

        tokio::select! {
            () = pumps.wait() => {}
            () = shutdown.cancelled() => {}
            () = tokio::time::sleep(DRAIN_GRACE) => {
                debug!(session_id, "exit watcher: output still open after drain grace");
            }
        }

        let current = state.get();
        if should_report_exit(current, code) {
            if events.send(OutboundEvent::Finished(code)).await.is_err() {
                debug!(session_id, "exit watcher: event channel closed before exit was reported");
            }
        } else {
            debug!(session_id, exit_code = code, "exit watcher: expected kill code after timeout, not reported");
        }

        info!(session_id, exit_code = code, state = ?current, "process exited");
        Some(code)
    })
}
