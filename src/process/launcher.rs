//! Process launcher.
//!
//! Turns a claimed [`ArtifactDescriptor`] into a running child process:
//! - The configured runtime is invoked with the artifact location and entry
//!   point substituted into its argument template; no user arguments.
//! - All three standard streams are piped; nothing is inherited.
//! - `kill_on_drop(true)` so a dropped handle never leaks a process.
//! - Programs flagged by [`is_long_running`] get a bounded wait on exit
//!   before their output is wired up. If the bound elapses the process is
//!   killed and the session is marked `TimedOut`. Teardown can cut the wait
//!   short through the launch's cancellation token.
//!
//! [`attach`] then starts both pumps, the stdin writer and the exit watcher
//! and packages the handles as a [`SessionEntry`] for the registry.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{LaunchConfig, LongRunningConfig, ARTIFACT_PLACEHOLDER, ENTRY_POINT_PLACEHOLDER};
use crate::models::artifact::ArtifactDescriptor;
use crate::models::event::{EventSink, OutboundEvent, StreamTag};
use crate::models::session::SessionState;
use crate::process::exit::spawn_exit_watcher;
use crate::process::heuristic::is_long_running;
use crate::process::pump::run_pump;
use crate::process::stdin::{run_writer, INPUT_BUFFER};
use crate::session::registry::SessionEntry;
use crate::session::state::StateCell;
use crate::{AppError, Result};

/// A spawned process whose output is not wired yet.
#[derive(Debug)]
pub struct LaunchedProcess {
    /// Session the process belongs to.
    pub session_id: String,
    /// Process handle; may already have exited.
    pub child: Child,
    /// Program stdin.
    pub stdin: ChildStdin,
    /// Program stdout.
    pub stdout: ChildStdout,
    /// Program stderr.
    pub stderr: ChildStderr,
    /// OS process id, if the process was still alive when spawned.
    pub pid: Option<u32>,
    /// Whether the long-running policy applied to this process.
    pub flagged: bool,
}

/// Spawns artifacts according to the launch and long-running policies.
#[derive(Debug, Clone)]
pub struct Launcher {
    launch: LaunchConfig,
    long_running: LongRunningConfig,
}

impl Launcher {
    /// Create a launcher.
    #[must_use]
    pub fn new(launch: LaunchConfig, long_running: LongRunningConfig) -> Self {
        Self {
            launch,
            long_running,
        }
    }

    /// Whether `source` gets the bounded wait.
    #[must_use]
    pub fn is_flagged(&self, source: &str) -> bool {
        self.long_running.apply_to_all || is_long_running(source, &self.long_running.markers)
    }

    /// Runtime arguments for an artifact, placeholders substituted.
    #[must_use]
    pub fn arguments(&self, entry_point: &str, location: &Path) -> Vec<String> {
        let location = location.to_string_lossy();
        self.launch
            .args
            .iter()
            .map(|arg| {
                arg.replace(ARTIFACT_PLACEHOLDER, &location)
                    .replace(ENTRY_POINT_PLACEHOLDER, entry_point)
            })
            .collect()
    }

    /// Spawn the process for `descriptor` and apply the timeout policy.
    ///
    /// Moves `state` to `Running`, then to `Exited` or `TimedOut` if the
    /// bounded wait settles the process. A timeout sends one `Info` event.
    /// When `cancel` fires during the bounded wait the process is killed
    /// and reaped before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::LaunchFailed`] if the descriptor is not runnable,
    /// the spawn fails, a standard stream cannot be captured, or `cancel`
    /// fired before the process was handed over.
    pub async fn launch(
        &self,
        descriptor: &ArtifactDescriptor,
        events: &EventSink,
        state: &StateCell,
        cancel: &CancellationToken,
    ) -> Result<LaunchedProcess> {
        let session_id = descriptor.session_id().to_owned();
        let span = info_span!("launch", session_id = session_id.as_str());

        async move {
            let (entry_point, location) = descriptor.runnable().ok_or_else(|| {
                AppError::LaunchFailed("artifact is missing or was not compiled successfully".into())
            })?;
            if cancel.is_cancelled() {
                return Err(AppError::LaunchFailed("launch cancelled before spawn".into()));
            }

            let mut cmd = Command::new(&self.launch.program);
            cmd.args(self.arguments(entry_point, location));
            if self.launch.working_dir_is_artifact {
                cmd.current_dir(location);
            }
            cmd.stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd.spawn().map_err(|err| {
                AppError::LaunchFailed(format!("failed to spawn {}: {err}", self.launch.program))
            })?;

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| AppError::LaunchFailed("failed to capture stdin".into()))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| AppError::LaunchFailed("failed to capture stdout".into()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| AppError::LaunchFailed("failed to capture stderr".into()))?;

            let pid = child.id();
            state.transition(SessionState::Running);
            info!(pid, entry_point, program = %self.launch.program, "process spawned");

            let flagged = self.is_flagged(descriptor.original_source());
            if flagged {
                self.bounded_wait(&session_id, &mut child, events, state, cancel)
                    .await?;
            }

            Ok(LaunchedProcess {
                session_id,
                child,
                stdin,
                stdout,
                stderr,
                pid,
                flagged,
            })
        }
        .instrument(span)
        .await
    }

    /// Wait up to the configured bound for `child` to exit; kill it otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::LaunchFailed`] when `cancel` fires first; the
    /// child has been killed and reaped by then.
    async fn bounded_wait(
        &self,
        session_id: &str,
        child: &mut Child,
        events: &EventSink,
        state: &StateCell,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let bound = self.long_running.timeout();
        info!(session_id, ?bound, "long-running program suspected, waiting for exit");

        let waited = tokio::select! {
            waited = tokio::time::timeout(bound, child.wait()) => waited,
            () = cancel.cancelled() => {
                info!(session_id, "teardown during bounded wait, killing program");
                if let Err(err) = child.kill().await {
                    warn!(session_id, %err, "failed to kill program during teardown");
                }
                return Err(AppError::LaunchFailed("launch cancelled by teardown".into()));
            }
        };

        match waited {
            Ok(Ok(status)) => {
                info!(session_id, ?status, "flagged program exited within bound");
                state.transition(SessionState::Exited);
            }
            Ok(Err(err)) => {
                warn!(session_id, %err, "error waiting for flagged program");
            }
            Err(_elapsed) => {
                warn!(session_id, ?bound, "flagged program still running, forcing termination");
                if let Err(err) = child.kill().await {
                    warn!(session_id, %err, "failed to kill timed-out program");
                }
                state.transition(SessionState::TimedOut);
                let notice = OutboundEvent::timed_out(self.long_running.timeout_seconds);
                if events.send(notice).await.is_err() {
                    warn!(session_id, "event channel closed before timeout notice");
                }
            }
        }
        Ok(())
    }
}

/// Start both pumps, the stdin writer and the exit watcher for `launched`.
#[must_use]
pub fn attach(
    launched: LaunchedProcess,
    events: EventSink,
    state: StateCell,
    artifact_location: Option<PathBuf>,
) -> SessionEntry {
    let LaunchedProcess {
        session_id,
        child,
        stdin,
        stdout,
        stderr,
        pid,
        ..
    } = launched;

    let shutdown = CancellationToken::new();
    let pumps = TaskTracker::new();
    pumps.spawn(run_pump(
        session_id.clone(),
        stdout,
        StreamTag::Stdout,
        events.clone(),
        shutdown.clone(),
    ));
    pumps.spawn(run_pump(
        session_id.clone(),
        stderr,
        StreamTag::Stderr,
        events.clone(),
        shutdown.clone(),
    ));
    pumps.close();

    let (input, input_rx) = mpsc::channel(INPUT_BUFFER);
    let writer = tokio::spawn(run_writer(
        session_id.clone(),
        stdin,
        input_rx,
        events.clone(),
        shutdown.clone(),
    ));

    let exit_watcher = spawn_exit_watcher(
        session_id,
        child,
        state.clone(),
        events.clone(),
        pumps.clone(),
        shutdown.clone(),
    );

    SessionEntry {
        state,
        events,
        input,
        pid,
        shutdown,
        pumps,
        exit_watcher,
        writer,
        artifact_location,
    }
}
