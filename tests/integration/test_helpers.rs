//! Shared helpers for session integration tests.
//!
//! The runtime is `sh` and an artifact is a directory holding an executable
//! script named after its entry point, so scenarios run without a JDK.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use exec_console::config::{LaunchConfig, LongRunningConfig};
use exec_console::models::artifact::ArtifactDescriptor;
use exec_console::models::event::OutboundEvent;
use exec_console::process::launcher::Launcher;
use exec_console::session::controller::SessionController;
use exec_console::session::registry::SessionRegistry;
use exec_console::store::ArtifactStore;

pub const ENTRY_POINT: &str = "Main";

/// Marker that the default long-running policy flags.
pub const GUI_MARKER: &str = "import javax.swing.JFrame;";

/// Launcher that runs `sh <artifact>/<entry_point>`.
pub fn sh_launcher(timeout_seconds: u64) -> Launcher {
    Launcher::new(
        LaunchConfig {
            program: "sh".into(),
            args: vec!["{artifact}/{entry_point}".into()],
            working_dir_is_artifact: true,
        },
        LongRunningConfig {
            timeout_seconds,
            ..LongRunningConfig::default()
        },
    )
}

pub fn controller(launcher: Launcher) -> SessionController {
    SessionController::new(ArtifactStore::new(), SessionRegistry::new(), launcher)
}

/// Write `script` as the artifact for `session_id`.
///
/// The returned `TempDir` must outlive the session; teardown deletes the
/// artifact directory inside it.
pub fn script_artifact(session_id: &str, script: &str, source: &str) -> (TempDir, ArtifactDescriptor) {
    let root = tempfile::tempdir().expect("tempdir");
    let location: PathBuf = root.path().join("artifact");
    std::fs::create_dir(&location).expect("artifact dir");
    std::fs::write(location.join(ENTRY_POINT), script).expect("script");
    let descriptor = ArtifactDescriptor::succeeded(session_id, vec![], ENTRY_POINT, location, source);
    (root, descriptor)
}

/// Store a script artifact under `session_id`.
pub async fn stage(controller: &SessionController, session_id: &str, script: &str) -> TempDir {
    stage_with_source(controller, session_id, script, "public class Main {}").await
}

pub async fn stage_with_source(
    controller: &SessionController,
    session_id: &str,
    script: &str,
    source: &str,
) -> TempDir {
    let (root, descriptor) = script_artifact(session_id, script, source);
    controller.store().put(session_id, descriptor).await;
    root
}

/// Collect events until `Finished` arrives or `limit` elapses.
pub async fn collect_until_finished(
    rx: &mut mpsc::Receiver<OutboundEvent>,
    limit: Duration,
) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(limit, async {
        while let Some(event) = rx.recv().await {
            let done = matches!(event, OutboundEvent::Finished(_));
            events.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    events
}

/// Collect whatever arrives within `window`.
pub async fn collect_for(rx: &mut mpsc::Receiver<OutboundEvent>, window: Duration) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(window, async {
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
    })
    .await;
    events
}

/// Wait for the next event whose rendering equals `expected`.
pub async fn expect_line(rx: &mut mpsc::Receiver<OutboundEvent>, expected: &OutboundEvent) {
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            if &event == expected {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "did not receive {expected:?}");
}
