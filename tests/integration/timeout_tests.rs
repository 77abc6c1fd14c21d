//! Long-running program policy.

use std::time::Duration;

use tokio::sync::mpsc;

use exec_console::models::event::OutboundEvent;
use exec_console::models::session::SessionState;
use exec_console::AppError;

use super::test_helpers::{collect_for, collect_until_finished, controller, sh_launcher, stage_with_source, GUI_MARKER};

#[tokio::test]
async fn flagged_program_is_killed_after_bound() {
    let ctl = controller(sh_launcher(1));
    let _root = stage_with_source(&ctl, "s-gui", "exec sleep 30\n", GUI_MARKER).await;
    let (tx, mut rx) = mpsc::channel(16);

    let state = ctl.open("s-gui", &tx).await.expect("open");
    assert_eq!(state, SessionState::TimedOut);

    let events = collect_for(&mut rx, Duration::from_secs(3)).await;
    assert_eq!(events, vec![OutboundEvent::timed_out(1)]);
    assert!(!events.iter().any(|e| matches!(e, OutboundEvent::Finished(_))));

    assert!(ctl.teardown("s-gui").await);
}

#[tokio::test]
async fn flagged_program_finishing_in_time_is_not_killed() {
    let ctl = controller(sh_launcher(5));
    let _root = stage_with_source(&ctl, "s-quick", "echo quick\n", GUI_MARKER).await;
    let (tx, mut rx) = mpsc::channel(16);

    let state = ctl.open("s-quick", &tx).await.unwrap();
    assert_eq!(state, SessionState::Exited);

    let events = collect_until_finished(&mut rx, Duration::from_secs(5)).await;
    assert_eq!(
        events,
        vec![OutboundEvent::Stdout("quick".into()), OutboundEvent::Finished(0)]
    );
    ctl.teardown("s-quick").await;
}

#[tokio::test]
async fn unflagged_program_is_not_bounded() {
    let ctl = controller(sh_launcher(1));
    let _root = stage_with_source(&ctl, "s-cli", "exec sleep 30\n", "public class Main {}").await;
    let (tx, mut rx) = mpsc::channel(16);

    assert_eq!(ctl.open("s-cli", &tx).await.unwrap(), SessionState::Running);
    let events = collect_for(&mut rx, Duration::from_secs(2)).await;
    assert!(events.is_empty(), "no timeout for unflagged programs: {events:?}");
    assert_eq!(
        ctl.registry().state_of("s-cli").await.map(|s| s.get()),
        Some(SessionState::Running)
    );

    ctl.teardown("s-cli").await;
}

#[tokio::test]
async fn teardown_during_bounded_wait_kills_program() {
    let ctl = controller(sh_launcher(4));
    let root = stage_with_source(&ctl, "s-abort", "sleep 1\ntouch ../marker\nexec sleep 30\n", GUI_MARKER).await;
    let (tx, mut rx) = mpsc::channel(16);

    let opener = {
        let ctl = ctl.clone();
        let tx = tx.clone();
        tokio::spawn(async move { ctl.open("s-abort", &tx).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(ctl.registry().contains("s-abort").await, "still launching");

    let done = tokio::time::timeout(Duration::from_secs(2), ctl.teardown("s-abort"))
        .await
        .expect("teardown does not wait out the launch bound");
    assert!(done);

    let opened = tokio::time::timeout(Duration::from_secs(1), opener)
        .await
        .expect("open settles once teardown returns")
        .unwrap();
    assert!(matches!(opened, Err(AppError::SessionNotFound(_))));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!root.path().join("marker").exists(), "program outlived teardown");
    assert!(ctl.registry().is_empty().await);
    assert!(!root.path().join("artifact").exists());

    let events = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert!(events.is_empty(), "aborted launch reports nothing: {events:?}");
}
