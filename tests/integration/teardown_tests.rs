//! Teardown idempotency and resource release.

use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;

use exec_console::models::event::OutboundEvent;
use exec_console::models::session::SessionState;
use exec_console::session::controller::MSG_INPUT_FAILED;

use super::test_helpers::{collect_for, collect_until_finished, controller, sh_launcher, stage};

#[tokio::test]
async fn concurrent_teardown_releases_once() {
    let ctl = controller(sh_launcher(10));
    let root = stage(&ctl, "s-td", "exec sleep 30\n").await;
    let (tx, mut rx) = mpsc::channel(16);
    ctl.open("s-td", &tx).await.unwrap();
    let state = ctl.registry().state_of("s-td").await.expect("live");

    let results = join_all((0..8).map(|_| ctl.teardown("s-td"))).await;

    assert_eq!(results.iter().filter(|done| **done).count(), 1);
    assert_eq!(state.get(), SessionState::TornDown);
    assert!(ctl.registry().is_empty().await);
    assert!(!root.path().join("artifact").exists());

    // One kill means exactly one exit report, whatever the number of callers.
    let events = collect_for(&mut rx, Duration::from_millis(500)).await;
    let finished = events
        .iter()
        .filter(|event| matches!(event, OutboundEvent::Finished(_)))
        .count();
    assert_eq!(finished, 1, "events after teardown: {events:?}");
    assert!(!events.iter().any(|event| matches!(event, OutboundEvent::Error(_))));
}

#[tokio::test]
async fn teardown_of_unknown_session_is_noop() {
    let ctl = controller(sh_launcher(10));
    assert!(!ctl.teardown("never-opened").await);
    assert!(!ctl.teardown("never-opened").await);
}

#[tokio::test]
async fn teardown_kills_running_program() {
    let ctl = controller(sh_launcher(10));
    let _root = stage(&ctl, "s-kill", "echo started\nexec sleep 30\n").await;
    let (tx, mut rx) = mpsc::channel(16);
    ctl.open("s-kill", &tx).await.unwrap();
    assert_eq!(rx.recv().await, Some(OutboundEvent::Stdout("started".into())));

    let done = tokio::time::timeout(Duration::from_secs(5), ctl.teardown("s-kill"))
        .await
        .expect("teardown is bounded");

    assert!(done);
    assert!(!ctl.registry().contains("s-kill").await);
}

#[tokio::test]
async fn teardown_after_natural_exit() {
    let ctl = controller(sh_launcher(10));
    let _root = stage(&ctl, "s-nat", "echo bye\n").await;
    let (tx, mut rx) = mpsc::channel(16);
    ctl.open("s-nat", &tx).await.unwrap();
    let state = ctl.registry().state_of("s-nat").await.unwrap();

    let events = collect_until_finished(&mut rx, Duration::from_secs(10)).await;
    assert_eq!(events.last(), Some(&OutboundEvent::Finished(0)));
    assert_eq!(state.get(), SessionState::Exited);

    assert!(ctl.teardown("s-nat").await);
    assert_eq!(state.get(), SessionState::TornDown);
    assert!(!ctl.teardown("s-nat").await);
}

#[tokio::test]
async fn teardown_discards_unclaimed_artifact() {
    let ctl = controller(sh_launcher(10));
    let root = stage(&ctl, "s-unclaimed", "echo never\n").await;

    assert!(!ctl.teardown("s-unclaimed").await);

    assert!(ctl.store().is_empty().await);
    assert!(!root.path().join("artifact").exists());
}

#[tokio::test]
async fn shutdown_releases_every_session() {
    let ctl = controller(sh_launcher(10));
    let _a = stage(&ctl, "s-1", "exec sleep 30\n").await;
    let _b = stage(&ctl, "s-2", "exec sleep 30\n").await;
    let (tx, _rx) = mpsc::channel(16);
    ctl.open("s-1", &tx).await.unwrap();
    ctl.open("s-2", &tx).await.unwrap();

    assert_eq!(ctl.shutdown().await, 2);
    assert!(ctl.registry().is_empty().await);
}

#[tokio::test]
async fn input_to_program_not_reading_stdin_never_blocks() {
    let ctl = controller(sh_launcher(10));
    let _root = stage(&ctl, "s-full", "exec sleep 30\n").await;
    let (tx, _rx) = mpsc::channel(16);
    ctl.open("s-full", &tx).await.unwrap();

    // Far beyond the pipe buffer; the program never reads it.
    let payload = "x".repeat(1 << 20);
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(1), ctl.on_inbound_message("s-full", &payload, &tx))
            .await
            .expect("enqueue returns without waiting on the program")
            .expect("payload queued");
    }

    let done = tokio::time::timeout(Duration::from_secs(3), ctl.teardown("s-full"))
        .await
        .expect("teardown is not held up by the pending write");
    assert!(done);
    assert!(ctl.registry().is_empty().await);
}

#[tokio::test]
async fn input_beyond_queue_capacity_is_write_failed() {
    let ctl = controller(sh_launcher(10));
    let _root = stage(&ctl, "s-flood", "exec sleep 30\n").await;
    let (tx, mut rx) = mpsc::channel(16);
    ctl.open("s-flood", &tx).await.unwrap();

    let payload = "x".repeat(1 << 16);
    let mut refused = None;
    for _ in 0..256 {
        if let Err(err) = ctl.on_inbound_message("s-flood", &payload, &tx).await {
            refused = Some(err);
            break;
        }
    }

    assert!(matches!(refused, Some(exec_console::AppError::WriteFailed(_))));
    assert_eq!(rx.recv().await, Some(OutboundEvent::Error(MSG_INPUT_FAILED.into())));
    assert!(ctl.teardown("s-flood").await);
}
