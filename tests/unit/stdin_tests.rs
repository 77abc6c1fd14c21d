use tokio::io::AsyncReadExt;

use exec_console::process::stdin::send;
use exec_console::AppError;

#[tokio::test]
async fn payload_is_written_as_one_line() {
    let (mut writer, mut reader) = tokio::io::duplex(64);

    send("s1", &mut writer, "Alice").await.expect("write succeeds");
    drop(writer);

    let mut received = String::new();
    reader.read_to_string(&mut received).await.unwrap();
    assert_eq!(received, "Alice\n");
}

#[tokio::test]
async fn empty_payload_is_a_bare_newline() {
    let (mut writer, mut reader) = tokio::io::duplex(64);

    send("s1", &mut writer, "").await.unwrap();
    drop(writer);

    let mut received = String::new();
    reader.read_to_string(&mut received).await.unwrap();
    assert_eq!(received, "\n");
}

#[tokio::test]
async fn closed_stream_is_write_failed() {
    let (mut writer, reader) = tokio::io::duplex(64);
    drop(reader);

    let err = send("s1", &mut writer, "Bob").await.unwrap_err();
    assert!(matches!(err, AppError::WriteFailed(_)));
}

mod writer {
    use std::time::Duration;

    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use exec_console::models::event::OutboundEvent;
    use exec_console::process::stdin::{run_writer, INPUT_FAILED_NOTICE};
    use exec_console::AppError;

    #[tokio::test]
    async fn queued_payloads_are_written_in_order() {
        let (stdin, mut program) = tokio::io::duplex(256);
        let (input_tx, input_rx) = mpsc::channel(8);
        let (events, _events_rx) = mpsc::channel(8);

        let writer = tokio::spawn(run_writer(
            "s1".into(),
            stdin,
            input_rx,
            events,
            CancellationToken::new(),
        ));
        input_tx.send("Alice".into()).await.unwrap();
        input_tx.send("Bob".into()).await.unwrap();
        drop(input_tx);

        assert!(writer.await.unwrap().is_none(), "closed queue is a clean stop");
        let mut received = String::new();
        program.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "Alice\nBob\n");
    }

    #[tokio::test]
    async fn failed_write_is_reported_once_and_stops_writer() {
        let (stdin, program) = tokio::io::duplex(64);
        drop(program);
        let (input_tx, input_rx) = mpsc::channel(8);
        let (events, mut events_rx) = mpsc::channel(8);

        let writer = tokio::spawn(run_writer(
            "s1".into(),
            stdin,
            input_rx,
            events,
            CancellationToken::new(),
        ));
        input_tx.send("lost".into()).await.unwrap();

        let stopped_by = writer.await.unwrap();
        assert!(matches!(stopped_by, Some(AppError::WriteFailed(_))));
        assert_eq!(
            events_rx.recv().await,
            Some(OutboundEvent::Error(INPUT_FAILED_NOTICE.into()))
        );
        assert!(events_rx.try_recv().is_err(), "exactly one error event");
        assert!(input_tx.send("later".into()).await.is_err(), "queue closed after failure");
    }

    #[tokio::test]
    async fn cancel_interrupts_blocked_write() {
        // The reading side exists but never reads, so the write blocks.
        let (stdin, _program) = tokio::io::duplex(16);
        let (input_tx, input_rx) = mpsc::channel(8);
        let (events, _events_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let writer = tokio::spawn(run_writer(
            "s1".into(),
            stdin,
            input_rx,
            events,
            cancel.clone(),
        ));
        input_tx.send("x".repeat(64 * 1024)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let stopped_by = tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("writer stops promptly")
            .unwrap();
        assert!(stopped_by.is_none());
    }
}
