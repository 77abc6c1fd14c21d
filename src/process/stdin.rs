//! Stdin forwarder.
//!
//! Client payloads are line-oriented: each one becomes a single line on the
//! program's standard input. The write is flushed immediately since an
//! interactive program blocks on a read until the line arrives.
//!
//! # Usage
//!
//! Each session owns one [`run_writer`] task fed by an [`mpsc`] channel.
//! Dispatchers only enqueue, so a program that stops reading its stdin
//! stalls the writer task and nothing else. Teardown cancels the task even
//! while a write is pending.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::event::{EventSink, OutboundEvent};
use crate::{AppError, Result};

/// Notice sent to the client when a line could not be written.
pub const INPUT_FAILED_NOTICE: &str = "Could not send input to the program.";

/// Payloads queued per session before enqueueing is refused.
pub const INPUT_BUFFER: usize = 64;

// ── Public API ────────────────────────────────────────────────────────────────

/// Write `payload` plus a trailing newline to `stdin` and flush.
///
/// # Errors
///
/// Returns [`AppError::WriteFailed`] if the stream is closed or the process
/// has already exited.
pub async fn send<W>(session_id: &str, stdin: &mut W, payload: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.extend_from_slice(payload.as_bytes());
    bytes.push(b'\n');

    stdin.write_all(&bytes).await.map_err(|err| {
        warn!(session_id, %err, "stdin: write failed");
        AppError::WriteFailed(err.to_string())
    })?;
    stdin.flush().await.map_err(|err| {
        warn!(session_id, %err, "stdin: flush failed");
        AppError::WriteFailed(err.to_string())
    })?;

    debug!(session_id, bytes = bytes.len(), "stdin: payload forwarded");
    Ok(())
}

/// Per-session writer task: drains `input_rx` into `stdin` one line at a time.
///
/// The task exits when:
/// - `cancel` fires, including while a write is blocked on a full pipe;
/// - `input_rx` is closed (the session dropped its sender);
/// - a write fails. One `Error` event with [`INPUT_FAILED_NOTICE`] is sent
///   and the stream is dropped, so later enqueues see a closed channel.
///
/// Returns the write error that stopped the task, if any.
pub async fn run_writer<W>(
    session_id: String,
    mut stdin: W,
    mut input_rx: mpsc::Receiver<String>,
    events: EventSink,
    cancel: CancellationToken,
) -> Option<AppError>
where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let payload = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "stdin writer: cancellation received, stopping");
                return None;
            }

            payload = input_rx.recv() => match payload {
                Some(payload) => payload,
                None => {
                    debug!(session_id, "stdin writer: input channel closed, stopping");
                    return None;
                }
            },
        };

        let written = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "stdin writer: cancelled during pending write");
                return None;
            }

            written = send(&session_id, &mut stdin, &payload) => written,
        };

        if let Err(err) = written {
            let notice = OutboundEvent::Error(INPUT_FAILED_NOTICE.into());
            tokio::select! {
                biased;

                () = cancel.cancelled() => {}
                sent = events.send(notice) => {
                    if sent.is_err() {
                        debug!(session_id, "stdin writer: event channel closed");
                    }
                }
            }
            return Some(err);
        }
    }
}
