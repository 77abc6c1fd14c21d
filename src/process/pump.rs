//! Stream pump: child stdout/stderr → outbound events.
//!
//! Each session runs two pumps, one per output stream. A pump forwards every
//! decoded line as an [`OutboundEvent`] tagged with its stream and stops at
//! end-of-stream. A read that fails because the pipe was torn down (the usual
//! result of a forced kill) ends the pump quietly. Any other read error is
//! reported once on the event channel and ends the pump; the other pump and
//! the session carry on.
//!
//! # Usage
//!
//! The launcher spawns [`run_pump`] twice per session on the session's
//! `TaskTracker`, once with [`StreamTag::Stdout`] and once with
//! [`StreamTag::Stderr`], sharing the session's cancellation token.

use std::io;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::event::{OutboundEvent, StreamTag};
use crate::process::codec::ConsoleLineCodec;
use crate::AppError;

// ── Public API ────────────────────────────────────────────────────────────────

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The stream reached end-of-file.
    Eof,
    /// The stream was closed underneath the reader.
    Closed,
    /// A read error was reported to the client.
    Fault,
    /// Nobody is listening for events any more.
    SinkClosed,
    /// Teardown stopped the pump.
    Cancelled,
}

/// `true` for read errors that mean "the other end went away".
#[must_use]
pub fn is_stream_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// Pump `source` line by line into `sink` until it ends or `cancel` fires.
///
/// Lines are framed by [`ConsoleLineCodec`]. The pump is not restartable:
/// once it returns, the stream is abandoned.
///
/// # Examples
///
/// ```rust,ignore
/// use exec_console::process::pump::{run_pump, PumpExit};
///
/// let exit = run_pump(id, child_stdout, StreamTag::Stdout, events, cancel).await;
/// assert_eq!(exit, PumpExit::Eof);
/// ```
pub async fn run_pump<R>(
    session_id: String,
    source: R,
    tag: StreamTag,
    sink: mpsc::Sender<OutboundEvent>,
    cancel: CancellationToken,
) -> PumpExit
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(source, ConsoleLineCodec::new());

    loop {
        let item = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, %tag, "pump: cancellation received, stopping");
                return PumpExit::Cancelled;
            }

            item = framed.next() => item,
        };

        let event = match item {
            None => {
                debug!(session_id, %tag, "pump: end of stream");
                return PumpExit::Eof;
            }
            Some(Err(err)) if is_stream_closed(&err) => {
                debug!(session_id, %tag, %err, "pump: stream closed");
                return PumpExit::Closed;
            }
            Some(Err(err)) => {
                warn!(session_id, %tag, %err, "pump: read failed, stopping");
                let fault = AppError::ReadFault(format!("program {tag}: {err}"));
                deliver(&sink, OutboundEvent::Error(fault.to_string()), &cancel).await;
                return PumpExit::Fault;
            }
            Some(Ok(line)) => OutboundEvent::line(tag, line),
        };

        match deliver(&sink, event, &cancel).await {
            Delivery::Sent => {}
            Delivery::Closed => {
                debug!(session_id, %tag, "pump: event channel closed, stopping");
                return PumpExit::SinkClosed;
            }
            Delivery::Cancelled => return PumpExit::Cancelled,
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

enum Delivery {
    Sent,
    Closed,
    Cancelled,
}

/// Send without outliving teardown: a full channel must not pin the pump.
async fn deliver(
    sink: &mpsc::Sender<OutboundEvent>,
    event: OutboundEvent,
    cancel: &CancellationToken,
) -> Delivery {
    tokio::select! {
        biased;

        () = cancel.cancelled() => Delivery::Cancelled,
        sent = sink.send(event) => {
            if sent.is_ok() {
                Delivery::Sent
            } else {
                Delivery::Closed
            }
        }
    }
}
