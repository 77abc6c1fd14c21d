//! WebSocket session endpoint.
//!
//! `GET /ws/execute?id=<execution id>` attaches the socket to a session.
//! Outbound events are written as text frames (`OutboundEvent::render`);
//! every inbound text frame becomes one line on the program's stdin.
//! A failed attach sends the error text and closes with a policy-violation
//! code (missing id: invalid-data). Closing the socket tears the session
//! down; output still queued at that point is flushed before the server's
//! close frame.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppState;
use crate::models::event::OutboundEvent;
use crate::session::controller::MSG_ID_REQUIRED;
use crate::AppError;

/// Outbound events buffered per session before pumps wait on the socket.
pub const EVENT_BUFFER: usize = 256;

/// How long a closing socket may spend flushing queued events.
const FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Query string of the attach request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteQuery {
    /// Execution id returned by `/compile`.
    pub id: Option<String>,
}

/// Handler for `GET /ws/execute`.
pub async fn execute(
    ws: WebSocketUpgrade,
    Query(query): Query<ExecuteQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let session_id = query.id.unwrap_or_default();
    ws.on_upgrade(move |socket| run_session(socket, state, session_id))
}

type Outbound = SplitSink<WebSocket, Message>;

async fn run_session(socket: WebSocket, state: Arc<AppState>, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    if session_id.trim().is_empty() {
        warn!("websocket attach without execution id");
        send_event(&mut sender, &OutboundEvent::Error(MSG_ID_REQUIRED.into())).await;
        close(&mut sender, close_code::INVALID, "ExecutionId missing").await;
        return;
    }

    let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
    info!(session_id, "websocket attached");

    if let Err(err) = state.controller.open(&session_id, &events_tx).await {
        // A failed open leaves no task holding a sender: drain what it queued.
        drop(events_tx);
        while let Some(event) = events_rx.recv().await {
            send_event(&mut sender, &event).await;
        }
        close(&mut sender, close_code::POLICY, close_reason(&err)).await;
        return;
    }

    let forward_id = session_id.clone();
    let mut forward = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if sender
                .send(Message::Text(event.render().into()))
                .await
                .is_err()
            {
                debug!(session_id = forward_id, "websocket send failed, stopping forwarder");
                return;
            }
        }
        close(&mut sender, close_code::NORMAL, "Session ended").await;
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Err(err) = state
                    .controller
                    .on_inbound_message(&session_id, text.as_str(), &events_tx)
                    .await
                {
                    debug!(session_id, %err, "inbound message not delivered");
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(session_id, %err, "websocket transport error");
                break;
            }
        }
    }

    info!(session_id, "websocket closed, tearing down session");
    state.controller.teardown(&session_id).await;
    drop(events_tx);
    if tokio::time::timeout(FLUSH_GRACE, &mut forward).await.is_err() {
        debug!(session_id, "websocket flush did not finish, dropping queued events");
        forward.abort();
    }
}

fn close_reason(err: &AppError) -> &'static str {
    match err {
        AppError::ArtifactNotFound(_) => "No compilation data",
        AppError::DoubleOpen(_) => "Execution already attached",
        AppError::SessionNotFound(_) => "Session not found",
        _ => "Compilation failed",
    }
}

async fn send_event(sender: &mut Outbound, event: &OutboundEvent) {
    if let Err(err) = sender.send(Message::Text(event.render().into())).await {
        debug!(%err, "failed to send websocket frame");
    }
}

async fn close(sender: &mut Outbound, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    if let Err(err) = sender.send(Message::Close(Some(frame))).await {
        debug!(%err, "failed to send websocket close frame");
    }
}
