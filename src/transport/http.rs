//! HTTP transport.
//!
//! Mounts the WebSocket session endpoint and a JSON compile endpoint behind
//! one axum router. Compiled descriptors, successful or not, are stored
//! under a fresh execution id that the client then attaches with.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{ws, AppState};
use crate::{AppError, Result};

/// Body of `POST /compile`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompileRequest {
    /// Program source text.
    pub source: String,
}

/// Response of `POST /compile`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CompileResponse {
    /// Id to attach to at `/ws/execute?id=...`.
    pub execution_id: String,
    /// Whether the program can be run.
    pub success: bool,
    /// Compiler diagnostics.
    pub diagnostics: Vec<String>,
}

/// Handler for `GET /health`.
async fn health() -> &'static str {
    "ok"
}

/// Handler for `POST /compile`.
async fn compile(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompileRequest>,
) -> std::result::Result<Json<CompileResponse>, (StatusCode, String)> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let descriptor = state
        .compiler
        .compile(&execution_id, &request.source)
        .await
        .map_err(|err| {
            error!(execution_id, %err, "compiler unavailable");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        })?;

    let response = CompileResponse {
        execution_id: execution_id.clone(),
        success: descriptor.is_success(),
        diagnostics: descriptor.diagnostics().to_vec(),
    };
    state.controller.store().put(execution_id, descriptor).await;
    Ok(Json(response))
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/compile", post(compile))
        .route("/ws/execute", get(ws::execute))
        .with_state(state)
}

/// Bind to the configured address and serve until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener cannot bind, or
/// `AppError::Io` if the server fails.
pub async fn serve_http(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let addr = SocketAddr::new(state.config.bind_address, state.config.http_port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;
    serve_listener(listener, state, ct).await
}

/// Serve on an already-bound listener until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http transport listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("http server failed: {err}")))?;

    info!("http transport stopped");
    Ok(())
}
