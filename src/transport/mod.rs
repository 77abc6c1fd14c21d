//! Client-facing transports.
//!
//! - `http`: axum router, `/health`, `/compile` and the listener loop.
//! - `ws`: the `/ws/execute` WebSocket that attaches a client to a session.

use std::sync::Arc;

use crate::compiler::Compiler;
use crate::config::GlobalConfig;
use crate::session::controller::SessionController;

pub mod http;
pub mod ws;

/// Shared state handed to every request handler.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Session lifecycle.
    pub controller: SessionController,
    /// Produces artifacts for `/compile`.
    pub compiler: Arc<dyn Compiler>,
}
