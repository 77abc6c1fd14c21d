#![forbid(unsafe_code)]

//! `exec-console`: interactive execution server binary.
//!
//! Bootstraps configuration, starts the artifact retention sweeper and the
//! HTTP/WebSocket transport, and tears down every live session on shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use exec_console::compiler::JavacCompiler;
use exec_console::config::GlobalConfig;
use exec_console::process::launcher::Launcher;
use exec_console::retention;
use exec_console::session::controller::SessionController;
use exec_console::session::registry::SessionRegistry;
use exec_console::store::ArtifactStore;
use exec_console::transport::{http, AppState};
use exec_console::{AppError, Result};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "exec-console", about = "Interactive program execution server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP port from the configuration.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("exec-console server bootstrap");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("exec-console")
        .build()
        .map_err(|err| AppError::Io(format!("cannot start async runtime: {err}")))?;
    runtime.block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    let config = Arc::new(config);
    info!(port = config.http_port, "configuration loaded");

    let store = ArtifactStore::new();
    let launcher = Launcher::new(config.launch.clone(), config.long_running.clone());
    let controller = SessionController::new(store.clone(), SessionRegistry::new(), launcher);
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        controller: controller.clone(),
        compiler: Arc::new(JavacCompiler::new(&config.compiler)),
    });

    let ct = CancellationToken::new();
    let retention_handle = retention::spawn_retention_task(
        store,
        Duration::from_secs(config.retention.artifact_ttl_seconds),
        Duration::from_secs(config.retention.sweep_interval_seconds),
        ct.clone(),
    );
    info!("retention service started");

    let http_ct = ct.clone();
    let http_state = Arc::clone(&state);
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::serve_http(http_state, http_ct).await {
            error!(%err, "http transport failed");
        }
    });

    info!("exec-console ready");

    shutdown_signal().await;
    ct.cancel();

    let released = controller.shutdown().await;
    info!(released, "live sessions released");

    // Open sockets keep graceful shutdown waiting; their sessions are already gone.
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = tokio::join!(http_handle, retention_handle);
    })
    .await;
    if drained.is_err() {
        warn!(grace = ?SHUTDOWN_GRACE, "connections still open at shutdown, exiting anyway");
    }
    info!("exec-console shut down");

    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(%err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("interrupt received"),
        () = terminate => info!("terminate received"),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `info` default.
fn init_tracing(log_format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let installed = match log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| AppError::Config(format!("cannot install log subscriber: {err}")))
}
