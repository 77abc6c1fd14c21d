//! Global configuration parsing and validation.

use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Placeholder replaced by the artifact location in launch arguments.
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";

/// Placeholder replaced by the artifact entry point in launch arguments.
pub const ENTRY_POINT_PLACEHOLDER: &str = "{entry_point}";

/// How the runtime is invoked for a compiled artifact.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LaunchConfig {
    /// Runtime binary (e.g., `java`).
    #[serde(default = "default_launch_program")]
    pub program: String,
    /// Argument template; may reference `{artifact}` and `{entry_point}`.
    #[serde(default = "default_launch_args")]
    pub args: Vec<String>,
    /// Start the child with the artifact location as its working directory.
    #[serde(default = "default_true")]
    pub working_dir_is_artifact: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: default_launch_program(),
            args: default_launch_args(),
            working_dir_is_artifact: true,
        }
    }
}

fn default_launch_program() -> String {
    "java".into()
}

fn default_launch_args() -> Vec<String> {
    vec![
        "-cp".into(),
        ARTIFACT_PLACEHOLDER.into(),
        ENTRY_POINT_PLACEHOLDER.into(),
    ]
}

/// Timeout policy for programs that look interactive or graphical.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LongRunningConfig {
    /// Bounded wait before a flagged process is force-killed.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Source substrings that flag a program as long-running.
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
    /// Apply the bounded wait to every session, flagged or not.
    #[serde(default)]
    pub apply_to_all: bool,
}

impl Default for LongRunningConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            markers: default_markers(),
            apply_to_all: false,
        }
    }
}

impl LongRunningConfig {
    /// Bounded wait as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_markers() -> Vec<String> {
    vec!["javax.swing".into(), "java.awt".into(), "javafx".into()]
}

/// Reclamation of descriptors nobody attached to.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    /// Age after which an unclaimed artifact is deleted.
    #[serde(default = "default_artifact_ttl")]
    pub artifact_ttl_seconds: u64,
    /// Interval between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            artifact_ttl_seconds: default_artifact_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_artifact_ttl() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

/// Compiler collaborator settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CompilerConfig {
    /// Compiler binary (e.g., `javac`).
    #[serde(default = "default_compiler_program")]
    pub program: String,
    /// Largest accepted submission.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: default_compiler_program(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

fn default_compiler_program() -> String {
    "javac".into()
}

fn default_max_source_bytes() -> usize {
    256 * 1024
}

fn default_true() -> bool {
    true
}

fn default_http_port() -> u16 {
    8080
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Address the HTTP/WebSocket listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// HTTP port for the WebSocket transport.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Runtime invocation.
    #[serde(default)]
    pub launch: LaunchConfig,
    /// Long-running program policy.
    #[serde(default)]
    pub long_running: LongRunningConfig,
    /// Unclaimed artifact reclamation.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Compiler collaborator.
    #[serde(default)]
    pub compiler: CompilerConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            launch: LaunchConfig::default(),
            long_running: LongRunningConfig::default(),
            retention: RetentionConfig::default(),
            compiler: CompilerConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.launch.program.trim().is_empty() {
            return Err(AppError::Config("launch.program must not be empty".into()));
        }

        if !self
            .launch
            .args
            .iter()
            .any(|arg| arg.contains(ENTRY_POINT_PLACEHOLDER))
        {
            return Err(AppError::Config(format!(
                "launch.args must reference {ENTRY_POINT_PLACEHOLDER}"
            )));
        }

        if self.long_running.timeout_seconds == 0 {
            return Err(AppError::Config(
                "long_running.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.retention.artifact_ttl_seconds == 0 || self.retention.sweep_interval_seconds == 0 {
            return Err(AppError::Config(
                "retention intervals must be greater than zero".into(),
            ));
        }

        if self.compiler.program.trim().is_empty() {
            return Err(AppError::Config("compiler.program must not be empty".into()));
        }

        Ok(())
    }
}
