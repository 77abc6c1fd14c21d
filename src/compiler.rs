//! Compiler collaborator.
//!
//! The session core only consumes [`ArtifactDescriptor`]s; this module is
//! the default producer. [`JavacCompiler`] writes the submission into a
//! fresh temporary directory, compiles it in place and hands the directory
//! over as the artifact location. Sessions delete it on teardown and the
//! retention sweeper deletes it if nobody ever attaches.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::CompilerConfig;
use crate::models::artifact::ArtifactDescriptor;
use crate::{AppError, Result};

/// Turns submitted source into an artifact descriptor.
pub trait Compiler: Send + Sync {
    /// Compile `source` for `session_id`.
    ///
    /// Problems with the source itself yield `Ok` with a failed descriptor
    /// carrying diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Compile`] or [`AppError::Io`] when the compiler
    /// could not be run at all.
    fn compile<'a>(
        &'a self,
        session_id: &'a str,
        source: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ArtifactDescriptor>> + Send + 'a>>;
}

/// Diagnostic used when no public class declaration is found.
pub const MISSING_CLASS_DIAGNOSTIC: &str = "ERROR: Could not find a public class \
     (e.g., 'public class MyClass {...}') or class name is invalid in the provided source code.";

/// Diagnostic used for blank submissions.
pub const EMPTY_SOURCE_DIAGNOSTIC: &str = "ERROR: Source code cannot be empty.";

static PUBLIC_CLASS: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"public\s+(?:final\s+)?class\s+([A-Za-z_][A-Za-z0-9_]*)"));

/// Name of the first `public class` declared in `source`.
///
/// # Errors
///
/// Returns [`AppError::Compile`] if the class-name pattern failed to build.
pub fn extract_public_class_name(source: &str) -> Result<Option<String>> {
    let pattern = PUBLIC_CLASS
        .as_ref()
        .map_err(|err| AppError::Compile(format!("class name pattern is invalid: {err}")))?;
    Ok(pattern
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_owned()))
}

/// `javac`-backed compiler.
#[derive(Debug, Clone)]
pub struct JavacCompiler {
    program: String,
    max_source_bytes: usize,
}

impl JavacCompiler {
    /// Create a compiler from configuration.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            program: config.program.clone(),
            max_source_bytes: config.max_source_bytes,
        }
    }

    async fn compile_source(&self, session_id: &str, source: &str) -> Result<ArtifactDescriptor> {
        if source.trim().is_empty() {
            return Ok(ArtifactDescriptor::failed(
                session_id,
                vec![EMPTY_SOURCE_DIAGNOSTIC.into()],
                source,
            ));
        }

        if source.len() > self.max_source_bytes {
            return Ok(ArtifactDescriptor::failed(
                session_id,
                vec![format!(
                    "ERROR: Source code exceeds the {} byte limit.",
                    self.max_source_bytes
                )],
                source,
            ));
        }

        let Some(class_name) = extract_public_class_name(source)? else {
            return Ok(ArtifactDescriptor::failed(
                session_id,
                vec![MISSING_CLASS_DIAGNOSTIC.into()],
                source,
            ));
        };

        let dir = tempfile::Builder::new()
            .prefix("exec-console-")
            .tempdir()
            .map_err(|err| AppError::Compile(format!("failed to create artifact dir: {err}")))?;
        let source_path = dir.path().join(format!("{class_name}.java"));
        tokio::fs::write(&source_path, source).await?;

        let output = Command::new(&self.program)
            .arg("-d")
            .arg(dir.path())
            .arg(&source_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| AppError::Compile(format!("failed to run {}: {err}", self.program)))?;

        let diagnostics: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .chain(String::from_utf8_lossy(&output.stdout).lines())
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect();

        if output.status.success() {
            let location = dir.keep();
            info!(session_id, class_name, path = %location.display(), "compilation succeeded");
            Ok(ArtifactDescriptor::succeeded(
                session_id,
                diagnostics,
                class_name,
                location,
                source,
            ))
        } else {
            warn!(session_id, class_name, diagnostics = diagnostics.len(), "compilation failed");
            Ok(ArtifactDescriptor::failed(session_id, diagnostics, source))
        }
    }
}

impl Compiler for JavacCompiler {
    fn compile<'a>(
        &'a self,
        session_id: &'a str,
        source: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ArtifactDescriptor>> + Send + 'a>> {
        Box::pin(self.compile_source(session_id, source))
    }
}
