//! Compiled artifact descriptor handed over by the compiler collaborator.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of compiling one submission, keyed by the session that will run it.
///
/// `success` holds exactly when both `entry_point` and `artifact_location`
/// are present. The fields are private so that the two constructors are the
/// only way to build a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ArtifactDescriptor {
    session_id: String,
    success: bool,
    diagnostics: Vec<String>,
    entry_point: Option<String>,
    artifact_location: Option<PathBuf>,
    original_source: String,
    created_at: DateTime<Utc>,
}

impl ArtifactDescriptor {
    /// Build a descriptor for a runnable artifact.
    #[must_use]
    pub fn succeeded(
        session_id: impl Into<String>,
        diagnostics: Vec<String>,
        entry_point: impl Into<String>,
        artifact_location: impl Into<PathBuf>,
        original_source: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            success: true,
            diagnostics,
            entry_point: Some(entry_point.into()),
            artifact_location: Some(artifact_location.into()),
            original_source: original_source.into(),
            created_at: Utc::now(),
        }
    }

    /// Build a descriptor for a failed compilation; no artifact exists.
    #[must_use]
    pub fn failed(
        session_id: impl Into<String>,
        diagnostics: Vec<String>,
        original_source: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            success: false,
            diagnostics,
            entry_point: None,
            artifact_location: None,
            original_source: original_source.into(),
            created_at: Utc::now(),
        }
    }

    /// Session the artifact was compiled for.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the compilation produced a runnable artifact.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Compiler diagnostics in emission order.
    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Entry point to execute, present only on success.
    #[must_use]
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Directory holding the compiled output, present only on success.
    #[must_use]
    pub fn artifact_location(&self) -> Option<&Path> {
        self.artifact_location.as_deref()
    }

    /// Source text the artifact was built from.
    #[must_use]
    pub fn original_source(&self) -> &str {
        &self.original_source
    }

    /// When the descriptor was produced.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Re-stamp the creation time. Used by retention tests.
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Runnable parts of the descriptor, or `None` when nothing can be launched.
    #[must_use]
    pub fn runnable(&self) -> Option<(&str, &Path)> {
        if !self.success {
            return None;
        }
        Some((self.entry_point()?, self.artifact_location()?))
    }
}
