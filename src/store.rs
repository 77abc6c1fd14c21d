//! Artifact store: compiled descriptors waiting for a client to attach.
//!
//! A descriptor is claimed exactly once. `take` removes it under the map
//! lock, so two concurrent attaches for the same id can never both launch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::artifact::ArtifactDescriptor;

/// Shared map of unclaimed descriptors keyed by session id.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    pending: Arc<Mutex<HashMap<String, ArtifactDescriptor>>>,
}

impl ArtifactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `descriptor` under `session_id`, replacing any previous entry.
    ///
    /// Returns the replaced descriptor, if any.
    pub async fn put(
        &self,
        session_id: impl Into<String>,
        descriptor: ArtifactDescriptor,
    ) -> Option<ArtifactDescriptor> {
        let session_id = session_id.into();
        let previous = self
            .pending
            .lock()
            .await
            .insert(session_id.clone(), descriptor);
        if previous.is_some() {
            warn!(session_id, "artifact descriptor overwritten before it was claimed");
        }
        previous
    }

    /// Remove and return the descriptor for `session_id`.
    pub async fn take(&self, session_id: &str) -> Option<ArtifactDescriptor> {
        self.pending.lock().await.remove(session_id)
    }

    /// Whether a descriptor is waiting under `session_id`.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.pending.lock().await.contains_key(session_id)
    }

    /// Number of unclaimed descriptors.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// `true` when nothing is waiting to be claimed.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Remove and return every descriptor created before `cutoff`.
    pub async fn take_expired(&self, cutoff: DateTime<Utc>) -> Vec<ArtifactDescriptor> {
        let mut guard = self.pending.lock().await;
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, descriptor)| descriptor.created_at() < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| guard.remove(id))
            .collect()
    }
}

/// Delete compiled output on disk. Best effort: failures are logged only.
///
/// Returns `true` when the directory was removed.
pub async fn discard_artifact(session_id: &str, location: &Path) -> bool {
    match tokio::fs::remove_dir_all(location).await {
        Ok(()) => {
            debug!(session_id, path = %location.display(), "artifact storage removed");
            true
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!(session_id, path = %location.display(), %err, "failed to remove artifact storage");
            false
        }
    }
}
