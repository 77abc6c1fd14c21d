//! Retention service for unclaimed artifacts.
//!
//! A descriptor whose client never attaches would otherwise keep its
//! compiled output on disk forever. The sweeper removes descriptors older
//! than the configured TTL and deletes their artifact directories.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::{discard_artifact, ArtifactStore};

/// Spawn the sweep background task.
///
/// The task ticks every `interval` and reclaims descriptors older than
/// `ttl` until `cancel` fires.
#[must_use]
pub fn spawn_retention_task(
    store: ArtifactStore,
    ttl: Duration,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    sweep(&store, ttl).await;
                }
            }
        }
    })
}

/// Reclaim descriptors older than `ttl`. Returns how many were removed.
pub async fn sweep(store: &ArtifactStore, ttl: Duration) -> usize {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now().checked_sub_signed(ttl).unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    let expired = store.take_expired(cutoff).await;

    for descriptor in &expired {
        if let Some(location) = descriptor.artifact_location() {
            discard_artifact(descriptor.session_id(), location).await;
        }
    }

    if expired.is_empty() {
        debug!("retention sweep: nothing to reclaim");
    } else {
        info!(count = expired.len(), "retention sweep reclaimed unclaimed artifacts");
    }
    expired.len()
}
