//! Unit tests for the artifact store.

use std::sync::Arc;

use chrono::{Duration, Utc};

use exec_console::models::artifact::ArtifactDescriptor;
use exec_console::store::ArtifactStore;

fn descriptor(id: &str) -> ArtifactDescriptor {
    ArtifactDescriptor::succeeded(id, vec![], "Main", "/tmp/none", "class Main {}")
}

#[tokio::test]
async fn take_returns_descriptor_once() {
    let store = ArtifactStore::new();
    store.put("s1", descriptor("s1")).await;

    let first = store.take("s1").await;
    assert_eq!(first.map(|d| d.session_id().to_owned()), Some("s1".to_owned()));
    assert!(store.take("s1").await.is_none(), "second take must be empty");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn take_unknown_id_is_none() {
    let store = ArtifactStore::new();
    assert!(store.take("missing").await.is_none());
}

#[tokio::test]
async fn put_twice_overwrites_and_returns_previous() {
    let store = ArtifactStore::new();
    assert!(store.put("s1", descriptor("s1")).await.is_none());

    let replacement = ArtifactDescriptor::failed("s1", vec!["boom".into()], "");
    let previous = store.put("s1", replacement).await;

    assert!(previous.is_some_and(|d| d.is_success()));
    let current = store.take("s1").await.unwrap();
    assert!(!current.is_success(), "latest put wins");
}

#[tokio::test]
async fn concurrent_take_hands_out_one_descriptor() {
    let store = Arc::new(ArtifactStore::new());
    store.put("race", descriptor("race")).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.take("race").await.is_some() }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one caller may claim the descriptor");
}

#[tokio::test]
async fn take_expired_only_removes_old_entries() {
    let store = ArtifactStore::new();
    let old = descriptor("old").with_created_at(Utc::now() - Duration::hours(2));
    store.put("old", old).await;
    store.put("fresh", descriptor("fresh")).await;

    let expired = store.take_expired(Utc::now() - Duration::hours(1)).await;

    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].session_id(), "old");
    assert!(store.contains("fresh").await);
    assert_eq!(store.len().await, 1);
}
