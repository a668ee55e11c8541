use super::*;
use pao_core::{FakeClock, NewFeature};
use std::sync::Arc;
use tempfile::tempdir;

fn new_feature(name: &str) -> NewFeature {
    NewFeature {
        priority: 0,
        name: name.to_string(),
        category: "core".to_string(),
        description: String::new(),
        steps: vec!["run".to_string()],
    }
}

async fn fresh_store() -> (SqliteStore, tempfile::TempDir) {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(dir.path().join("pao.sqlite3")).await.expect("open");
    (store, dir)
}

#[tokio::test]
async fn insert_bulk_assigns_ids_and_populates_snapshot() {
    let (store, _dir) = fresh_store().await;
    let ids = store
        .insert_bulk(vec![new_feature("a"), new_feature("b")])
        .await
        .expect("insert");
    assert_eq!(ids.len(), 2);

    let snapshot = store.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.len(), 2);
    for id in ids {
        let feature = snapshot.get(id).expect("present");
        assert!(feature.is_pending());
    }
}

#[tokio::test]
async fn insert_bulk_rejects_non_empty_store() {
    let (store, _dir) = fresh_store().await;
    store.insert_bulk(vec![new_feature("a")]).await.expect("first insert");

    let err = store.insert_bulk(vec![new_feature("b")]).await.unwrap_err();
    assert!(matches!(err, StoreError::NotEmpty));
}

#[tokio::test]
async fn add_dependency_tolerates_orphan_targets() {
    let (store, _dir) = fresh_store().await;
    let ids = store.insert_bulk(vec![new_feature("a")]).await.expect("insert");
    let a = ids[0];
    let orphan = FeatureId::new(a.get() + 999);

    store.add_dependency(a, orphan).await.expect("orphan edge allowed");
    let snapshot = store.snapshot().await.expect("snapshot");
    assert!(pao_core::resolver::is_ready(&snapshot, snapshot.get(a).expect("present")));
}

#[tokio::test]
async fn add_dependency_rejects_cycles() {
    let (store, _dir) = fresh_store().await;
    let ids = store
        .insert_bulk(vec![new_feature("a"), new_feature("b")])
        .await
        .expect("insert");
    let (a, b) = (ids[0], ids[1]);

    store.add_dependency(b, a).await.expect("b depends on a");
    let err = store.add_dependency(a, b).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Dependency(DependencyError::Cycle { .. })
    ));
}

#[tokio::test]
async fn add_dependency_rejects_unknown_ids() {
    let (store, _dir) = fresh_store().await;
    let ids = store.insert_bulk(vec![new_feature("a")]).await.expect("insert");
    let missing = FeatureId::new(ids[0].get() + 42);

    let err = store.add_dependency(missing, ids[0]).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Dependency(DependencyError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn remove_dependency_is_idempotent() {
    let (store, _dir) = fresh_store().await;
    let ids = store
        .insert_bulk(vec![new_feature("a"), new_feature("b")])
        .await
        .expect("insert");
    let (a, b) = (ids[0], ids[1]);

    store.add_dependency(a, b).await.expect("edge");
    store.remove_dependency(a, b).await.expect("remove once");
    store.remove_dependency(a, b).await.expect("remove again");

    let snapshot = store.snapshot().await.expect("snapshot");
    assert!(snapshot.get(a).expect("present").dependencies.is_empty());
}

#[tokio::test]
async fn conditional_claim_is_exclusive_under_concurrency() {
    let (store, _dir) = fresh_store().await;
    let ids = store.insert_bulk(vec![new_feature("a")]).await.expect("insert");
    let id = ids[0];
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.conditional_claim(id).await.expect("claim call") }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.expect("join") {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);

    let snapshot = store.snapshot().await.expect("snapshot");
    assert!(snapshot.get(id).expect("present").running);
}

#[tokio::test]
async fn conditional_claim_refuses_passing_or_running_features() {
    let (store, _dir) = fresh_store().await;
    let ids = store.insert_bulk(vec![new_feature("a")]).await.expect("insert");
    let id = ids[0];

    assert!(store.conditional_claim(id).await.expect("first claim"));
    assert!(!store.conditional_claim(id).await.expect("second claim"));

    store.release(id, FinalState::Success).await.expect("release");
    assert!(!store.conditional_claim(id).await.expect("claim after pass"));
}

#[tokio::test]
async fn release_pending_returns_feature_to_pending() {
    let (store, _dir) = fresh_store().await;
    let ids = store.insert_bulk(vec![new_feature("a")]).await.expect("insert");
    let id = ids[0];

    store.conditional_claim(id).await.expect("claim");
    store.release(id, FinalState::Pending).await.expect("release");

    let snapshot = store.snapshot().await.expect("snapshot");
    let feature = snapshot.get(id).expect("present");
    assert!(feature.is_pending());
    assert!(!feature.passes);
}

#[tokio::test]
async fn created_at_and_updated_at_follow_a_fake_clock() {
    let dir = tempdir().expect("tempdir");
    let clock = FakeClock::new();
    let store = SqliteStore::open_with_clock(dir.path().join("pao.sqlite3"), clock.clone())
        .await
        .expect("open");

    let ids = store.insert_bulk(vec![new_feature("a")]).await.expect("insert");
    let id = ids[0];
    let created = store.snapshot().await.expect("snapshot").get(id).expect("present").created_at;

    clock.advance(std::time::Duration::from_secs(60));
    store.conditional_claim(id).await.expect("claim");
    let after_claim =
        store.snapshot().await.expect("snapshot").get(id).expect("present").updated_at;

    assert_eq!(after_claim - created, chrono::Duration::seconds(60));
}

#[tokio::test]
async fn refresh_observes_writes_made_by_a_second_handle() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("pao.sqlite3");
    let writer = SqliteStore::open(&path).await.expect("open writer");
    let reader = SqliteStore::open(&path).await.expect("open reader");

    let ids = writer.insert_bulk(vec![new_feature("a")]).await.expect("insert");
    writer.conditional_claim(ids[0]).await.expect("claim");

    reader.refresh().await.expect("refresh");
    let snapshot = reader.snapshot().await.expect("snapshot");
    assert!(snapshot.get(ids[0]).expect("present").running);
}
