//! Tests for startup index preparation under each build policy.

use quotagate_core::ContentHash;
use quotagate_core::config::{BuildConfig, BuildPolicy};
use quotagate_index::{FlatFileStore, IndexStore, StoreState};
use quotagate_server::bootstrap::{prepare_index, wait_for_build};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn build_config(limit: u64, policy: BuildPolicy) -> BuildConfig {
    BuildConfig {
        limit,
        concurrency: 4,
        queue_capacity: 16,
        write_batch_size: 8,
        progress_interval: 0,
        policy,
    }
}

fn store_at(path: &Path) -> Arc<dyn IndexStore> {
    Arc::new(FlatFileStore::new(path))
}

async fn build_file(path: &Path, limit: u64) {
    let handle = prepare_index(
        store_at(path),
        &build_config(limit, BuildPolicy::Always),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(handle.is_some());
    wait_for_build(handle).await.unwrap();
}

#[tokio::test]
async fn test_if_missing_builds_when_absent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");
    let store = store_at(&path);

    let handle = prepare_index(
        store.clone(),
        &build_config(50, BuildPolicy::IfMissing),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(handle.is_some());
    wait_for_build(handle).await.unwrap();

    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(store.len().await.unwrap(), 51);
    assert!(path.exists());
}

#[tokio::test]
async fn test_if_missing_reuses_complete_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");
    build_file(&path, 50).await;

    let store = store_at(&path);
    let handle = prepare_index(
        store.clone(),
        &build_config(50, BuildPolicy::IfMissing),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(handle.is_none());
    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(
        store.lookup(&ContentHash::of_identifier(50)).await.unwrap(),
        Some(50)
    );
}

#[tokio::test]
async fn test_if_missing_rebuilds_mismatched_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");
    build_file(&path, 20).await;

    let store = store_at(&path);
    let handle = prepare_index(
        store.clone(),
        &build_config(40, BuildPolicy::IfMissing),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(handle.is_some());
    wait_for_build(handle).await.unwrap();

    assert_eq!(store.len().await.unwrap(), 41);
}

#[tokio::test]
async fn test_if_missing_rebuilds_corrupt_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");
    std::fs::write(&path, "0:not-a-hash\n").unwrap();

    let store = store_at(&path);
    let handle = prepare_index(
        store.clone(),
        &build_config(10, BuildPolicy::IfMissing),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(handle.is_some());
    wait_for_build(handle).await.unwrap();

    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(store.len().await.unwrap(), 11);
}

#[tokio::test]
async fn test_always_rebuilds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");
    build_file(&path, 10).await;

    let store = store_at(&path);
    let handle = prepare_index(
        store.clone(),
        &build_config(10, BuildPolicy::Always),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(handle.is_some());
    wait_for_build(handle).await.unwrap();
    assert_eq!(store.state(), StoreState::Ready);
}

#[tokio::test]
async fn test_never_requires_existing_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");

    let result = prepare_index(
        store_at(&path),
        &build_config(10, BuildPolicy::Never),
        CancellationToken::new(),
    )
    .await;
    assert!(result.is_err());

    build_file(&path, 10).await;
    let store = store_at(&path);
    let handle = prepare_index(
        store.clone(),
        &build_config(10, BuildPolicy::Never),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(handle.is_none());
    assert_eq!(store.state(), StoreState::Ready);
}

#[tokio::test]
async fn test_never_rejects_index_of_wrong_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");
    let lines: String = (0..3)
        .map(|id| format!("{id}:{}\n", ContentHash::of_identifier(id)))
        .collect();
    std::fs::write(&path, lines).unwrap();

    let store = store_at(&path);
    let result = prepare_index(
        store.clone(),
        &build_config(50, BuildPolicy::Never),
        CancellationToken::new(),
    )
    .await;

    let err = result.err().expect("mismatched index must not be served");
    assert!(err.to_string().contains("expected 51"), "{err}");
    assert_eq!(store.state(), StoreState::Failed);
    assert!(
        store
            .lookup(&ContentHash::of_identifier(1))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_cancelled_build_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashes.txt");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let store = store_at(&path);
    let handle = prepare_index(
        store.clone(),
        &build_config(100_000, BuildPolicy::Always),
        cancel,
    )
    .await
    .unwrap();

    wait_for_build(handle).await.unwrap();
    assert_ne!(store.state(), StoreState::Ready);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_wait_for_nothing() {
    wait_for_build(None).await.unwrap();
}
