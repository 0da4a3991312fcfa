use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use serial_test::serial;
use tenant_config::FallbackCache;
use tenant_config::FileCache;
use tenant_config::MemoryStore;
use tenant_config::ProviderBuilder;
use tenant_config::ProviderConfig;
use tenant_config::SnapshotOrigin;
use tenant_config::TenantProvider;
use tempfile::tempdir;

use crate::common::*;

fn cached_revision(path: &Path) -> Option<i64> {
    FileCache::new(path).load().ok().map(|s| s.revision())
}

#[tokio::test]
async fn test_restart_with_store_down_serves_cached_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tenant_metadata.json");

    let store = MemoryStore::new();
    let revision = seed(&store);
    let first = TenantProvider::builder(store)
        .cache(Arc::new(FileCache::new(path.clone())))
        .connect()
        .await
        .unwrap();
    assert_eq!(first.snapshot().origin(), SnapshotOrigin::Store);
    assert!(wait_until(|| cached_revision(&path) == Some(revision)).await);
    drop(first);

    let down = MemoryStore::new();
    down.set_available(false);
    let second = TenantProvider::builder(down)
        .cache(Arc::new(FileCache::new(path.clone())))
        .retry(quick_retry())
        .connect()
        .await
        .unwrap();

    let snapshot = second.snapshot();
    assert_eq!(snapshot.origin(), SnapshotOrigin::Fallback);
    assert_eq!(snapshot.revision(), revision);
    assert_eq!(second.tenant_count(), 2);
    assert_eq!(
        second.require_service_database_config(1, "evidence-command").unwrap().driver,
        "postgres"
    );
    assert_eq!(second.get_tenant_id_by_code("acme"), Some(1));
    assert_eq!(second.get_tenant_id_by_domain("acme.example.com"), Some(1));
    assert!(second.get_resolver_config().is_some());
}

#[tokio::test]
async fn test_store_recovery_replaces_fallback_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tenant_metadata.json");
    let seeded = MemoryStore::new();
    seed(&seeded);
    TenantProvider::builder(seeded)
        .cache(Arc::new(FileCache::new(path.clone())))
        .connect()
        .await
        .unwrap();
    assert!(wait_until(|| cached_revision(&path).is_some()).await);

    let store = MemoryStore::new();
    store.set_available(false);
    let provider = TenantProvider::builder(store.clone())
        .cache(Arc::new(FileCache::new(path.clone())))
        .retry(quick_retry())
        .connect()
        .await
        .unwrap();
    assert_eq!(provider.snapshot().origin(), SnapshotOrigin::Fallback);

    store.set_available(true);
    store.put(keys().meta_key(9), json!({"code": "newco", "name": "NewCo"}).to_string());
    provider.load_all_or_fallback().await.unwrap();

    assert_eq!(provider.snapshot().origin(), SnapshotOrigin::Store);
    assert_eq!(provider.tenant_count(), 1);
    assert!(provider.get_tenant_meta(1).is_none());
    assert_eq!(provider.get_tenant_id_by_code("newco"), Some(9));
    let cached_newco = || {
        FileCache::new(path.as_path())
            .load()
            .is_ok_and(|s| s.meta(9).is_some() && s.meta(1).is_none())
    };
    assert!(wait_until(cached_newco).await);
}

#[tokio::test]
async fn test_missing_cache_file_and_store_down_fails_connect() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new();
    store.set_available(false);

    let result = TenantProvider::builder(store)
        .cache(Arc::new(FileCache::new(dir.path().join("absent.json"))))
        .retry(quick_retry())
        .connect()
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn test_configured_cache_path_is_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("tenants.json");
    let mut config = ProviderConfig::default();
    config.cache.path = Some(path.clone());
    let config = config.validate().unwrap();

    let store = MemoryStore::new();
    let revision = seed(&store);
    ProviderBuilder::from_config(store, &config).connect().await.unwrap();

    assert!(wait_until(|| cached_revision(&path) == Some(revision)).await);
}
