use prometheus::Registry;
use serde_json::json;
use serial_test::serial;
use tenant_config::register_custom_metrics;
use tenant_config::ConfigType;
use tenant_config::HttpResolveType;
use tenant_config::MemoryStore;
use tenant_config::NotFoundError;
use tenant_config::ProviderBuilder;
use tenant_config::ProviderConfig;
use tenant_config::SnapshotOrigin;
use tenant_config::TenantProvider;
use tenant_config::WatchState;
use tokio_util::sync::CancellationToken;

use crate::common::*;

#[tokio::test]
async fn test_connect_watch_and_read() {
    let store = MemoryStore::new();
    let revision = seed(&store);

    let provider = TenantProvider::builder(store.clone())
        .namespace(NAMESPACE)
        .watch_config(fast_watch())
        .retry(quick_retry())
        .connect()
        .await
        .unwrap();
    let shutdown = CancellationToken::new();
    provider.start_watch(&shutdown).await.unwrap();

    assert_eq!(provider.snapshot().origin(), SnapshotOrigin::Store);
    assert_eq!(provider.snapshot().revision(), revision);
    assert_eq!(provider.tenant_count(), 2);

    let db = provider.require_service_database_config(1, "evidence-command").unwrap();
    assert_eq!(db.driver, "postgres");
    assert_eq!(db.code, "acme");
    assert_eq!(db.port, 5432);
    assert_eq!(
        provider.require_service_database_config(1, "billing").unwrap_err(),
        NotFoundError::Database {
            tenant_id: 1,
            service_code: "billing".to_string()
        }
    );

    assert!(provider.is_tenant_enabled(1));
    assert!(!provider.is_tenant_enabled(2));
    assert_eq!(provider.get_tenant_id_by_code("GLOBEX"), Some(2));
    assert_eq!(provider.get_tenant_id_by_domain("www.acme.example.com"), Some(1));
    assert_eq!(provider.get_ftp_config_by_username("acme_ftp").unwrap().home_directory, "/acme");
    assert!(provider.get_active_ftp_configs(2).is_none());
    assert_eq!(provider.get_resolver_config_or_default().http_type, HttpResolveType::Host);

    let keys = keys();
    store.put(
        keys.storage_key(1),
        json!({"quotaBytes": 2_147_483_648u64}).to_string(),
    );
    assert!(wait_until(|| provider.get_storage_config(1).is_some_and(|s| s.quota_bytes == 2_147_483_648)).await);
    assert_eq!(provider.require_storage_config(1).unwrap().name, "Acme");

    shutdown.cancel();
    assert!(wait_until(|| provider.watch_state() == WatchState::Stopped).await);
}

#[tokio::test]
async fn test_clones_share_snapshot_and_watch() {
    let store = MemoryStore::new();
    seed(&store);
    let provider = TenantProvider::builder(store.clone())
        .watch_config(fast_watch())
        .connect()
        .await
        .unwrap();
    let other = provider.clone();

    provider.start_watch(&CancellationToken::new()).await.unwrap();
    assert_eq!(other.watch_state(), WatchState::Watching);

    store.put(keys().meta_key(3), json!({"code": "initech", "name": "Initech"}).to_string());
    assert!(wait_until(|| other.get_tenant_meta(3).is_some()).await);

    other.stop_watch();
    assert_eq!(provider.watch_state(), WatchState::Stopped);
}

#[tokio::test]
async fn test_watch_survives_store_outage() {
    let store = MemoryStore::new();
    seed(&store);
    let provider = TenantProvider::builder(store.clone())
        .watch_config(fast_watch())
        .connect()
        .await
        .unwrap();
    provider.start_watch(&CancellationToken::new()).await.unwrap();

    store.set_available(false);
    assert!(wait_until(|| provider.watch_state() == WatchState::Reconnecting).await);
    store.delete(&keys().ftp_key(1, "acme_ftp")).unwrap();
    assert!(provider.get_ftp_config_by_username("acme_ftp").is_some());

    store.set_available(true);
    assert!(wait_until(|| provider.get_ftp_config_by_username("acme_ftp").is_none()).await);
    assert!(provider.get_ftp_configs(1).is_none());
    assert!(wait_until(|| provider.watch_state() == WatchState::Watching).await);

    provider.stop_watch();
}

#[tokio::test]
async fn test_metrics_reflect_published_snapshots() {
    let registry = Registry::new();
    register_custom_metrics(&registry).unwrap();

    let store = MemoryStore::new();
    seed(&store);
    TenantProvider::builder(store).connect().await.unwrap();

    let families = registry.gather();
    let published = families
        .iter()
        .find(|f| f.get_name() == "tenant_snapshot_published_total")
        .unwrap();
    assert!(published.get_metric().iter().any(|m| m.get_counter().get_value() >= 1.0));
    assert!(families.iter().any(|f| f.get_name() == "tenant_count"));
}

#[tokio::test]
#[serial]
async fn test_builder_from_environment_config() {
    let config = temp_env::with_vars(
        [
            ("CONFIG_PATH", None),
            ("TENANT__NAMESPACE", Some("acme/")),
            ("TENANT__CONFIG_TYPES", Some("database")),
            ("TENANT__CACHE__ENABLED", Some("false")),
        ],
        || ProviderConfig::new().unwrap().validate().unwrap(),
    );
    assert_eq!(config.namespace, "acme/");
    assert_eq!(config.config_types, vec![ConfigType::Database]);
    assert!(!config.cache.enabled);

    let store = MemoryStore::new();
    store.put("acme/tenants/1/meta", json!({"code": "acme"}).to_string());
    store.put("acme/tenants/1/database/evidence-command", json!({"driver": "mysql"}).to_string());
    store.put("acme/tenants/1/ftp/acme_ftp", json!({"passwordHash": "h"}).to_string());
    store.put("jxt/tenants/2/meta", json!({"code": "other"}).to_string());

    let provider = ProviderBuilder::from_config(store, &config).connect().await.unwrap();

    assert_eq!(provider.tenant_count(), 1);
    assert!(provider.get_service_database_config(1, "evidence-command").is_some());
    assert!(provider.get_ftp_configs(1).is_none());
    assert!(provider.get_tenant_meta(2).is_none());
}
