use std::time::Duration;

use serde_json::json;
use tenant_config::BackoffPolicy;
use tenant_config::DomainField;
use tenant_config::KeySpace;
use tenant_config::MemoryStore;
use tenant_config::RetryPolicies;
use tenant_config::WatchConfig;

pub const NAMESPACE: &str = "jxt/";
pub const WAIT: Duration = Duration::from_secs(3);

pub fn keys() -> KeySpace {
    KeySpace::new(NAMESPACE)
}

pub fn fast_watch() -> WatchConfig {
    WatchConfig {
        base_delay_ms: 10,
        max_delay_ms: 100,
        multiplier: 2.0,
    }
}

pub fn quick_retry() -> RetryPolicies {
    let policy = BackoffPolicy {
        max_retries: 2,
        timeout_ms: 200,
        base_delay_ms: 10,
        max_delay_ms: 20,
    };
    RetryPolicies {
        startup_load: policy,
        watch_start: policy,
    }
}

/// Two tenants with a database, FTP accounts, storage and domains, plus a
/// resolver. Returns the store revision after seeding.
pub fn seed(store: &MemoryStore) -> i64 {
    let keys = keys();
    store.put_batch([
        (
            keys.meta_key(1),
            json!({"code": "acme", "name": "Acme", "status": "active"}).to_string(),
        ),
        (
            keys.meta_key(2),
            json!({"code": "globex", "name": "Globex", "status": "inactive"}).to_string(),
        ),
        (
            keys.database_key(1, "evidence-command"),
            json!({
                "driver": "postgres",
                "host": "pg.acme.internal",
                "port": 5432,
                "database": "evidence",
                "maxOpenConns": 50
            })
            .to_string(),
        ),
        (
            keys.ftp_key(1, "acme_ftp"),
            json!({"passwordHash": "h1", "homeDirectory": "/acme", "status": "active"}).to_string(),
        ),
        (
            keys.ftp_key(2, "globex_ftp"),
            json!({"passwordHash": "h2", "status": "disabled"}).to_string(),
        ),
        (
            keys.storage_key(1),
            json!({"quotaBytes": 1_073_741_824u64, "maxFileSizeBytes": 10_485_760u64, "maxConcurrentUploads": 4})
                .to_string(),
        ),
        (keys.domain_key(1, DomainField::Primary), "acme.example.com".to_string()),
        (
            keys.domain_key(1, DomainField::Aliases),
            json!(["www.acme.example.com"]).to_string(),
        ),
        (
            keys.resolver_key(),
            json!({"httpType": "host", "ftpType": "username"}).to_string(),
        ),
    ])
}

pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
