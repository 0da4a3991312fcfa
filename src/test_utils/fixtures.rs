use std::time::Duration;

use serde_json::json;

use crate::FtpConfigDetail;
use crate::ServiceDatabaseConfig;
use crate::StorageConfig;
use crate::TenantId;
use crate::TenantMeta;
use crate::TenantStatus;

pub fn meta(
    tenant_id: TenantId,
    code: &str,
    name: &str,
) -> TenantMeta {
    TenantMeta {
        tenant_id,
        code: code.to_string(),
        name: name.to_string(),
        status: TenantStatus::Active,
        billing_plan: None,
    }
}

pub fn database(
    tenant_id: TenantId,
    service_code: &str,
) -> ServiceDatabaseConfig {
    ServiceDatabaseConfig {
        tenant_id,
        service_code: service_code.to_string(),
        driver: "mysql".to_string(),
        host: "localhost".to_string(),
        port: 3306,
        database: "testdb".to_string(),
        max_open_conns: 50,
        max_idle_conns: 10,
        ..Default::default()
    }
}

pub fn ftp(
    tenant_id: TenantId,
    username: &str,
) -> FtpConfigDetail {
    FtpConfigDetail {
        tenant_id,
        username: username.to_string(),
        password_hash: "hash".to_string(),
        status: "active".to_string(),
        ..Default::default()
    }
}

pub fn storage(tenant_id: TenantId) -> StorageConfig {
    StorageConfig {
        tenant_id,
        quota_bytes: 107_374_182_400,
        max_file_size_bytes: 524_288_000,
        max_concurrent_uploads: 20,
        ..Default::default()
    }
}

pub fn meta_json(
    tenant_id: TenantId,
    code: &str,
    name: &str,
) -> String {
    json!({
        "id": tenant_id,
        "code": code,
        "name": name,
        "status": "active",
        "billingPlan": "premium"
    })
    .to_string()
}

pub fn database_json(
    tenant_id: TenantId,
    service_code: &str,
) -> String {
    json!({
        "tenantId": tenant_id,
        "serviceCode": service_code,
        "driver": "mysql",
        "database": "testdb",
        "host": "localhost",
        "port": 3306,
        "maxOpenConns": 50,
        "maxIdleConns": 10
    })
    .to_string()
}

pub fn ftp_json(
    tenant_id: TenantId,
    username: &str,
    password_hash: &str,
) -> String {
    json!({
        "tenantId": tenant_id,
        "username": username,
        "passwordHash": password_hash,
        "description": format!("FTP {username}"),
        "status": "active"
    })
    .to_string()
}

pub fn storage_json(tenant_id: TenantId) -> String {
    json!({
        "tenantId": tenant_id,
        "quotaBytes": 107_374_182_400u64,
        "maxFileSizeBytes": 524_288_000u64,
        "maxConcurrentUploads": 20
    })
    .to_string()
}

/// Polls `condition` every 10ms until it holds or `within` elapses.
pub async fn wait_until<F>(
    within: Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
