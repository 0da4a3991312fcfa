//! Tenant configuration records as stored in the coordination store.
//!
//! Every record is JSON encoded with camelCase field names. Records are
//! immutable once they are placed in a published snapshot; the provider
//! hands them out behind `Arc`.


use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_TENANT_HEADER;

/// Numeric tenant identifier, taken from the key segment `tenants/{id}/`.
pub type TenantId = i64;

/// Lifecycle status of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    #[default]
    Inactive,
    Suspended,
    /// Any status this crate does not know; treated as not enabled
    #[serde(other)]
    Unknown,
}

/// Identity record: `{ns}tenants/{id}/meta`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantMeta {
    #[serde(rename = "id")]
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub status: TenantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<String>,
}

impl TenantMeta {
    pub fn is_enabled(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Per-service database connection parameters:
/// `{ns}tenants/{id}/database/{serviceCode}`
///
/// Pool and timeout values are expressed in connections and seconds.
/// Numeric fields are signed so writers may use `-1` as "unset".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDatabaseConfig {
    pub tenant_id: TenantId,
    pub service_code: String,
    /// Denormalized from [`TenantMeta::code`]
    pub code: String,
    /// Denormalized from [`TenantMeta::name`]
    pub name: String,
    pub driver: String,
    pub host: String,
    pub port: i32,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_open_conns: i32,
    pub max_idle_conns: i32,
    pub conn_max_life_time: i64,
    pub conn_max_idle_time: i64,
    pub connect_timeout: i64,
    pub read_timeout: i64,
    pub write_timeout: i64,
}

/// FTP account: `{ns}tenants/{id}/ftp/{username}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FtpConfigDetail {
    pub tenant_id: TenantId,
    pub username: String,
    pub password_hash: String,
    pub home_directory: String,
    pub write_permission: bool,
    pub description: String,
    pub status: String,
}

impl FtpConfigDetail {
    /// An empty status counts as active.
    pub fn is_active(&self) -> bool {
        self.status.is_empty() || self.status == "active"
    }
}

/// Storage quota: `{ns}tenants/{id}/storage`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub quota_bytes: i64,
    pub max_file_size_bytes: i64,
    pub max_concurrent_uploads: i32,
}

/// Domain bindings merged from `{ns}tenants/{id}/domain/{primary|aliases|internal}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomainConfig {
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub primary: String,
    pub aliases: Vec<String>,
    pub internal: String,
}

impl DomainConfig {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.aliases.is_empty() && self.internal.is_empty()
    }

    /// All non-empty domains claimed by this config, primary first.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .chain(std::iter::once(self.internal.as_str()))
            .filter(|d| !d.trim().is_empty())
    }
}

/// How HTTP requests are mapped to a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpResolveType {
    Host,
    #[default]
    Header,
    Query,
    Path,
}

/// How FTP sessions are mapped to a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtpResolveType {
    #[default]
    Username,
    Password,
}

/// Global tenant resolution settings: `{ns}common/resolver`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    pub id: i64,
    pub http_type: HttpResolveType,
    pub http_header_name: String,
    /// Used when `http_type` is `query`
    pub http_query_param: String,
    /// Used when `http_type` is `path`
    pub http_path_index: u32,
    pub ftp_type: FtpResolveType,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            id: 0,
            http_type: HttpResolveType::Header,
            http_header_name: DEFAULT_TENANT_HEADER.to_string(),
            http_query_param: String::new(),
            http_path_index: 0,
            ftp_type: FtpResolveType::Username,
        }
    }
}
