// -
// Key-space layout

/// Default root prefix under which all tenant keys live
pub const DEFAULT_NAMESPACE: &str = "jxt/";

/// Segment holding per-tenant records: `{ns}tenants/{id}/...`
pub(crate) const TENANTS_SEGMENT: &str = "tenants";

/// Segment holding global records: `{ns}common/...`
pub(crate) const COMMON_SEGMENT: &str = "common";

/// Global resolver record: `{ns}common/resolver`
pub(crate) const RESOLVER_KEY: &str = "resolver";

pub(crate) const CATEGORY_META: &str = "meta";
pub(crate) const CATEGORY_DATABASE: &str = "database";
pub(crate) const CATEGORY_FTP: &str = "ftp";
pub(crate) const CATEGORY_STORAGE: &str = "storage";
pub(crate) const CATEGORY_DOMAIN: &str = "domain";

pub(crate) const DOMAIN_PRIMARY: &str = "primary";
pub(crate) const DOMAIN_ALIASES: &str = "aliases";
pub(crate) const DOMAIN_INTERNAL: &str = "internal";

// -
// Resolver defaults

pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-ID";

// -
// Fallback cache

/// Directory override for the fallback cache file
pub const CACHE_PATH_ENV: &str = "TENANT_CACHE_PATH";
pub(crate) const DEFAULT_CACHE_DIR: &str = "./cache";
pub(crate) const CACHE_FILE_NAME: &str = "tenant_metadata.json";

// -
// Watch reconnection

pub(crate) const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1_000;
pub(crate) const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 30_000;
pub(crate) const DEFAULT_RECONNECT_MULTIPLIER: f64 = 1.5;
