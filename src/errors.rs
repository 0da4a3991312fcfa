//! Tenant Configuration Provider Error Hierarchy
//!
//! Errors are grouped by the path that produces them. Only the load, watch
//! and persist paths are fallible; the read path reports absence through
//! `Option` or [`NotFoundError`].

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;

use crate::TenantId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Coordination store unavailable or misbehaving
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A single key/value pair could not be decoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Durable fallback cache failures
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Watch lifecycle violations
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Typed lookups for a record that is not in the current snapshot
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Provider configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Retry policy exhaustion
    #[error("{0}")]
    RetryTaskFailed(String),

    /// A single retried attempt exceeded its timeout
    #[error("Retry attempt timed out")]
    RetryTimeout,

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store endpoint could not be reached
    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),

    /// A store request did not complete in time
    #[error("Coordination store request timed out after {0:?}")]
    Timeout(Duration),

    /// The requested start revision has been compacted away
    #[error("Revision {requested} compacted (compact revision {compact_revision})")]
    Compacted { requested: i64, compact_revision: i64 },

    /// A watch subscription was cancelled by the server
    #[error("Watch cancelled by server: {0}")]
    WatchCancelled(String),

    /// Any other client-side failure
    #[error("Coordination store error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON payload does not match the record schema
    #[error("Malformed {category} record at {key}: {source}")]
    Json {
        key: String,
        category: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Value is not valid UTF-8 where a string was expected
    #[error("Non UTF-8 value at {key}")]
    Utf8 { key: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Disk I/O failures during load/save
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encode/decode failures for the cached snapshot
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    /// No cached snapshot exists yet
    #[error("Cache is empty")]
    Empty,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WatchError {
    #[error("Provider already watching")]
    AlreadyRunning,
}

/// Message layout shared with the typed per-domain caches:
/// `<resource> config not found for tenant <id>[, service <code>]`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("tenant meta config not found for tenant {tenant_id}")]
    TenantMeta { tenant_id: TenantId },

    #[error("database config not found for tenant {tenant_id}, service {service_code}")]
    Database {
        tenant_id: TenantId,
        service_code: String,
    },

    #[error("ftp config not found for tenant {tenant_id}")]
    Ftp { tenant_id: TenantId },

    #[error("storage config not found for tenant {tenant_id}")]
    Storage { tenant_id: TenantId },

    #[error("domain config not found for tenant {tenant_id}")]
    Domain { tenant_id: TenantId },
}
