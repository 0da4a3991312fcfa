//! Replicated, read-optimized multi-tenant configuration provider.
//!
//! Tenant configuration (identity, per-service databases, FTP accounts,
//! storage quotas, domains and resolver settings) lives in a watchable
//! key-value coordination store. [`TenantProvider`] mirrors it into an
//! immutable in-memory [`TenantSnapshot`] that any number of threads read
//! without locks, keeps it current from a watch subscription that survives
//! disconnects, and falls back to a durable local copy when the store is
//! unreachable at startup.
//!
//! ```ignore
//! let config = ProviderConfig::new()?.validate()?;
//! let provider = ProviderBuilder::from_config(store, &config).connect().await?;
//! provider.start_watch(&shutdown_token).await?;
//!
//! let db = provider.require_service_database_config(1, "evidence-command")?;
//! ```

mod cache;
mod config;
mod constants;
mod errors;
mod keyspace;
mod model;
mod provider;
mod snapshot;
mod store;
mod utils;

pub mod metrics;

pub use cache::*;
pub use config::*;
pub use constants::CACHE_PATH_ENV;
pub use constants::DEFAULT_NAMESPACE;
pub use constants::DEFAULT_TENANT_HEADER;
pub use errors::*;
pub use keyspace::*;
pub use metrics::register_custom_metrics;
pub use model::*;
pub use provider::*;
pub use snapshot::*;
pub use store::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
