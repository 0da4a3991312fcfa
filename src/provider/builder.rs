//! Fluent construction of a [`TenantProvider`].
//!
//! ```ignore
//! let provider = TenantProvider::builder(store)
//!     .namespace("jxt/")
//!     .config_types([ConfigType::Database, ConfigType::Ftp])
//!     .cache(Arc::new(FileCache::from_env()))
//!     .connect()
//!     .await?;
//! provider.start_watch(&shutdown).await?;
//! ```

use std::sync::Arc;

use tracing::debug;

use super::ProviderInner;
use super::TenantProvider;
use crate::default_cache_path;
use crate::constants::DEFAULT_NAMESPACE;
use crate::ConfigType;
use crate::CoordinationStore;
use crate::FallbackCache;
use crate::FileCache;
use crate::KeyCodec;
use crate::KeySpace;
use crate::ProviderConfig;
use crate::Result;
use crate::RetryPolicies;
use crate::WatchConfig;

pub struct ProviderBuilder {
    pub(super) store: Arc<dyn CoordinationStore>,
    pub(super) namespace: String,
    pub(super) config_types: Vec<ConfigType>,
    pub(super) cache: Option<Arc<dyn FallbackCache>>,
    pub(super) watch_config: WatchConfig,
    pub(super) retry: RetryPolicies,
}

impl std::fmt::Debug for ProviderBuilder {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ProviderBuilder")
            .field("namespace", &self.namespace)
            .field("config_types", &self.config_types)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl ProviderBuilder {
    /// Defaults: namespace `jxt/`, all config types, no fallback cache.
    pub fn new(store: impl CoordinationStore) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    pub fn with_shared_store(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            config_types: ConfigType::ALL.to_vec(),
            cache: None,
            watch_config: WatchConfig::default(),
            retry: RetryPolicies::default(),
        }
    }

    /// Applies a loaded [`ProviderConfig`]. An enabled cache becomes a
    /// [`FileCache`] at the configured path.
    pub fn from_config(
        store: impl CoordinationStore,
        config: &ProviderConfig,
    ) -> Self {
        let mut builder = Self::new(store)
            .namespace(config.namespace.clone())
            .config_types(config.config_types.iter().copied())
            .watch_config(config.watch)
            .retry(config.retry);
        if config.cache.enabled {
            let path = config.cache.path.clone().unwrap_or_else(default_cache_path);
            debug!(path = %path.display(), "fallback cache enabled");
            builder = builder.cache(Arc::new(FileCache::new(path)));
        }
        builder
    }

    pub fn namespace(
        mut self,
        namespace: impl Into<String>,
    ) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn config_types(
        mut self,
        config_types: impl IntoIterator<Item = ConfigType>,
    ) -> Self {
        self.config_types = config_types.into_iter().collect();
        self
    }

    pub fn cache(
        mut self,
        cache: Arc<dyn FallbackCache>,
    ) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn watch_config(
        mut self,
        watch_config: WatchConfig,
    ) -> Self {
        self.watch_config = watch_config;
        self
    }

    pub fn retry(
        mut self,
        retry: RetryPolicies,
    ) -> Self {
        self.retry = retry;
        self
    }

    /// Assembles the provider with an empty snapshot. Nothing is read from
    /// the store until `load_all` or `start_watch`.
    ///
    /// Fails if the watch backoff or retry policies are out of range.
    pub fn build(self) -> Result<TenantProvider> {
        self.watch_config.validate()?;
        self.retry.validate()?;
        let codec = KeyCodec::new(KeySpace::new(self.namespace), self.config_types);
        Ok(TenantProvider {
            inner: Arc::new(ProviderInner::new(
                self.store,
                codec,
                self.cache,
                self.watch_config,
                self.retry,
            )),
        })
    }

    /// Builds and performs the startup load, see [`TenantProvider::connect_with_retry`].
    pub async fn connect(self) -> Result<TenantProvider> {
        TenantProvider::connect_with_retry(self).await
    }
}
