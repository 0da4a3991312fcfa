//! Provider configuration.
//!
//! Loaded hierarchically, later sources overriding earlier ones:
//! 1. Type defaults
//! 2. Configuration file named by `CONFIG_PATH` (if set)
//! 3. Environment variables with the `TENANT__` prefix
//!
//! ```ignore
//! // TENANT__NAMESPACE=acme/ TENANT__WATCH__MAX_DELAY_MS=10000
//! let config = ProviderConfig::new()?.validate()?;
//! let provider = ProviderBuilder::from_config(store, &config).build()?;
//! ```

mod cache;
mod retry;
mod watch;


use std::env;

pub use cache::*;
use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
pub use retry::*;
use serde::Deserialize;
use serde::Serialize;
pub use watch::*;

use crate::constants::DEFAULT_NAMESPACE;
use crate::ConfigType;
use crate::Error;
use crate::Result;

const ENV_PREFIX: &str = "TENANT";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Root prefix of every key, e.g. `jxt/`
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Optional record categories to mirror
    #[serde(default = "default_config_types")]
    pub config_types: Vec<ConfigType>,

    /// Watch reconnection backoff
    #[serde(default)]
    pub watch: WatchConfig,

    /// Durable fallback cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Startup and watch-start retry policies
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            config_types: default_config_types(),
            watch: WatchConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryPolicies::default(),
        }
    }
}

impl ProviderConfig {
    /// Loads configuration from defaults, `CONFIG_PATH` and `TENANT__*`
    /// variables. Does not validate; call [`ProviderConfig::validate`] once
    /// all overrides are applied.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }
        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers another configuration file over the current values.
    /// Environment variables still take precedence.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        if self.namespace.is_empty() || !self.namespace.ends_with('/') {
            return Err(Error::Config(ConfigError::Message(format!(
                "namespace must be non-empty and end with '/', got {:?}",
                self.namespace
            ))));
        }
        if self.config_types.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "config_types must list at least one of database, ftp, storage".into(),
            )));
        }
        self.watch.validate()?;
        self.cache.validate()?;
        self.retry.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("config_types")
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_config_types() -> Vec<ConfigType> {
    ConfigType::ALL.to_vec()
}
