use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Persist published snapshots and fall back to them when the store is
    /// unreachable at startup
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Cache file location. Unset means `$TENANT_CACHE_PATH/tenant_metadata.json`
    /// or `./cache/tenant_metadata.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: None,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(ConfigError::Message("cache.path cannot be empty".into())));
            }
        }
        Ok(())
    }
}

const fn default_enabled() -> bool {
    true
}
