use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::constants::DEFAULT_RECONNECT_BASE_DELAY_MS;
use crate::constants::DEFAULT_RECONNECT_MAX_DELAY_MS;
use crate::constants::DEFAULT_RECONNECT_MULTIPLIER;
use crate::Error;
use crate::Result;

/// Reconnect backoff for a lost watch subscription.
///
/// Each failed attempt waits `min(previous * multiplier, max_delay_ms)`,
/// starting from `base_delay_ms`. The delay drops back to the base once the
/// re-established stream delivers its first response.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct WatchConfig {
    /// **Default**: 1000
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// **Default**: 30000
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// **Default**: 1.5
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl WatchConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.base_delay_ms must be greater than 0".into(),
            )));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch.max_delay_ms ({}) must be >= watch.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ))));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch.multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            ))));
        }

        if self.max_delay_ms > 300_000 {
            warn!(
                "watch.max_delay_ms ({}) exceeds 5 minutes; tenant updates may lag far behind the store",
                self.max_delay_ms
            );
        }

        Ok(())
    }
}

const fn default_base_delay_ms() -> u64 {
    DEFAULT_RECONNECT_BASE_DELAY_MS
}

const fn default_max_delay_ms() -> u64 {
    DEFAULT_RECONNECT_MAX_DELAY_MS
}

const fn default_multiplier() -> f64 {
    DEFAULT_RECONNECT_MULTIPLIER
}
