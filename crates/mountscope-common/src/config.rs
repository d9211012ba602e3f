//! Configuration model for the mount resolver.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{MountError, Result};

/// Tunables of the mount resolver.
///
/// Missing fields in a configuration file fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Whether cache misses may fall back to scanning `/proc/<pid>/mountinfo`.
    pub use_procfs: bool,
    /// Root of the proc filesystem.
    pub proc_root: PathBuf,
    /// Grace delay between a delete request and its redemption.
    pub delete_delay: Duration,
    /// Period of the maintenance sweep.
    pub dequeue_interval: Duration,
    /// Capacity of the redemption cache.
    pub redemption_capacity: usize,
    /// Number of mount IDs tracked by the fallback limiter.
    pub fallback_limiter_keys: usize,
    /// Refill period of the fallback limiter.
    pub fallback_limiter_period: Duration,
    /// Rescans allowed per mount ID within one period.
    pub fallback_limiter_burst: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_procfs: true,
            proc_root: PathBuf::from(constants::DEFAULT_PROC_ROOT),
            delete_delay: constants::DEFAULT_DELETE_DELAY,
            dequeue_interval: constants::DEFAULT_DEQUEUE_INTERVAL,
            redemption_capacity: constants::DEFAULT_REDEMPTION_CAPACITY,
            fallback_limiter_keys: constants::DEFAULT_FALLBACK_LIMITER_KEYS,
            fallback_limiter_period: constants::DEFAULT_FALLBACK_LIMITER_PERIOD,
            fallback_limiter_burst: constants::DEFAULT_FALLBACK_LIMITER_BURST,
        }
    }
}

impl ResolverConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or holds invalid values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MountError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that capacities and periods are usable.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let invalid = if self.redemption_capacity == 0 {
            Some("redemption_capacity must be greater than zero")
        } else if self.fallback_limiter_keys == 0 {
            Some("fallback_limiter_keys must be greater than zero")
        } else if self.fallback_limiter_period.is_zero() {
            Some("fallback_limiter_period must be greater than zero")
        } else if self.fallback_limiter_burst == 0 {
            Some("fallback_limiter_burst must be greater than zero")
        } else if self.dequeue_interval.is_zero() {
            Some("dequeue_interval must be greater than zero")
        } else {
            None
        };

        match invalid {
            Some(message) => Err(MountError::Config {
                message: message.into(),
            }),
            None => Ok(()),
        }
    }
}
