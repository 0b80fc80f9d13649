//! Lock manager configuration
//!
//! Limits and timeouts can be given in code or loaded from a TOML document
//! (for example a `[locks]` file shipped with the embedding engine). Every
//! value can also be changed at runtime through the manager's setters.

use crate::error::{LockError, LockResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default maximum number of locks held across all lock trees
pub const DEFAULT_MAX_LOCKS: u32 = 1_000_000;

/// Default maximum memory charged to locks, in bytes (64MB)
pub const DEFAULT_MAX_LOCK_MEMORY: u64 = 64 * 1024 * 1024;

/// Lock manager configuration
///
/// # Example
///
/// ```toml
/// # Maximum number of locks across all resources
/// max_locks = 1000000
///
/// # Maximum bytes of lock memory across all resources
/// max_lock_memory = 67108864
///
/// # Default wait for a blocked lock request in milliseconds, 0 = wait forever
/// default_wait_time_ms = 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockManagerConfig {
    /// Lock count ceiling
    #[serde(default = "default_max_locks")]
    pub max_locks: u32,
    /// Lock memory ceiling in bytes
    #[serde(default = "default_max_lock_memory")]
    pub max_lock_memory: u64,
    /// Default wait for blocked requests in milliseconds; 0 means unbounded
    #[serde(default)]
    pub default_wait_time_ms: u64,
}

fn default_max_locks() -> u32 {
    DEFAULT_MAX_LOCKS
}

fn default_max_lock_memory() -> u64 {
    DEFAULT_MAX_LOCK_MEMORY
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            max_locks: DEFAULT_MAX_LOCKS,
            max_lock_memory: DEFAULT_MAX_LOCK_MEMORY,
            default_wait_time_ms: 0,
        }
    }
}

impl LockManagerConfig {
    /// Config with explicit limits and an unbounded default wait
    pub fn with_limits(max_locks: u32, max_lock_memory: u64) -> Self {
        Self {
            max_locks,
            max_lock_memory,
            default_wait_time_ms: 0,
        }
    }

    /// Set the default wait
    pub fn default_wait_time(mut self, wait: Duration) -> Self {
        self.set_default_wait(wait);
        self
    }

    /// Store `wait` in whole milliseconds
    ///
    /// `Duration::ZERO` means wait forever. Any other wait is rounded up, so
    /// a bounded wait shorter than a millisecond stays bounded.
    pub fn set_default_wait(&mut self, wait: Duration) {
        self.default_wait_time_ms = if wait.is_zero() {
            0
        } else {
            let ms = (wait.as_nanos() + 999_999) / 1_000_000;
            u64::try_from(ms).unwrap_or(u64::MAX)
        };
    }

    /// Default wait for blocked requests; `None` means wait forever
    pub fn default_wait(&self) -> Option<Duration> {
        match self.default_wait_time_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Check that the limits are usable
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if either limit is zero.
    pub fn validate(&self) -> LockResult<()> {
        if self.max_locks == 0 {
            return Err(LockError::invalid_argument("max_locks must be at least 1"));
        }
        if self.max_lock_memory == 0 {
            return Err(LockError::invalid_argument(
                "max_lock_memory must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the default config document with comments.
    pub fn default_toml() -> &'static str {
        r#"# Range lock manager configuration
#
# Maximum number of locks across all resources.
# When reached, locks are escalated; if that does not free room,
# requests fail with "out of locks".
max_locks = 1000000

# Maximum bytes of lock memory across all resources (64MB).
max_lock_memory = 67108864

# Default wait for a blocked lock request, in milliseconds.
# 0 = wait until granted.
default_wait_time_ms = 0
"#
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> LockResult<Self> {
        let config: LockManagerConfig = toml::from_str(content).map_err(|e| {
            LockError::invalid_argument(format!("Failed to parse lock config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> LockResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::invalid_argument(format!(
                "Failed to read lock config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML.
    pub fn to_toml_string(&self) -> LockResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| LockError::invalid_argument(format!("Failed to serialize lock config: {}", e)))
    }
}
