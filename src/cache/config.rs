//! Cache configuration.
//!
//! Controls the lifetime and size of the form state pools via `stepform.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

/// Seven days.
pub const DEFAULT_TTL_SECONDS: u64 = 604_800;
const DEFAULT_POOL_CAPACITY: usize = 10_000;

/// Cache configuration from the `[cache]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime shared by the class-id, attribute and value records of a form.
    pub ttl_seconds: u64,
    /// Maximum entries held by each pool before LRU eviction.
    pub pool_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl_seconds: settings.ttl.as_secs(),
            pool_capacity: settings.pool_capacity.get(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Returns the pool capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn pool_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.pool_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
