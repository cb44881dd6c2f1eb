//! # Configuration System
//!
//! Per-cache configuration plus process-wide defaults loaded from files and
//! environment variables.
//!
//! ## Architecture
//!
//! - [`CacheConfiguration`] - Builder-style settings for one cache
//! - [`IndexedCacheConfig`] - Serializable defaults with environment presets
//! - [`ConfigLoader`] - Layered loading: preset, then file, then `INDEXED_CACHE__*` variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use indexed_cache::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load(None)?;
//! let cache_configuration = config.to_cache_configuration();
//! # Ok(())
//! # }
//! ```

pub mod indexed_cache_config;
pub mod loader;

use crate::cache::expiry::ExpiryPolicy;
use crate::constants::DEFAULT_EVENT_CHANNEL_CAPACITY;
use std::time::Duration;

pub use indexed_cache_config::IndexedCacheConfig;
pub use loader::ConfigLoader;

/// Settings for a single cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfiguration {
    pub statistics_enabled: bool,
    pub expiry: ExpiryPolicy,
    /// Upper bound on live entries; `None` is unbounded
    pub max_entries: Option<usize>,
    /// Period of the background expiry sweep; only honoured by [`crate::cache::CacheManager`]
    pub reaper_interval: Option<Duration>,
    pub event_channel_capacity: usize,
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        Self {
            statistics_enabled: false,
            expiry: ExpiryPolicy::Eternal,
            max_entries: None,
            reaper_interval: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl CacheConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    pub fn with_expiry(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    /// Bound the number of live entries; a bound of zero stores nothing
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = Some(interval);
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}
