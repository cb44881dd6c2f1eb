//! # System Constants
//!
//! Defaults and event names shared by caches, collections and the indexed cache.

use std::time::Duration;

/// Capacity of the per-cache broadcast channel and asynchronous listener queue
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// TTL applied by configuration presets when an expiring policy is selected
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Interval between background sweeps of expired entries in presets
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Environment variable prefix for configuration overrides (`INDEXED_CACHE__TTL_MILLIS=...`)
pub const ENV_PREFIX: &str = "INDEXED_CACHE";

/// Cache entry event names used in structured log output
pub mod events {
    pub const ENTRY_CREATED: &str = "cache.entry.created";
    pub const ENTRY_UPDATED: &str = "cache.entry.updated";
    pub const ENTRY_REMOVED: &str = "cache.entry.removed";
    pub const ENTRY_EXPIRED: &str = "cache.entry.expired";
    pub const ENTRY_EVICTED: &str = "cache.entry.evicted";
}

/// Retrieval costs reported by index implementations; lower is preferred by the planner
pub mod retrieval_costs {
    pub const UNIQUE_INDEX: usize = 25;
    pub const HASH_INDEX: usize = 30;
    pub const NAVIGABLE_INDEX: usize = 40;
    pub const RADIX_TREE_INDEX: usize = 50;
    pub const REVERSED_RADIX_TREE_INDEX: usize = 51;
    pub const SUFFIX_TREE_INDEX: usize = 53;
    pub const FULL_SCAN: usize = usize::MAX;
}
