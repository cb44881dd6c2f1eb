//! # Cache Layer
//!
//! JCache-style key/value caching: named caches with expiry policies,
//! capacity-bounded LRU eviction, statistics and entry events.
//!
//! ## Key Components
//!
//! - [`store`] - The [`Cache`] itself
//! - [`expiry`] - Created/accessed/modified/touched/eternal expiry policies
//! - [`events`] - Entry events, listeners and their delivery
//! - [`statistics`] - Lock-free hit/miss/put/removal counters
//! - [`manager`] - Registry of named caches and the expiry reaper
//!
//! ## Example Usage
//!
//! ```rust
//! use indexed_cache::cache::{CacheManager, ExpiryPolicy};
//! use indexed_cache::config::CacheConfiguration;
//! use std::time::Duration;
//!
//! let manager = CacheManager::new();
//! let cache = manager
//!     .create_cache::<String, u32>(
//!         "sessions",
//!         CacheConfiguration::default()
//!             .with_statistics(true)
//!             .with_expiry(ExpiryPolicy::created(Duration::from_secs(30))),
//!     )
//!     .unwrap();
//!
//! cache.put("alice".to_string(), 42).unwrap();
//! assert_eq!(cache.get(&"alice".to_string()).unwrap(), Some(42));
//! assert_eq!(manager.statistics("sessions").unwrap().hits(), 1);
//! ```

pub mod events;
pub mod expiry;
pub mod manager;
pub mod statistics;
pub mod store;

pub use events::{
    CacheEntryEvent, CacheEntryListener, CacheEventType, ListenerConfiguration, ListenerId,
};
pub use expiry::{ExpiryKind, ExpiryPolicy};
pub use manager::CacheManager;
pub use statistics::{CacheStatistics, CacheStatisticsSnapshot};
pub use store::Cache;
