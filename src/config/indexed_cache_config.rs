//! Indexed Cache Configuration Presets
//!
//! Serializable defaults for caches created by an application, with presets
//! for production, development and test environments.

use super::CacheConfiguration;
use crate::cache::expiry::{ExpiryKind, ExpiryPolicy};
use crate::constants::{DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_REAPER_INTERVAL, DEFAULT_TTL};
use crate::error::{IndexedCacheError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Default cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedCacheConfig {
    pub statistics_enabled: bool,
    pub expiry: ExpiryKind,
    pub ttl_millis: u64,
    pub max_entries: Option<usize>,
    pub reaper_interval_millis: Option<u64>,
    pub event_channel_capacity: usize,
}

impl Default for IndexedCacheConfig {
    /// Production defaults
    fn default() -> Self {
        Self {
            statistics_enabled: true,
            expiry: ExpiryKind::Eternal,
            ttl_millis: DEFAULT_TTL.as_millis() as u64,
            max_entries: None,
            reaper_interval_millis: Some(DEFAULT_REAPER_INTERVAL.as_millis() as u64),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl IndexedCacheConfig {
    /// Short TTLs and small bounds for fast test feedback
    pub fn for_test() -> Self {
        Self {
            statistics_enabled: true,
            expiry: ExpiryKind::Created,
            ttl_millis: 1_000,
            max_entries: Some(100),
            reaper_interval_millis: Some(100),
            event_channel_capacity: 64,
        }
    }

    pub fn for_development() -> Self {
        Self {
            statistics_enabled: true,
            expiry: ExpiryKind::Touched,
            ttl_millis: 60_000,
            max_entries: Some(1_000),
            reaper_interval_millis: Some(10_000),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Preset for a named environment; unknown names get production defaults
    pub fn for_environment(environment: &str) -> Self {
        match environment {
            "test" => Self::for_test(),
            "development" => Self::for_development(),
            _ => Self::default(),
        }
    }

    /// Preset for the environment detected from process variables
    pub fn from_environment() -> Self {
        let environment = detect_environment();
        info!(environment = %environment, "Selecting indexed cache configuration preset");
        Self::for_environment(&environment)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis)
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::from_kind(self.expiry, self.ttl())
    }

    pub fn reaper_interval(&self) -> Option<Duration> {
        self.reaper_interval_millis.map(Duration::from_millis)
    }

    pub fn to_cache_configuration(&self) -> CacheConfiguration {
        CacheConfiguration {
            statistics_enabled: self.statistics_enabled,
            expiry: self.expiry_policy(),
            max_entries: self.max_entries,
            reaper_interval: self.reaper_interval(),
            event_channel_capacity: self.event_channel_capacity,
        }
    }

    /// Reject values that would make a cache unusable
    pub fn validate(&self) -> Result<()> {
        if self.expiry != ExpiryKind::Eternal && self.ttl_millis == 0 {
            return Err(IndexedCacheError::configuration(
                "ttl_millis must be greater than 0 for an expiring policy",
            ));
        }

        if self.max_entries == Some(0) {
            return Err(IndexedCacheError::configuration(
                "max_entries must be greater than 0 when set",
            ));
        }

        if self.reaper_interval_millis == Some(0) {
            return Err(IndexedCacheError::configuration(
                "reaper_interval_millis must be greater than 0 when set",
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(IndexedCacheError::configuration(
                "event_channel_capacity must be greater than 0",
            ));
        }

        if self.expiry == ExpiryKind::Eternal && self.reaper_interval_millis.is_some() {
            warn!("Reaper configured for eternal entries - it will never find anything to purge");
        }

        if self.max_entries.is_some_and(|max| max < 10) {
            warn!(
                max_entries = ?self.max_entries,
                "Very small max_entries - expect frequent evictions"
            );
        }

        Ok(())
    }

    pub fn log_configuration(&self) {
        info!("Indexed Cache Configuration:");
        info!("  Statistics Enabled: {}", self.statistics_enabled);
        info!("  Expiry: {:?} ({}ms)", self.expiry, self.ttl_millis);
        info!("  Max Entries: {:?}", self.max_entries);
        info!("  Reaper Interval: {:?}ms", self.reaper_interval_millis);
        info!("  Event Channel Capacity: {}", self.event_channel_capacity);
    }
}

/// Environment name from `INDEXED_CACHE_ENV`, `APP_ENV` or `RUST_ENV`, else "production"
pub fn detect_environment() -> String {
    env::var("INDEXED_CACHE_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .or_else(|_| env::var("RUST_ENV"))
        .unwrap_or_else(|_| "production".to_string())
}
