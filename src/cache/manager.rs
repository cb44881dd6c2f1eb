//! # Cache Manager
//!
//! Registry of named caches with typed lookup, statistics lookup by cache
//! name and optional background reaping of expired entries.
//!
//! Caches of different key/value types live in the same manager; they are
//! stored type-erased and recovered with a checked downcast.

use super::statistics::CacheStatistics;
use super::store::Cache;
use crate::config::CacheConfiguration;
use crate::error::{IndexedCacheError, Result};
use crate::logging::log_cache_operation;
use crossbeam::channel;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

static GLOBAL_MANAGER: OnceLock<CacheManager> = OnceLock::new();

struct ManagedCache {
    cache: Arc<dyn Any + Send + Sync>,
    statistics: Arc<CacheStatistics>,
    close: Box<dyn Fn() + Send + Sync>,
}

/// Creates, finds and destroys named caches
#[derive(Default)]
pub struct CacheManager {
    caches: DashMap<String, ManagedCache>,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("caches", &self.cache_names())
            .finish()
    }
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide manager
    pub fn global() -> &'static CacheManager {
        GLOBAL_MANAGER.get_or_init(CacheManager::new)
    }

    /// Create a new named cache; fails if the name is taken
    pub fn create_cache<K, V>(
        &self,
        name: &str,
        configuration: CacheConfiguration,
    ) -> Result<Arc<Cache<K, V>>>
    where
        K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.caches.entry(name.to_string()) {
            Entry::Occupied(_) => Err(IndexedCacheError::cache_already_exists(name)),
            Entry::Vacant(slot) => {
                let reaper_interval = configuration.reaper_interval;
                let cache = Arc::new(Cache::<K, V>::new(name, configuration));
                if let Some(interval) = reaper_interval {
                    spawn_reaper(Arc::downgrade(&cache), interval);
                }

                let closer = Arc::downgrade(&cache);
                slot.insert(ManagedCache {
                    cache: Arc::clone(&cache) as Arc<dyn Any + Send + Sync>,
                    statistics: Arc::clone(cache.statistics()),
                    close: Box::new(move || {
                        if let Some(cache) = closer.upgrade() {
                            cache.close();
                        }
                    }),
                });
                log_cache_operation("create", name, "registered", None);
                Ok(cache)
            }
        }
    }

    /// Look up a cache by name with the key/value types it was created with
    pub fn get_cache<K, V>(&self, name: &str) -> Result<Arc<Cache<K, V>>>
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let managed = self
            .caches
            .get(name)
            .ok_or_else(|| IndexedCacheError::cache_not_found(name))?;
        Arc::clone(&managed.cache)
            .downcast::<Cache<K, V>>()
            .map_err(|_| IndexedCacheError::cache_type_mismatch(name))
    }

    pub fn get_or_create_cache<K, V>(
        &self,
        name: &str,
        configuration: CacheConfiguration,
    ) -> Result<Arc<Cache<K, V>>>
    where
        K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.get_cache(name) {
            Err(IndexedCacheError::CacheNotFound { .. }) => {
                match self.create_cache(name, configuration) {
                    // Lost a creation race; the winner's cache is the one to use
                    Err(IndexedCacheError::CacheAlreadyExists { .. }) => self.get_cache(name),
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Close a cache and forget it
    pub fn destroy_cache(&self, name: &str) -> Result<()> {
        let (_, managed) = self
            .caches
            .remove(name)
            .ok_or_else(|| IndexedCacheError::cache_not_found(name))?;
        (managed.close)();
        log_cache_operation("destroy", name, "closed", None);
        Ok(())
    }

    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Statistics of a named cache, regardless of its key/value types
    pub fn statistics(&self, name: &str) -> Option<Arc<CacheStatistics>> {
        self.caches.get(name).map(|m| Arc::clone(&m.statistics))
    }

    /// Turn statistics recording on or off for a named cache
    pub fn enable_statistics(&self, name: &str, enabled: bool) -> Result<()> {
        let statistics = self
            .statistics(name)
            .ok_or_else(|| IndexedCacheError::cache_not_found(name))?;
        statistics.set_enabled(enabled);
        Ok(())
    }

    /// Close and forget every cache
    pub fn close(&self) {
        let names = self.cache_names();
        for name in names {
            if let Some((_, managed)) = self.caches.remove(&name) {
                (managed.close)();
            }
        }
        debug!("Cache manager closed");
    }
}

/// Drive moka's pending maintenance on a fixed tick so expired entries are
/// reclaimed (and announced) without waiting for the next cache operation
fn spawn_reaper<K, V>(cache: Weak<Cache<K, V>>, interval: Duration)
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let name = cache
        .upgrade()
        .map(|c| c.name().to_string())
        .unwrap_or_default();
    let thread_name = format!("cache-reaper-{name}");
    let ticker = channel::tick(interval);

    let spawned = thread::Builder::new().name(thread_name).spawn(move || {
        while ticker.recv().is_ok() {
            let Some(cache) = cache.upgrade() else {
                break;
            };
            if cache.is_closed() {
                break;
            }
            if let Err(e) = cache.purge_expired() {
                debug!(cache = %cache.name(), error = %e, "Reaper stopping");
                break;
            }
        }
    });

    if let Err(e) = spawned {
        warn!(cache = %name, error = %e, "Failed to start expiry reaper");
    }
}
