//! # Cache Store
//!
//! Named, thread-safe key/value cache with expiry, capacity-bounded LRU
//! eviction, statistics and entry events, backed by [`moka::sync::Cache`].
//!
//! ## Storage
//!
//! moka owns the entries. The configured [`ExpiryPolicy`] is plugged in as a
//! per-entry [`Expiry`], `max_entries` becomes moka's `max_capacity` under
//! the LRU eviction policy, and moka's eviction listener records every
//! departure together with its [`RemovalCause`]. Each operation turns those
//! removals into entry events:
//!
//! | `RemovalCause` | Event |
//! |---|---|
//! | `Replaced` | `Updated` (with the replaced value) |
//! | `Explicit` | `Removed` |
//! | `Expired` | `Expired` |
//! | `Size` | `Evicted` |
//!
//! ## Ordering
//!
//! Operations on one cache are sequenced by a reentrant lock that is held
//! while the operation's events are dispatched, so listeners observe events
//! in the order the store applied them. Synchronous listeners run on the
//! calling thread and may call back into the same cache.
//!
//! ## Expiry
//!
//! An expired entry is never returned. Its `Expired` event is produced when
//! moka reclaims it: when the key is written again, during moka's
//! housekeeping, or on [`Cache::purge_expired`], which the manager's reaper
//! calls periodically when configured.

use super::events::{
    CacheEntryEvent, CacheEventType, EventDispatcher, ListenerConfiguration, ListenerId,
};
use super::expiry::ExpiryPolicy;
use super::statistics::CacheStatistics;
use crate::config::CacheConfiguration;
use crate::error::{IndexedCacheError, Result};
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Adapts an [`ExpiryPolicy`] to moka's per-entry expiry hooks
struct PolicyExpiry(ExpiryPolicy);

impl<K, V> Expiry<K, V> for PolicyExpiry {
    fn expire_after_create(&self, _key: &K, _value: &V, _created_at: Instant) -> Option<Duration> {
        self.0.expiry_for_creation()
    }

    fn expire_after_read(
        &self,
        _key: &K,
        _value: &V,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        self.0.expiry_for_access().unwrap_or(duration_until_expiry)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        _value: &V,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.0.expiry_for_update().unwrap_or(duration_until_expiry)
    }
}

/// An entry moka dropped, as reported to the eviction listener
struct Removal<K, V> {
    key: Arc<K>,
    value: V,
    cause: RemovalCause,
}

type RemovalLog<K, V> = Arc<Mutex<Vec<Removal<K, V>>>>;

enum PutOutcome<V> {
    Created,
    Updated(V),
    Present,
    /// Zero creation TTL or zero capacity: the value was never stored
    Discarded,
}

/// A named key/value cache
pub struct Cache<K, V> {
    name: Arc<str>,
    configuration: CacheConfiguration,
    entries: moka::sync::Cache<K, V>,
    removals: RemovalLog<K, V>,
    sequencer: ReentrantMutex<()>,
    statistics: Arc<CacheStatistics>,
    dispatcher: EventDispatcher<K, V>,
    closed: AtomicBool,
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("configuration", &self.configuration)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a standalone cache; use [`super::CacheManager`] for named lookup and reaping
    pub fn new(name: impl Into<String>, configuration: CacheConfiguration) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let removals: RemovalLog<K, V> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&removals);
        let mut builder = moka::sync::Cache::builder()
            .name(&name)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(PolicyExpiry(configuration.expiry))
            .eviction_listener(move |key: Arc<K>, value: V, cause: RemovalCause| {
                sink.lock().push(Removal { key, value, cause });
            });
        if let Some(max_entries) = configuration.max_entries {
            builder = builder.max_capacity(max_entries as u64);
        }

        info!(
            cache = %name,
            expiry = ?configuration.expiry,
            max_entries = ?configuration.max_entries,
            statistics_enabled = configuration.statistics_enabled,
            "Created cache"
        );
        Self {
            dispatcher: EventDispatcher::new(
                Arc::clone(&name),
                configuration.event_channel_capacity,
            ),
            statistics: Arc::new(CacheStatistics::new(configuration.statistics_enabled)),
            entries: builder.build(),
            removals,
            sequencer: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
            configuration,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn configuration(&self) -> &CacheConfiguration {
        &self.configuration
    }

    pub fn statistics(&self) -> &Arc<CacheStatistics> {
        &self.statistics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(IndexedCacheError::cache_closed(self.name.as_ref()))
        } else {
            Ok(())
        }
    }

    /// Run `operation` with every other operation on this cache held off
    pub(crate) fn exclusive<R>(&self, operation: impl FnOnce() -> R) -> R {
        let _order = self.sequencer.lock();
        operation()
    }

    fn stores_nothing(&self) -> bool {
        self.configuration.max_entries == Some(0)
            || self
                .configuration
                .expiry
                .expiry_for_creation()
                .is_some_and(|ttl| ttl.is_zero())
    }

    fn drain_removals(&self) -> Vec<Removal<K, V>> {
        std::mem::take(&mut *self.removals.lock())
    }

    fn push_departure(&self, removal: Removal<K, V>, events: &mut Vec<CacheEntryEvent<K, V>>) {
        let event_type = match removal.cause {
            RemovalCause::Explicit => {
                self.statistics.record_removals(1);
                CacheEventType::Removed
            }
            RemovalCause::Expired => {
                self.statistics.record_expirations(1);
                CacheEventType::Expired
            }
            RemovalCause::Size => {
                debug!(cache = %self.name, key = ?removal.key, "Evicted least recently used entry");
                self.statistics.record_evictions(1);
                CacheEventType::Evicted
            }
            // Replacements become `Updated` where the write happens
            RemovalCause::Replaced => {
                trace!(cache = %self.name, key = ?removal.key, "Ignoring stray replacement");
                return;
            }
        };
        events.push(CacheEntryEvent::departed(
            &self.name,
            event_type,
            K::clone(&removal.key),
            removal.value,
        ));
    }

    /// Departures moka reported since the last operation
    fn departures(&self) -> Vec<CacheEntryEvent<K, V>> {
        let mut events = Vec::new();
        for removal in self.drain_removals() {
            self.push_departure(removal, &mut events);
        }
        events
    }

    /// Store `value`, record `Created` or `Updated`, then any evictions; returns the replaced value
    fn write(&self, key: K, value: V, events: &mut Vec<CacheEntryEvent<K, V>>) -> Option<V> {
        self.entries.insert(key.clone(), value.clone());

        let mut previous = None;
        for removal in self.drain_removals() {
            if matches!(removal.cause, RemovalCause::Replaced) && *removal.key == key {
                previous = Some(removal.value);
            } else {
                self.push_departure(removal, events);
            }
        }
        events.push(match &previous {
            Some(old) => CacheEntryEvent::updated(&self.name, key, value, old.clone()),
            None => CacheEntryEvent::created(&self.name, key, value),
        });

        if self.configuration.max_entries.is_some() {
            self.entries.run_pending_tasks();
            for removal in self.drain_removals() {
                self.push_departure(removal, events);
            }
        }
        previous
    }

    /// Invalidate `key`, returning the live value it held
    fn take(&self, key: &K, events: &mut Vec<CacheEntryEvent<K, V>>) -> Option<V> {
        self.entries.invalidate(key);
        let mut removed = None;
        for removal in self.drain_removals() {
            if matches!(removal.cause, RemovalCause::Explicit) && *removal.key == *key {
                removed = Some(removal.value.clone());
            }
            self.push_departure(removal, events);
        }
        removed
    }

    /// Read a value, applying access expiry and recording a hit or miss
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let started = Instant::now();

        let value = self.entries.get(key);
        match value {
            Some(_) => self.statistics.record_hits(1),
            None => self.statistics.record_misses(1),
        }
        self.statistics.record_get_time(started.elapsed());
        self.dispatcher.dispatch(self.departures());
        Ok(value)
    }

    /// Read several values; missing keys are absent from the result
    pub fn get_all<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<HashMap<K, V>>
    where
        K: 'a,
    {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let started = Instant::now();
        let mut found = HashMap::new();
        let mut misses = 0u64;

        for key in keys {
            match self.entries.get(key) {
                Some(value) => {
                    found.insert(key.clone(), value);
                }
                None => misses += 1,
            }
        }

        self.statistics.record_hits(found.len() as u64);
        self.statistics.record_misses(misses);
        self.statistics.record_get_time(started.elapsed());
        self.dispatcher.dispatch(self.departures());
        Ok(found)
    }

    /// Whether a live entry exists; does not count as a read
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let present = self.entries.contains_key(key);
        self.dispatcher.dispatch(self.departures());
        Ok(present)
    }

    fn put_internal(&self, key: K, value: V, only_if_absent: bool) -> Result<PutOutcome<V>> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let started = Instant::now();
        let mut events = Vec::new();

        let outcome = if self.stores_nothing() {
            trace!(cache = %self.name, key = ?key, "Value discarded on arrival");
            PutOutcome::Discarded
        } else if only_if_absent && self.entries.contains_key(&key) {
            PutOutcome::Present
        } else {
            match self.write(key, value, &mut events) {
                Some(old) => PutOutcome::Updated(old),
                None => PutOutcome::Created,
            }
        };

        if !matches!(outcome, PutOutcome::Present) {
            self.statistics.record_puts(1);
            self.statistics.record_put_time(started.elapsed());
        }
        events.extend(self.departures());
        self.dispatcher.dispatch(events);
        Ok(outcome)
    }

    /// Store a value, replacing any existing one
    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.put_internal(key, value, false).map(|_| ())
    }

    /// Store a value and return the one it replaced
    pub fn get_and_put(&self, key: K, value: V) -> Result<Option<V>> {
        let previous = match self.put_internal(key, value, false)? {
            PutOutcome::Updated(old) => Some(old),
            _ => None,
        };
        match previous {
            Some(_) => self.statistics.record_hits(1),
            None => self.statistics.record_misses(1),
        }
        Ok(previous)
    }

    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        let _order = self.sequencer.lock();
        for (key, value) in entries {
            self.put_internal(key, value, false)?;
        }
        Ok(())
    }

    /// Store a value only if no live entry exists; returns whether it was stored
    pub fn put_if_absent(&self, key: K, value: V) -> Result<bool> {
        Ok(matches!(
            self.put_internal(key, value, true)?,
            PutOutcome::Created | PutOutcome::Discarded
        ))
    }

    fn remove_internal(&self, key: &K, matches: impl FnOnce(&V) -> bool) -> Result<Option<V>> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let started = Instant::now();
        let mut events = Vec::new();

        let removed = if self.entries.contains_key(key) {
            // Conditional removal reads the current value, which counts as an access
            let matched = self.entries.get(key).is_some_and(|current| matches(&current));
            if matched {
                self.take(key, &mut events)
            } else {
                None
            }
        } else {
            None
        };

        if removed.is_some() {
            self.statistics.record_remove_time(started.elapsed());
        }
        events.extend(self.departures());
        self.dispatcher.dispatch(events);
        Ok(removed)
    }

    /// Remove an entry; returns whether a live entry was removed
    pub fn remove(&self, key: &K) -> Result<bool> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let started = Instant::now();
        let mut events = Vec::new();

        let removed = self.take(key, &mut events).is_some();
        if removed {
            self.statistics.record_remove_time(started.elapsed());
        }
        self.dispatcher.dispatch(events);
        Ok(removed)
    }

    /// Remove an entry only if it currently maps to `expected`
    pub fn remove_if_equals(&self, key: &K, expected: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        Ok(self.remove_internal(key, |v| v == expected)?.is_some())
    }

    pub fn get_and_remove(&self, key: &K) -> Result<Option<V>> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let started = Instant::now();
        let mut events = Vec::new();

        let removed = self.take(key, &mut events);
        match removed {
            Some(_) => {
                self.statistics.record_hits(1);
                self.statistics.record_remove_time(started.elapsed());
            }
            None => self.statistics.record_misses(1),
        }
        self.dispatcher.dispatch(events);
        Ok(removed)
    }

    fn replace_internal(
        &self,
        key: &K,
        value: V,
        matches: impl FnOnce(&V) -> bool,
    ) -> Result<Option<V>> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let started = Instant::now();
        let mut events = Vec::new();

        let current = if self.entries.contains_key(key) {
            self.entries.get(key)
        } else {
            None
        };
        let replaced = match &current {
            Some(existing) if matches(existing) => self.write(key.clone(), value, &mut events),
            _ => None,
        };

        if current.is_some() {
            self.statistics.record_hits(1);
        } else {
            self.statistics.record_misses(1);
        }
        if replaced.is_some() {
            self.statistics.record_puts(1);
            self.statistics.record_put_time(started.elapsed());
        }
        events.extend(self.departures());
        self.dispatcher.dispatch(events);
        Ok(replaced)
    }

    /// Replace the value of an existing entry; returns whether it existed
    pub fn replace(&self, key: &K, value: V) -> Result<bool> {
        Ok(self.replace_internal(key, value, |_| true)?.is_some())
    }

    /// Replace the value only if it currently equals `expected`
    pub fn replace_if_equals(&self, key: &K, expected: &V, value: V) -> Result<bool>
    where
        V: PartialEq,
    {
        Ok(self
            .replace_internal(key, value, |current| current == expected)?
            .is_some())
    }

    pub fn get_and_replace(&self, key: &K, value: V) -> Result<Option<V>> {
        self.replace_internal(key, value, |_| true)
    }

    pub fn remove_all_keys<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<usize>
    where
        K: 'a,
    {
        let _order = self.sequencer.lock();
        let mut removed = 0;
        for key in keys {
            if self.remove(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn live_keys(&self) -> Vec<K> {
        self.entries.iter().map(|(key, _)| K::clone(&key)).collect()
    }

    /// Remove every entry, notifying listeners for each one
    pub fn remove_all(&self) -> Result<usize> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        let mut events = Vec::new();

        let mut removed = 0;
        for key in self.live_keys() {
            if self.take(&key, &mut events).is_some() {
                removed += 1;
            }
        }
        self.dispatcher.dispatch(events);
        Ok(removed)
    }

    /// Drop every entry without notifying listeners or touching statistics
    pub fn clear(&self) -> Result<()> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        for key in self.live_keys() {
            self.entries.invalidate(&key);
        }
        self.removals.lock().clear();
        Ok(())
    }

    /// Number of live entries
    pub fn entry_count(&self) -> Result<usize> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        Ok(self.entries.iter().count())
    }

    pub fn keys(&self) -> Result<Vec<K>> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        Ok(self.live_keys())
    }

    /// Snapshot of live entries; does not count as reads
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        Ok(self
            .entries
            .iter()
            .map(|(key, value)| (K::clone(&key), value))
            .collect())
    }

    /// Reclaim expired entries now; returns how many were reclaimed
    pub fn purge_expired(&self) -> Result<usize> {
        let _order = self.sequencer.lock();
        self.ensure_open()?;
        self.entries.run_pending_tasks();

        let events = self.departures();
        let purged = events
            .iter()
            .filter(|event| event.event_type == CacheEventType::Expired)
            .count();
        if purged > 0 {
            debug!(cache = %self.name, purged, "Purged expired entries");
        }
        self.dispatcher.dispatch(events);
        Ok(purged)
    }

    pub fn register_listener(&self, configuration: ListenerConfiguration<K, V>) -> Result<ListenerId> {
        self.ensure_open()?;
        Ok(self.dispatcher.register(configuration))
    }

    pub fn deregister_listener(&self, id: ListenerId) -> bool {
        self.dispatcher.deregister(id)
    }

    pub fn listener_count(&self) -> usize {
        self.dispatcher.listener_count()
    }

    /// Receive every entry event through a broadcast channel
    pub fn subscribe(&self) -> Result<broadcast::Receiver<CacheEntryEvent<K, V>>> {
        self.ensure_open()?;
        Ok(self.dispatcher.subscribe())
    }

    /// Close the cache, discarding its contents; later calls are no-ops
    pub fn close(&self) {
        {
            let _order = self.sequencer.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            self.entries.invalidate_all();
            self.entries.run_pending_tasks();
            self.removals.lock().clear();
        }
        self.dispatcher.shutdown();
        info!(cache = %self.name, "Closed cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::thread;

    fn recording_cache(
        configuration: CacheConfiguration,
    ) -> (Cache<String, i32>, Arc<PlMutex<Vec<CacheEntryEvent<String, i32>>>>) {
        let cache = Cache::new("store-test", configuration);
        let events = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        cache
            .register_listener(
                ListenerConfiguration::new(move |event: &CacheEntryEvent<String, i32>| {
                    sink.lock().push(event.clone());
                })
                .synchronous(),
            )
            .unwrap();
        (cache, events)
    }

    fn types(events: &PlMutex<Vec<CacheEntryEvent<String, i32>>>) -> Vec<CacheEventType> {
        events.lock().iter().map(|e| e.event_type).collect()
    }

    /// Expired entries are reclaimed on moka's timer wheel, so sweep until `expected` are gone
    fn purge_until(cache: &Cache<String, i32>, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut purged = 0;
        while purged < expected && Instant::now() < deadline {
            purged += cache.purge_expired().unwrap();
            thread::sleep(Duration::from_millis(25));
        }
        purged
    }

    #[test]
    fn test_put_get_and_statistics() {
        let cache: Cache<String, i32> =
            Cache::new("stats", CacheConfiguration::default().with_statistics(true));
        cache.put("a".to_string(), 1).unwrap();
        assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(1));
        assert_eq!(cache.get(&"b".to_string()).unwrap(), None);

        let stats = cache.statistics();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.puts(), 1);
    }

    #[test]
    fn test_create_update_remove_events() {
        let (cache, events) = recording_cache(CacheConfiguration::default());
        cache.put("a".to_string(), 1).unwrap();
        cache.put("a".to_string(), 2).unwrap();
        assert!(cache.remove(&"a".to_string()).unwrap());
        assert!(!cache.remove(&"a".to_string()).unwrap());

        assert_eq!(
            types(&events),
            vec![
                CacheEventType::Created,
                CacheEventType::Updated,
                CacheEventType::Removed
            ]
        );
        let recorded = events.lock();
        assert_eq!(recorded[1].old_value, Some(1));
        assert_eq!(recorded[1].value, Some(2));
        assert_eq!(recorded[2].old_value, Some(2));
        assert_eq!(recorded[2].value, None);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let (cache, events) =
            recording_cache(CacheConfiguration::default().with_max_entries(2));
        cache.put("a".to_string(), 1).unwrap();
        cache.put("b".to_string(), 2).unwrap();
        // Reading "a" makes "b" the eviction candidate
        cache.get(&"a".to_string()).unwrap();
        cache.put("c".to_string(), 3).unwrap();

        assert!(cache.contains_key(&"a".to_string()).unwrap());
        assert!(!cache.contains_key(&"b".to_string()).unwrap());
        assert!(cache.contains_key(&"c".to_string()).unwrap());
        assert_eq!(cache.entry_count().unwrap(), 2);

        let evicted: Vec<_> = events
            .lock()
            .iter()
            .filter(|e| e.event_type == CacheEventType::Evicted)
            .map(|e| (e.key.clone(), e.old_value))
            .collect();
        assert_eq!(evicted, vec![("b".to_string(), Some(2))]);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let (cache, events) =
            recording_cache(CacheConfiguration::default().with_max_entries(0));
        cache.put("a".to_string(), 1).unwrap();
        assert!(cache.put_if_absent("b".to_string(), 2).unwrap());
        assert_eq!(cache.entry_count().unwrap(), 0);
        assert_eq!(cache.get(&"a".to_string()).unwrap(), None);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_created_expiry_hides_then_reclaims() {
        let (cache, events) = recording_cache(
            CacheConfiguration::default()
                .with_expiry(ExpiryPolicy::created(Duration::from_millis(20))),
        );
        cache.put("a".to_string(), 1).unwrap();
        assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(1));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a".to_string()).unwrap(), None);
        assert!(!cache.contains_key(&"a".to_string()).unwrap());

        assert_eq!(purge_until(&cache, 1), 1);
        assert_eq!(
            types(&events),
            vec![CacheEventType::Created, CacheEventType::Expired]
        );
        assert_eq!(events.lock()[1].old_value, Some(1));
        assert_eq!(cache.statistics().expirations(), 0, "statistics disabled");
    }

    #[test]
    fn test_accessed_expiry_extends_on_read() {
        let cache: Cache<String, i32> = Cache::new(
            "accessed",
            CacheConfiguration::default()
                .with_expiry(ExpiryPolicy::accessed(Duration::from_millis(200))),
        );
        cache.put("a".to_string(), 1).unwrap();
        for _ in 0..4 {
            thread::sleep(Duration::from_millis(80));
            assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(1));
        }
        // contains_key is not an access, so the entry still runs out
        thread::sleep(Duration::from_millis(250));
        assert!(!cache.contains_key(&"a".to_string()).unwrap());
    }

    #[test]
    fn test_modified_expiry_resets_on_update() {
        let cache: Cache<String, i32> = Cache::new(
            "modified",
            CacheConfiguration::default()
                .with_expiry(ExpiryPolicy::modified(Duration::from_millis(200))),
        );
        cache.put("a".to_string(), 1).unwrap();
        thread::sleep(Duration::from_millis(120));
        cache.put("a".to_string(), 2).unwrap();
        thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(2));
    }

    #[test]
    fn test_zero_ttl_is_never_stored() {
        let (cache, events) = recording_cache(
            CacheConfiguration::default().with_expiry(ExpiryPolicy::created(Duration::ZERO)),
        );
        cache.put("a".to_string(), 1).unwrap();
        assert!(!cache.contains_key(&"a".to_string()).unwrap());
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache: Cache<String, i32> = Cache::new(
            "purge",
            CacheConfiguration::default()
                .with_statistics(true)
                .with_expiry(ExpiryPolicy::created(Duration::from_millis(10))),
        );
        cache.put("a".to_string(), 1).unwrap();
        cache.put("b".to_string(), 2).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.entry_count().unwrap(), 0);
        assert_eq!(purge_until(&cache, 2), 2);
        assert_eq!(cache.statistics().expirations(), 2);
    }

    #[test]
    fn test_conditional_operations() {
        let cache: Cache<String, i32> = Cache::new("conditional", CacheConfiguration::default());
        let key = "a".to_string();
        assert!(cache.put_if_absent(key.clone(), 1).unwrap());
        assert!(!cache.put_if_absent(key.clone(), 2).unwrap());
        assert_eq!(cache.get(&key).unwrap(), Some(1));

        assert!(!cache.replace_if_equals(&key, &5, 6).unwrap());
        assert!(cache.replace_if_equals(&key, &1, 7).unwrap());
        assert_eq!(cache.get_and_replace(&key, 8).unwrap(), Some(7));
        assert!(!cache.replace(&"missing".to_string(), 1).unwrap());

        assert!(!cache.remove_if_equals(&key, &7).unwrap());
        assert_eq!(cache.get_and_put(key.clone(), 9).unwrap(), Some(8));
        assert_eq!(cache.get_and_remove(&key).unwrap(), Some(9));
        assert_eq!(cache.get(&key).unwrap(), None);
    }

    #[test]
    fn test_get_all_and_remove_all() {
        let (cache, events) = recording_cache(CacheConfiguration::default());
        cache
            .put_all(vec![("a".to_string(), 1), ("b".to_string(), 2)])
            .unwrap();
        let found = cache
            .get_all(&["a".to_string(), "z".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("a"), Some(&1));

        assert_eq!(cache.remove_all().unwrap(), 2);
        assert_eq!(cache.entry_count().unwrap(), 0);
        let removed = events
            .lock()
            .iter()
            .filter(|e| e.event_type == CacheEventType::Removed)
            .count();
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_clear_is_silent() {
        let (cache, events) = recording_cache(CacheConfiguration::default());
        cache.put("a".to_string(), 1).unwrap();
        events.lock().clear();
        cache.clear().unwrap();
        assert_eq!(cache.entry_count().unwrap(), 0);
        cache.put("b".to_string(), 2).unwrap();
        assert_eq!(types(&events), vec![CacheEventType::Created]);
    }

    #[test]
    fn test_concurrent_writers_see_ordered_events() {
        let (cache, events) = recording_cache(CacheConfiguration::default());
        let cache = Arc::new(cache);
        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for round in 0..200 {
                        cache.put("shared".to_string(), writer * 1000 + round).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let recorded = events.lock();
        assert_eq!(recorded[0].event_type, CacheEventType::Created);
        // Each update replaces exactly the value announced before it
        for pair in recorded.windows(2) {
            assert_eq!(pair[1].event_type, CacheEventType::Updated);
            assert_eq!(pair[1].old_value, pair[0].value);
        }
        let last = recorded.last().and_then(|e| e.value);
        assert_eq!(cache.get(&"shared".to_string()).unwrap(), last);
    }

    #[test]
    fn test_listener_may_write_back_into_cache() {
        let cache = Arc::new(Cache::<String, i32>::new("reentrant", CacheConfiguration::default()));
        let weak = Arc::downgrade(&cache);
        cache
            .register_listener(
                ListenerConfiguration::new(move |event: &CacheEntryEvent<String, i32>| {
                    if let Some(cache) = weak.upgrade() {
                        if event.key == "source" {
                            cache.put("echo".to_string(), event.value.unwrap_or_default()).unwrap();
                        }
                    }
                })
                .for_events([CacheEventType::Created])
                .synchronous(),
            )
            .unwrap();

        cache.put("source".to_string(), 5).unwrap();
        assert_eq!(cache.get(&"echo".to_string()).unwrap(), Some(5));
    }

    #[test]
    fn test_closed_cache_rejects_operations() {
        let cache: Cache<String, i32> = Cache::new("closed", CacheConfiguration::default());
        cache.put("a".to_string(), 1).unwrap();
        cache.close();
        cache.close();
        assert!(cache.is_closed());
        assert!(cache.get(&"a".to_string()).unwrap_err().is_closed());
        assert!(cache.put("b".to_string(), 2).unwrap_err().is_closed());
    }
}
