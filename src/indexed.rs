//! # Indexed Cache
//!
//! Joins a [`Cache`] with an [`IndexedCollection`] of its values. Writes go
//! through both; a synchronous cache listener mirrors every change made to
//! the cache directly (puts, removals, expiry, eviction) into the collection,
//! so queries only ever see values that are live in the cache.
//!
//! ```rust
//! use std::sync::Arc;
//! use indexed_cache::cache::Cache;
//! use indexed_cache::collection::{query::*, Attribute, IndexedCollection, RadixTreeIndex};
//! use indexed_cache::config::CacheConfiguration;
//! use indexed_cache::indexed::IndexedCache;
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct User { id: u64, name: String }
//!
//! let name = Attribute::new("name", |u: &User| u.name.clone());
//! let cache = Arc::new(Cache::new("users", CacheConfiguration::default()));
//! let users = IndexedCache::new(
//!     Arc::new(IndexedCollection::new()),
//!     Arc::clone(&cache),
//!     |u: &User| u.id,
//! ).unwrap();
//! users.add_index(RadixTreeIndex::on_attribute(&name)).unwrap();
//!
//! users.add(User { id: 1, name: "Bob".into() }).unwrap();
//! users.add(User { id: 2, name: "Frank".into() }).unwrap();
//! cache.remove(&2).unwrap();
//!
//! assert_eq!(users.size(), 1);
//! assert_eq!(users.retrieve(&starts_with(&name, "B")).unwrap().size(), 1);
//! ```

use crate::cache::{Cache, CacheEntryEvent, CacheEventType, ListenerConfiguration, ListenerId};
use crate::collection::{Index, IndexedCollection, Query, QueryOptions, ResultSet};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Derives the cache key under which a value is stored
pub trait CacheKeyMaker<K, V>: Send + Sync {
    fn make_key(&self, value: &V) -> K;
}

impl<K, V, F> CacheKeyMaker<K, V> for F
where
    F: Fn(&V) -> K + Send + Sync,
{
    fn make_key(&self, value: &V) -> K {
        self(value)
    }
}

/// Uses each value as its own key
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCacheKeyMaker;

impl<V: Clone> CacheKeyMaker<V, V> for IdentityCacheKeyMaker {
    fn make_key(&self, value: &V) -> V {
        value.clone()
    }
}

/// Applies cache events to the collection, remembering the value last
/// announced for each key so a stale value for that key never survives a write
struct CollectionMirror<K, V> {
    collection: Weak<IndexedCollection<V>>,
    announced: Mutex<HashMap<K, V>>,
}

impl<K, V> CollectionMirror<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + Hash + Eq + Send + Sync + 'static,
{
    fn new(collection: &Arc<IndexedCollection<V>>) -> Self {
        Self {
            collection: Arc::downgrade(collection),
            announced: Mutex::new(HashMap::new()),
        }
    }

    fn seed(&self, entries: impl IntoIterator<Item = (K, V)>) {
        self.announced.lock().extend(entries);
    }

    fn forget_all(&self) {
        self.announced.lock().clear();
    }

    fn apply(&self, event: &CacheEntryEvent<K, V>) {
        let Some(collection) = self.collection.upgrade() else {
            return;
        };
        let mut announced = self.announced.lock();
        let outcome = match event.event_type {
            CacheEventType::Created | CacheEventType::Updated => match &event.value {
                Some(value) => {
                    let mut stale: Vec<V> = event.old_value.iter().cloned().collect();
                    if let Some(previous) = announced.insert(event.key.clone(), value.clone()) {
                        if previous != *value && !stale.contains(&previous) {
                            stale.push(previous);
                        }
                    }
                    stale.retain(|old| old != value);
                    collection
                        .update(stale.iter(), [value.clone()], &QueryOptions::default())
                        .map(|_| ())
                }
                None => Ok(()),
            },
            CacheEventType::Removed | CacheEventType::Expired | CacheEventType::Evicted => {
                if let Some(old_value) = &event.old_value {
                    // A later write for the key may already have been announced
                    if announced.get(&event.key) == Some(old_value) {
                        announced.remove(&event.key);
                    }
                    collection.remove(old_value);
                }
                Ok(())
            }
        };
        if let Err(e) = outcome {
            error!(
                cache = %event.cache_name,
                event = %event.event_type,
                error = %e,
                "Failed to mirror cache event into collection"
            );
        }
    }
}

/// A cache whose values are queryable through an indexed collection
pub struct IndexedCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Hash + Eq + Send + Sync + 'static,
{
    collection: Arc<IndexedCollection<V>>,
    cache: Arc<Cache<K, V>>,
    key_maker: Arc<dyn CacheKeyMaker<K, V>>,
    mirror: Arc<CollectionMirror<K, V>>,
    listener_id: ListenerId,
}

impl<K, V> fmt::Debug for IndexedCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Hash + Eq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedCache")
            .field("cache", &self.cache.name())
            .field("collection", &self.collection)
            .field("listener_id", &self.listener_id)
            .finish()
    }
}

impl<K, V> IndexedCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Hash + Eq + Send + Sync + 'static,
{
    /// Join `collection` to `cache`, copying in any values already cached
    pub fn new(
        collection: Arc<IndexedCollection<V>>,
        cache: Arc<Cache<K, V>>,
        key_maker: impl CacheKeyMaker<K, V> + 'static,
    ) -> Result<Self> {
        let mirror = Arc::new(CollectionMirror::new(&collection));

        // No cache event can slip between the snapshot and the listener
        let listener_id = cache.exclusive(|| -> Result<ListenerId> {
            let existing = cache.entries()?;
            let listening = Arc::clone(&mirror);
            let listener_id = cache.register_listener(
                ListenerConfiguration::new(move |event: &CacheEntryEvent<K, V>| {
                    listening.apply(event)
                })
                .synchronous(),
            )?;
            if !existing.is_empty() {
                if let Err(e) = collection.add_all(existing.iter().map(|(_, value)| value.clone())) {
                    cache.deregister_listener(listener_id);
                    return Err(e);
                }
                mirror.seed(existing);
            }
            Ok(listener_id)
        })?;
        debug!(
            cache = cache.name(),
            listener = %listener_id,
            size = collection.size(),
            "Indexed cache attached"
        );

        Ok(Self {
            collection,
            cache,
            key_maker: Arc::new(key_maker),
            mirror,
            listener_id,
        })
    }

    pub fn cache(&self) -> &Arc<Cache<K, V>> {
        &self.cache
    }

    pub fn collection(&self) -> &Arc<IndexedCollection<V>> {
        &self.collection
    }

    pub fn key_maker(&self) -> &Arc<dyn CacheKeyMaker<K, V>> {
        &self.key_maker
    }

    /// Add to the collection, then cache under the derived key
    pub fn add(&self, value: V) -> Result<bool> {
        let key = self.key_maker.make_key(&value);
        let added = self.collection.add(value.clone())?;
        if let Err(e) = self.cache.put(key, value.clone()) {
            if added {
                self.collection.remove(&value);
            }
            return Err(e);
        }
        Ok(added)
    }

    pub fn add_all(&self, values: impl IntoIterator<Item = V>) -> Result<bool> {
        let mut modified = false;
        for value in values {
            modified |= self.add(value)?;
        }
        Ok(modified)
    }

    /// Remove a member value; the cache entry goes only if it still holds this value
    pub fn remove(&self, value: &V) -> Result<bool> {
        let removed = self.collection.remove(value);
        if removed {
            self.cache
                .remove_if_equals(&self.key_maker.make_key(value), value)?;
        }
        Ok(removed)
    }

    pub fn remove_all<'a>(&self, values: impl IntoIterator<Item = &'a V>) -> Result<bool>
    where
        V: 'a,
    {
        let mut modified = false;
        for value in values {
            modified |= self.remove(value)?;
        }
        Ok(modified)
    }

    pub fn update<'a>(
        &self,
        to_remove: impl IntoIterator<Item = &'a V>,
        to_add: impl IntoIterator<Item = V>,
    ) -> Result<bool>
    where
        V: 'a,
    {
        self.update_with_options(to_remove, to_add, &QueryOptions::default())
    }

    /// Update the collection, then apply the same removals and additions to the cache
    pub fn update_with_options<'a>(
        &self,
        to_remove: impl IntoIterator<Item = &'a V>,
        to_add: impl IntoIterator<Item = V>,
        options: &QueryOptions<V>,
    ) -> Result<bool>
    where
        V: 'a,
    {
        let to_remove: Vec<&V> = to_remove.into_iter().collect();
        let to_add: Vec<V> = to_add.into_iter().collect();
        let modified = self.collection.update(
            to_remove.iter().copied(),
            to_add.iter().cloned(),
            options,
        )?;
        if !modified {
            return Ok(false);
        }
        for value in to_remove {
            self.cache
                .remove_if_equals(&self.key_maker.make_key(value), value)?;
        }
        for value in to_add {
            self.cache.put(self.key_maker.make_key(&value), value)?;
        }
        Ok(true)
    }

    pub fn contains(&self, value: &V) -> bool {
        self.collection.contains(value)
    }

    pub fn contains_all<'a>(&self, values: impl IntoIterator<Item = &'a V>) -> bool
    where
        V: 'a,
    {
        self.collection.contains_all(values)
    }

    pub fn size(&self) -> usize {
        self.collection.size()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Empty both sides; the cache is cleared without events
    pub fn clear(&self) -> Result<()> {
        self.cache.exclusive(|| -> Result<()> {
            self.cache.clear()?;
            self.collection.clear();
            self.mirror.forget_all();
            Ok(())
        })
    }

    pub fn add_index(&self, index: impl Index<V> + 'static) -> Result<()> {
        self.collection.add_index(index)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.collection.index_names()
    }

    /// Every indexed value, in insertion order
    pub fn to_vec(&self) -> Vec<V> {
        self.collection.to_vec()
    }

    pub fn retrieve(&self, query: &Query<V>) -> Result<ResultSet<V>> {
        self.retrieve_with_options(query, &QueryOptions::default())
    }

    /// Query the collection and read every match through the cache
    ///
    /// Each live match counts as a cache hit. Matches whose key is no longer
    /// cached, or is cached with a different value, are dropped from the
    /// result and from the collection. A query with no live matches counts as
    /// a single miss.
    pub fn retrieve_with_options(
        &self,
        query: &Query<V>,
        options: &QueryOptions<V>,
    ) -> Result<ResultSet<V>> {
        // Cache writes wait until the query has been checked against the cache
        self.cache.exclusive(|| -> Result<ResultSet<V>> {
            let candidates = self.collection.retrieve_with_options(query, options);
            let cost = candidates.retrieval_cost();
            let mut live = Vec::with_capacity(candidates.size());
            let mut stale = Vec::new();

            for candidate in candidates {
                let key = self.key_maker.make_key(&candidate);
                let cached = if self.cache.contains_key(&key)? {
                    self.cache.get(&key)?
                } else {
                    None
                };
                match cached {
                    Some(value) if value == *candidate => live.push(candidate),
                    _ => stale.push(candidate),
                }
            }

            if !stale.is_empty() {
                debug!(
                    cache = self.cache.name(),
                    stale = stale.len(),
                    "Pruning collection entries that are not cached"
                );
                self.collection.remove_all(stale.iter().map(Arc::as_ref));
            }
            if live.is_empty() {
                self.cache.statistics().record_misses(1);
            }
            Ok(ResultSet::new(live, cost))
        })
    }
}

impl<K, V> Drop for IndexedCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Hash + Eq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cache.deregister_listener(self.listener_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ExpiryPolicy;
    use crate::collection::query::{equal, starts_with};
    use crate::collection::{Attribute, HashIndex, UniqueIndex};
    use crate::config::CacheConfiguration;
    use crate::error::IndexedCacheError;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct User {
        id: u64,
        name: String,
    }

    fn user(id: u64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
        }
    }

    fn name() -> Attribute<User, String> {
        Attribute::new("name", |u: &User| u.name.clone())
    }

    fn users(configuration: CacheConfiguration) -> IndexedCache<u64, User> {
        let cache = Arc::new(Cache::new("users", configuration.with_statistics(true)));
        IndexedCache::new(Arc::new(IndexedCollection::new()), cache, |u: &User| u.id).unwrap()
    }

    #[test]
    fn test_identity_key_maker() {
        assert_eq!(IdentityCacheKeyMaker.make_key(&"a".to_string()), "a");
    }

    #[test]
    fn test_direct_cache_writes_are_mirrored() {
        let users = users(CacheConfiguration::default());
        users.add_index(HashIndex::on_attribute(&name())).unwrap();

        users.cache().put(1, user(1, "Bob")).unwrap();
        assert!(users.contains(&user(1, "Bob")));

        users.cache().put(1, user(1, "Robert")).unwrap();
        assert!(!users.contains(&user(1, "Bob")));
        assert!(users.contains(&user(1, "Robert")));
        assert!(users.retrieve(&equal(&name(), "Bob")).unwrap().is_empty());

        users.cache().remove(&1).unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_retrieve_counts_hits_and_one_miss() {
        let users = users(CacheConfiguration::default());
        users.add(user(1, "Bob")).unwrap();
        users.add(user(2, "Bobby")).unwrap();
        let statistics = Arc::clone(users.cache().statistics());
        statistics.clear();

        let found = users.retrieve(&starts_with(&name(), "Bo")).unwrap();
        assert_eq!(found.size(), 2);
        assert_eq!(statistics.hits(), 2);
        assert_eq!(statistics.misses(), 0);

        assert!(users.retrieve(&equal(&name(), "Nobody")).unwrap().is_empty());
        assert_eq!(statistics.misses(), 1);
    }

    #[test]
    fn test_zero_ttl_values_are_pruned() {
        let users = users(
            CacheConfiguration::default().with_expiry(ExpiryPolicy::created(Duration::ZERO)),
        );
        users.add(user(1, "Bob")).unwrap();
        assert_eq!(users.size(), 1);
        assert!(users.retrieve(&equal(&name(), "Bob")).unwrap().is_empty());
        assert!(users.is_empty());
    }

    #[test]
    fn test_failed_index_add_keeps_cache_untouched() {
        let users = users(CacheConfiguration::default());
        let id = Attribute::new("id", |u: &User| u.id);
        users.add_index(UniqueIndex::on_attribute(&id)).unwrap();
        users.add(user(1, "Bob")).unwrap();

        let err = users.add(user(1, "Imposter")).unwrap_err();
        assert!(matches!(err, IndexedCacheError::UniqueConstraintViolation { .. }));
        assert_eq!(users.cache().get(&1).unwrap(), Some(user(1, "Bob")));
    }

    #[test]
    fn test_drop_detaches_listener() {
        let cache = Arc::new(Cache::<u64, User>::new("users", CacheConfiguration::default()));
        cache.put(7, user(7, "Existing")).unwrap();
        let collection = Arc::new(IndexedCollection::new());
        {
            let users =
                IndexedCache::new(Arc::clone(&collection), Arc::clone(&cache), |u: &User| u.id)
                    .unwrap();
            assert!(users.contains(&user(7, "Existing")));
            assert_eq!(cache.listener_count(), 1);
        }
        assert_eq!(cache.listener_count(), 0);
        cache.put(8, user(8, "Later")).unwrap();
        assert_eq!(collection.size(), 1);
    }
}
