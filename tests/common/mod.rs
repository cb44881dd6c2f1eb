//! # Shared Test Fixtures
//!
//! A small `Widget` domain used across the integration tests, plus a polling
//! helper for assertions on asynchronous listener delivery.

#![allow(dead_code)] // Each test binary uses a different subset

pub mod strategies;

use indexed_cache::collection::Attribute;
use indexed_cache::{Cache, CacheConfiguration, IndexedCache, IndexedCollection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Widget {
    pub id: u32,
    pub name: String,
    pub weight: u32,
    pub tags: Vec<String>,
}

impl Widget {
    pub fn new(id: u32, name: &str, weight: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            weight,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

pub fn widget_id() -> Attribute<Widget, u32> {
    Attribute::new("id", |w: &Widget| w.id)
}

pub fn name() -> Attribute<Widget, String> {
    Attribute::new("name", |w: &Widget| w.name.clone())
}

pub fn weight() -> Attribute<Widget, u32> {
    Attribute::new("weight", |w: &Widget| w.weight)
}

pub fn tags() -> Attribute<Widget, String> {
    Attribute::multi("tags", |w: &Widget| w.tags.clone())
}

/// Cache name unique within the test process
pub fn unique_name(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// An indexed cache of widgets keyed by id over a fresh cache
pub fn widget_cache(configuration: CacheConfiguration) -> IndexedCache<u32, Widget> {
    let cache = Arc::new(Cache::new(unique_name("widgets"), configuration));
    IndexedCache::new(Arc::new(IndexedCollection::new()), cache, |w: &Widget| w.id)
        .expect("Failed to attach indexed cache")
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Every cached widget is indexed and every indexed widget is the one cached under its id
pub fn assert_in_step(widgets: &IndexedCache<u32, Widget>) {
    let cached = widgets.cache().entries().expect("cache is open");
    let indexed = widgets.to_vec();
    assert_eq!(indexed.len(), cached.len(), "indexed {indexed:?} cached {cached:?}");
    for (id, widget) in &cached {
        assert_eq!(*id, widget.id);
        assert!(widgets.contains(widget), "{widget:?} is cached but not indexed");
    }
}
