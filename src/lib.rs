#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear
#![allow(clippy::module_name_repetitions)] // IndexedCacheConfig, IndexedCacheError, ...

//! # Indexed Cache
//!
//! An in-process key/value cache whose values can be queried by their
//! attributes, the way one would query a table.
//!
//! ## Overview
//!
//! Two independent building blocks are joined by a third:
//!
//! - A JCache-style [`cache::Cache`] with expiry policies, LRU eviction on a
//!   capacity bound, statistics and entry events.
//! - An [`collection::IndexedCollection`]: a set of objects described by
//!   attributes, with hash, unique, navigable, radix and suffix indexes and a
//!   small query planner.
//! - [`indexed::IndexedCache`], which keeps a collection in step with a cache
//!   through a synchronous cache listener, so every query answers over the
//!   values that are live in the cache.
//!
//! ## Module Organization
//!
//! - [`cache`] - Caches, expiry, statistics, events and the cache manager
//! - [`collection`] - Attributes, queries, indexes and the indexed collection
//! - [`indexed`] - The cache/collection join
//! - [`config`] - Cache configuration and environment-aware loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//! - [`constants`] - Shared defaults, event names and retrieval costs
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use indexed_cache::{
//!     collection::query::*, Attribute, Cache, CacheConfiguration, HashIndex, IndexedCache,
//!     IndexedCollection,
//! };
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Book { isbn: String, author: String }
//!
//! let author = Attribute::new("author", |b: &Book| b.author.clone());
//! let books = IndexedCache::new(
//!     Arc::new(IndexedCollection::new()),
//!     Arc::new(Cache::new("books", CacheConfiguration::default().with_max_entries(100))),
//!     |b: &Book| b.isbn.clone(),
//! )?;
//! books.add_index(HashIndex::on_attribute(&author))?;
//! books.add(Book { isbn: "0-441-17271-7".into(), author: "Herbert".into() })?;
//!
//! let found = books.retrieve(&equal(&author, "Herbert"))?;
//! assert_eq!(found.size(), 1);
//! # Ok::<(), indexed_cache::IndexedCacheError>(())
//! ```

pub mod cache;
pub mod collection;
pub mod config;
pub mod constants;
pub mod error;
pub mod indexed;
pub mod logging;

pub use cache::{
    Cache, CacheEntryEvent, CacheEntryListener, CacheEventType, CacheManager, CacheStatistics,
    ExpiryPolicy, ListenerConfiguration, ListenerId,
};
pub use collection::{
    Attribute, HashIndex, IndexedCollection, NavigableIndex, Query, QueryOptions,
    RadixTreeIndex, ResultSet, ReversedRadixTreeIndex, SuffixTreeIndex, UniqueIndex,
};
pub use config::{CacheConfiguration, ConfigLoader, IndexedCacheConfig};
pub use error::{IndexedCacheError, Result};
pub use indexed::{CacheKeyMaker, IdentityCacheKeyMaker, IndexedCache};
