//! # Indexes
//!
//! Indexes map attribute values to the ids of the objects that carry them.
//! Each index answers a fixed set of predicate kinds on one attribute; the
//! collection's planner asks every index whether it [`Index::supports`] a
//! simple query and uses the one with the lowest [`Index::retrieval_cost`].
//!
//! | Index                      | Answers                                  |
//! |----------------------------|------------------------------------------|
//! | [`HashIndex`]              | equal, in, has                           |
//! | [`UniqueIndex`]            | equal, in (rejects duplicate values)     |
//! | [`NavigableIndex`]         | equal, in, has, less/greater, between    |
//! | [`RadixTreeIndex`]         | equal, in, starts_with                   |
//! | [`ReversedRadixTreeIndex`] | equal, in, ends_with                     |
//! | [`SuffixTreeIndex`]        | equal, in, ends_with, contains           |

pub mod hash;
pub mod navigable;
pub mod radix;
pub mod suffix;

pub use hash::{HashIndex, UniqueIndex};
pub use navigable::NavigableIndex;
pub use radix::{RadixTreeIndex, ReversedRadixTreeIndex};
pub use suffix::SuffixTreeIndex;

use super::attribute::AttributeValue;
use super::query::{AttributeQuery, Predicate, SimpleQuery};
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};

/// Identity of an object inside one collection
pub type ObjectId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Hash,
    Unique,
    Navigable,
    RadixTree,
    ReversedRadixTree,
    SuffixTree,
}

/// An index over one attribute of objects of type `O`
pub trait Index<O>: Send + Sync {
    fn attribute_name(&self) -> &str;

    fn kind(&self) -> IndexKind;

    /// Whether [`Index::retrieve`] can answer this query
    fn supports(&self, query: &dyn SimpleQuery<O>) -> bool;

    /// Index an object; an error leaves the index unchanged
    fn add(&mut self, id: ObjectId, object: &O) -> Result<()>;

    fn remove(&mut self, id: ObjectId, object: &O);

    fn clear(&mut self);

    /// Ids matching the query, `None` if the query is not supported
    fn retrieve(&self, query: &dyn SimpleQuery<O>) -> Option<HashSet<ObjectId>>;

    fn retrieval_cost(&self) -> usize;
}

/// The typed predicate of a query on `attribute_name`, if its value type is `A`
pub(crate) fn predicate_for<'q, O: 'static, A: AttributeValue>(
    query: &'q dyn SimpleQuery<O>,
    attribute_name: &str,
) -> Option<&'q Predicate<A>> {
    if query.attribute_name() != attribute_name {
        return None;
    }
    query
        .as_any()
        .downcast_ref::<AttributeQuery<O, A>>()
        .map(AttributeQuery::predicate)
}

pub(crate) fn insert_id<K: Ord>(map: &mut BTreeMap<K, HashSet<ObjectId>>, key: K, id: ObjectId) {
    map.entry(key).or_default().insert(id);
}

pub(crate) fn remove_id<K: Ord>(map: &mut BTreeMap<K, HashSet<ObjectId>>, key: &K, id: ObjectId) {
    if let Some(ids) = map.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

pub(crate) fn union<'a>(sets: impl Iterator<Item = &'a HashSet<ObjectId>>) -> HashSet<ObjectId> {
    let mut ids = HashSet::new();
    for set in sets {
        ids.extend(set.iter().copied());
    }
    ids
}

/// Ids under every key that starts with `prefix`
pub(crate) fn prefix_scan(
    map: &BTreeMap<String, HashSet<ObjectId>>,
    prefix: &str,
) -> HashSet<ObjectId> {
    use std::ops::Bound;
    union(
        map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, ids)| ids),
    )
}
