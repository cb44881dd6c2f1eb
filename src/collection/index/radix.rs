//! Prefix and suffix indexes over text attributes.
//!
//! Both keep their keys in an ordered map so a prefix lookup is a range scan
//! from the prefix up to the first key that no longer starts with it. The
//! reversed variant stores every key back to front, turning `ends_with` into
//! a prefix lookup.

use super::{insert_id, predicate_for, prefix_scan, remove_id, union, Index, IndexKind, ObjectId};
use crate::collection::attribute::{Attribute, AttributeValue};
use crate::collection::query::{Predicate, PredicateKind, SimpleQuery};
use crate::constants::retrieval_costs;
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};

fn reversed(text: &str) -> String {
    text.chars().rev().collect()
}

/// Answers `starts_with` on text attributes
pub struct RadixTreeIndex<O, A> {
    attribute: Attribute<O, A>,
    entries: BTreeMap<String, HashSet<ObjectId>>,
}

impl<O, A: AttributeValue + AsRef<str>> RadixTreeIndex<O, A> {
    pub fn on_attribute(attribute: &Attribute<O, A>) -> Self {
        Self {
            attribute: attribute.clone(),
            entries: BTreeMap::new(),
        }
    }
}

impl<O: 'static, A: AttributeValue + AsRef<str>> Index<O> for RadixTreeIndex<O, A> {
    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::RadixTree
    }

    fn supports(&self, query: &dyn SimpleQuery<O>) -> bool {
        matches!(
            query.kind(),
            PredicateKind::Equal | PredicateKind::In | PredicateKind::StartsWith
        ) && predicate_for::<O, A>(query, self.attribute.name()).is_some()
    }

    fn add(&mut self, id: ObjectId, object: &O) -> Result<()> {
        for value in self.attribute.values(object) {
            insert_id(&mut self.entries, value.as_ref().to_string(), id);
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId, object: &O) {
        for value in self.attribute.values(object) {
            remove_id(&mut self.entries, &value.as_ref().to_string(), id);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn retrieve(&self, query: &dyn SimpleQuery<O>) -> Option<HashSet<ObjectId>> {
        let ids = match predicate_for::<O, A>(query, self.attribute.name())? {
            Predicate::Equal(value) => self
                .entries
                .get(value.as_ref())
                .cloned()
                .unwrap_or_default(),
            Predicate::In(values) => {
                union(values.iter().filter_map(|v| self.entries.get(v.as_ref())))
            }
            Predicate::StartsWith(prefix) => prefix_scan(&self.entries, prefix),
            _ => return None,
        };
        Some(ids)
    }

    fn retrieval_cost(&self) -> usize {
        retrieval_costs::RADIX_TREE_INDEX
    }
}

/// Answers `ends_with` on text attributes
pub struct ReversedRadixTreeIndex<O, A> {
    attribute: Attribute<O, A>,
    entries: BTreeMap<String, HashSet<ObjectId>>,
}

impl<O, A: AttributeValue + AsRef<str>> ReversedRadixTreeIndex<O, A> {
    pub fn on_attribute(attribute: &Attribute<O, A>) -> Self {
        Self {
            attribute: attribute.clone(),
            entries: BTreeMap::new(),
        }
    }
}

impl<O: 'static, A: AttributeValue + AsRef<str>> Index<O> for ReversedRadixTreeIndex<O, A> {
    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::ReversedRadixTree
    }

    fn supports(&self, query: &dyn SimpleQuery<O>) -> bool {
        matches!(
            query.kind(),
            PredicateKind::Equal | PredicateKind::In | PredicateKind::EndsWith
        ) && predicate_for::<O, A>(query, self.attribute.name()).is_some()
    }

    fn add(&mut self, id: ObjectId, object: &O) -> Result<()> {
        for value in self.attribute.values(object) {
            insert_id(&mut self.entries, reversed(value.as_ref()), id);
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId, object: &O) {
        for value in self.attribute.values(object) {
            remove_id(&mut self.entries, &reversed(value.as_ref()), id);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn retrieve(&self, query: &dyn SimpleQuery<O>) -> Option<HashSet<ObjectId>> {
        let ids = match predicate_for::<O, A>(query, self.attribute.name())? {
            Predicate::Equal(value) => self
                .entries
                .get(&reversed(value.as_ref()))
                .cloned()
                .unwrap_or_default(),
            Predicate::In(values) => union(
                values
                    .iter()
                    .filter_map(|v| self.entries.get(&reversed(v.as_ref()))),
            ),
            Predicate::EndsWith(suffix) => prefix_scan(&self.entries, &reversed(suffix)),
            _ => return None,
        };
        Some(ids)
    }

    fn retrieval_cost(&self) -> usize {
        retrieval_costs::REVERSED_RADIX_TREE_INDEX
    }
}
