//! Substring index over text attributes.

use super::{insert_id, predicate_for, prefix_scan, remove_id, union, Index, IndexKind, ObjectId};
use crate::collection::attribute::{Attribute, AttributeValue};
use crate::collection::query::{Predicate, PredicateKind, SimpleQuery};
use crate::constants::retrieval_costs;
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};

/// Every suffix of `text`, including the empty one
fn suffixes(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .map(move |(i, _)| &text[i..])
        .chain(std::iter::once(""))
}

/// Answers `contains` and `ends_with` by indexing every suffix of each value
///
/// A substring of a value is a prefix of one of its suffixes, so `contains`
/// becomes a prefix scan over the suffix map.
pub struct SuffixTreeIndex<O, A> {
    attribute: Attribute<O, A>,
    suffixes: BTreeMap<String, HashSet<ObjectId>>,
    exact: BTreeMap<String, HashSet<ObjectId>>,
}

impl<O, A: AttributeValue + AsRef<str>> SuffixTreeIndex<O, A> {
    pub fn on_attribute(attribute: &Attribute<O, A>) -> Self {
        Self {
            attribute: attribute.clone(),
            suffixes: BTreeMap::new(),
            exact: BTreeMap::new(),
        }
    }
}

impl<O: 'static, A: AttributeValue + AsRef<str>> Index<O> for SuffixTreeIndex<O, A> {
    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::SuffixTree
    }

    fn supports(&self, query: &dyn SimpleQuery<O>) -> bool {
        matches!(
            query.kind(),
            PredicateKind::Equal
                | PredicateKind::In
                | PredicateKind::EndsWith
                | PredicateKind::Contains
        ) && predicate_for::<O, A>(query, self.attribute.name()).is_some()
    }

    fn add(&mut self, id: ObjectId, object: &O) -> Result<()> {
        for value in self.attribute.values(object) {
            let text = value.as_ref();
            for suffix in suffixes(text) {
                insert_id(&mut self.suffixes, suffix.to_string(), id);
            }
            insert_id(&mut self.exact, text.to_string(), id);
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId, object: &O) {
        for value in self.attribute.values(object) {
            let text = value.as_ref();
            for suffix in suffixes(text) {
                remove_id(&mut self.suffixes, &suffix.to_string(), id);
            }
            remove_id(&mut self.exact, &text.to_string(), id);
        }
    }

    fn clear(&mut self) {
        self.suffixes.clear();
        self.exact.clear();
    }

    fn retrieve(&self, query: &dyn SimpleQuery<O>) -> Option<HashSet<ObjectId>> {
        let ids = match predicate_for::<O, A>(query, self.attribute.name())? {
            Predicate::Equal(value) => self.exact.get(value.as_ref()).cloned().unwrap_or_default(),
            Predicate::In(values) => {
                union(values.iter().filter_map(|v| self.exact.get(v.as_ref())))
            }
            Predicate::EndsWith(suffix) => self
                .suffixes
                .get(suffix.as_str())
                .cloned()
                .unwrap_or_default(),
            Predicate::Contains(needle) => prefix_scan(&self.suffixes, needle),
            _ => return None,
        };
        Some(ids)
    }

    fn retrieval_cost(&self) -> usize {
        retrieval_costs::SUFFIX_TREE_INDEX
    }
}
