//! Hash-based indexes for equality lookups.

use super::{predicate_for, union, Index, IndexKind, ObjectId};
use crate::collection::attribute::{Attribute, AttributeValue};
use crate::collection::query::{Predicate, PredicateKind, SimpleQuery};
use crate::constants::retrieval_costs;
use crate::error::{IndexedCacheError, Result};
use std::collections::{HashMap, HashSet};

/// Equality index allowing many objects per value
pub struct HashIndex<O, A> {
    attribute: Attribute<O, A>,
    entries: HashMap<A, HashSet<ObjectId>>,
}

impl<O, A: AttributeValue> HashIndex<O, A> {
    pub fn on_attribute(attribute: &Attribute<O, A>) -> Self {
        Self {
            attribute: attribute.clone(),
            entries: HashMap::new(),
        }
    }
}

impl<O: 'static, A: AttributeValue> Index<O> for HashIndex<O, A> {
    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hash
    }

    fn supports(&self, query: &dyn SimpleQuery<O>) -> bool {
        matches!(
            query.kind(),
            PredicateKind::Equal | PredicateKind::In | PredicateKind::Has
        ) && predicate_for::<O, A>(query, self.attribute.name()).is_some()
    }

    fn add(&mut self, id: ObjectId, object: &O) -> Result<()> {
        for value in self.attribute.values(object) {
            self.entries.entry(value).or_default().insert(id);
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId, object: &O) {
        for value in self.attribute.values(object) {
            if let Some(ids) = self.entries.get_mut(&value) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.entries.remove(&value);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn retrieve(&self, query: &dyn SimpleQuery<O>) -> Option<HashSet<ObjectId>> {
        let ids = match predicate_for::<O, A>(query, self.attribute.name())? {
            Predicate::Equal(value) => self.entries.get(value).cloned().unwrap_or_default(),
            Predicate::In(values) => union(values.iter().filter_map(|v| self.entries.get(v))),
            Predicate::Has => union(self.entries.values()),
            _ => return None,
        };
        Some(ids)
    }

    fn retrieval_cost(&self) -> usize {
        retrieval_costs::HASH_INDEX
    }
}

/// Equality index that allows at most one object per value
pub struct UniqueIndex<O, A> {
    attribute: Attribute<O, A>,
    entries: HashMap<A, ObjectId>,
}

impl<O, A: AttributeValue> UniqueIndex<O, A> {
    pub fn on_attribute(attribute: &Attribute<O, A>) -> Self {
        Self {
            attribute: attribute.clone(),
            entries: HashMap::new(),
        }
    }
}

impl<O: 'static, A: AttributeValue> Index<O> for UniqueIndex<O, A> {
    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Unique
    }

    fn supports(&self, query: &dyn SimpleQuery<O>) -> bool {
        matches!(query.kind(), PredicateKind::Equal | PredicateKind::In)
            && predicate_for::<O, A>(query, self.attribute.name()).is_some()
    }

    fn add(&mut self, id: ObjectId, object: &O) -> Result<()> {
        let values = self.attribute.values(object);
        if let Some(taken) = values
            .iter()
            .find(|value| self.entries.get(*value).is_some_and(|owner| *owner != id))
        {
            return Err(IndexedCacheError::unique_constraint_violation(
                self.attribute.name(),
                format!("{taken:?}"),
            ));
        }
        for value in values {
            self.entries.insert(value, id);
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId, object: &O) {
        for value in self.attribute.values(object) {
            if self.entries.get(&value) == Some(&id) {
                self.entries.remove(&value);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn retrieve(&self, query: &dyn SimpleQuery<O>) -> Option<HashSet<ObjectId>> {
        let ids = match predicate_for::<O, A>(query, self.attribute.name())? {
            Predicate::Equal(value) => self.entries.get(value).copied().into_iter().collect(),
            Predicate::In(values) => values
                .iter()
                .filter_map(|v| self.entries.get(v).copied())
                .collect(),
            _ => return None,
        };
        Some(ids)
    }

    fn retrieval_cost(&self) -> usize {
        retrieval_costs::UNIQUE_INDEX
    }
}
