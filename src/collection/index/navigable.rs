//! Ordered index answering equality and range queries.

use super::{insert_id, predicate_for, remove_id, union, Index, IndexKind, ObjectId};
use crate::collection::attribute::{Attribute, AttributeValue};
use crate::collection::query::{Predicate, PredicateKind, SimpleQuery};
use crate::constants::retrieval_costs;
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

pub struct NavigableIndex<O, A> {
    attribute: Attribute<O, A>,
    entries: BTreeMap<A, HashSet<ObjectId>>,
}

impl<O, A: AttributeValue> NavigableIndex<O, A> {
    pub fn on_attribute(attribute: &Attribute<O, A>) -> Self {
        Self {
            attribute: attribute.clone(),
            entries: BTreeMap::new(),
        }
    }

    fn range(&self, lower: Bound<&A>, upper: Bound<&A>) -> HashSet<ObjectId> {
        // BTreeMap::range panics on inverted or empty-exclusive bounds
        if let (
            Bound::Included(l) | Bound::Excluded(l),
            Bound::Included(u) | Bound::Excluded(u),
        ) = (lower, upper)
        {
            let both_inclusive =
                matches!(lower, Bound::Included(_)) && matches!(upper, Bound::Included(_));
            if l > u || (l == u && !both_inclusive) {
                return HashSet::new();
            }
        }
        union(self.entries.range::<A, _>((lower, upper)).map(|(_, ids)| ids))
    }
}

fn bound<A>(value: &A, inclusive: bool) -> Bound<&A> {
    if inclusive {
        Bound::Included(value)
    } else {
        Bound::Excluded(value)
    }
}

impl<O: 'static, A: AttributeValue> Index<O> for NavigableIndex<O, A> {
    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Navigable
    }

    fn supports(&self, query: &dyn SimpleQuery<O>) -> bool {
        matches!(
            query.kind(),
            PredicateKind::Equal
                | PredicateKind::In
                | PredicateKind::Has
                | PredicateKind::LessThan
                | PredicateKind::GreaterThan
                | PredicateKind::Between
        ) && predicate_for::<O, A>(query, self.attribute.name()).is_some()
    }

    fn add(&mut self, id: ObjectId, object: &O) -> Result<()> {
        for value in self.attribute.values(object) {
            insert_id(&mut self.entries, value, id);
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId, object: &O) {
        for value in self.attribute.values(object) {
            remove_id(&mut self.entries, &value, id);
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
            Predicate::LessThan { value, inclusive } => {
                self.range(Bound::Unbounded, bound(value, *inclusive))
            }
            Predicate::GreaterThan { value, inclusive } => {
                self.range(bound(value, *inclusive), Bound::Unbounded)
            }
            Predicate::Between {
                lower,
                lower_inclusive,
                upper,
                upper_inclusive,
            } => self.range(bound(lower, *lower_inclusive), bound(upper, *upper_inclusive)),
            _ => return None,
        };
        Some(ids)
    }

    fn retrieval_cost(&self) -> usize {
        retrieval_costs::NAVIGABLE_INDEX
    }
}
