//! # Indexed Collection
//!
//! A thread-safe set of objects with pluggable attribute indexes and a small
//! query planner. Objects are assigned a monotonically increasing id on
//! insertion; results without explicit ordering come back in insertion order.

use super::index::{Index, ObjectId};
use super::options::{QueryOptions, FLAG_STRICT_REPLACEMENT};
use super::query::{Query, SimpleQuery};
use super::result_set::ResultSet;
use crate::constants::retrieval_costs;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, trace, warn};

struct Inner<O> {
    objects: BTreeMap<ObjectId, Arc<O>>,
    ids: HashMap<Arc<O>, ObjectId>,
    indexes: Vec<Box<dyn Index<O>>>,
    next_id: ObjectId,
}

/// Ids matched by part of a query and what it cost to find them
struct Matched {
    ids: HashSet<ObjectId>,
    cost: usize,
}

impl<O: Hash + Eq + 'static> Inner<O> {
    fn insert(&mut self, object: O) -> Result<bool> {
        Ok(self.place(object)?.is_some())
    }

    /// Insert a new object, returning the id it was stored under
    fn place(&mut self, object: O) -> Result<Option<ObjectId>> {
        if self.ids.contains_key(&object) {
            return Ok(None);
        }
        let id = self.next_id;
        for position in 0..self.indexes.len() {
            if let Err(error) = self.indexes[position].add(id, &object) {
                for added in &mut self.indexes[..position] {
                    added.remove(id, &object);
                }
                return Err(error);
            }
        }
        self.next_id += 1;
        let object = Arc::new(object);
        self.objects.insert(id, Arc::clone(&object));
        self.ids.insert(object, id);
        Ok(Some(id))
    }

    fn delete(&mut self, object: &O) -> bool {
        self.take(object).is_some()
    }

    fn take(&mut self, object: &O) -> Option<(ObjectId, Arc<O>)> {
        let id = self.ids.remove(object)?;
        let stored = self.objects.remove(&id)?;
        for index in &mut self.indexes {
            index.remove(id, object);
        }
        Some((id, stored))
    }

    /// Put a taken object back under its original id
    fn restore(&mut self, id: ObjectId, object: Arc<O>) {
        for index in &mut self.indexes {
            if let Err(error) = index.add(id, &object) {
                warn!(
                    index = index.attribute_name(),
                    error = %error,
                    "Index rejected a restored object"
                );
            }
        }
        self.objects.insert(id, Arc::clone(&object));
        self.ids.insert(object, id);
    }

    fn cheapest_index(&self, query: &dyn SimpleQuery<O>) -> Option<&dyn Index<O>> {
        self.indexes
            .iter()
            .filter(|index| index.supports(query))
            .min_by_key(|index| index.retrieval_cost())
            .map(|index| index.as_ref())
    }

    /// Whether the query can be answered without visiting every object
    fn is_indexed(&self, query: &Query<O>) -> bool {
        match query {
            Query::None => true,
            Query::Simple(simple) => self.cheapest_index(simple.as_ref()).is_some(),
            Query::And(children) => children.iter().any(|child| self.is_indexed(child)),
            Query::Or(children) => {
                !children.is_empty() && children.iter().all(|child| self.is_indexed(child))
            }
            Query::All | Query::Not(_) => false,
        }
    }

    fn scan(&self, query: &Query<O>) -> Matched {
        Matched {
            ids: self
                .objects
                .iter()
                .filter(|(_, object)| query.matches(object))
                .map(|(id, _)| *id)
                .collect(),
            cost: retrieval_costs::FULL_SCAN,
        }
    }

    fn evaluate(&self, query: &Query<O>) -> Matched {
        match query {
            Query::All => Matched {
                ids: self.objects.keys().copied().collect(),
                cost: retrieval_costs::FULL_SCAN,
            },
            Query::None => Matched {
                ids: HashSet::new(),
                cost: 0,
            },
            Query::Simple(simple) => {
                let indexed = self.cheapest_index(simple.as_ref()).and_then(|index| {
                    index.retrieve(simple.as_ref()).map(|ids| Matched {
                        ids,
                        cost: index.retrieval_cost(),
                    })
                });
                indexed.unwrap_or_else(|| self.scan(query))
            }
            Query::And(children) => self.evaluate_and(query, children),
            Query::Or(children) => {
                if !self.is_indexed(query) {
                    return self.scan(query);
                }
                let mut matched = Matched {
                    ids: HashSet::new(),
                    cost: 0,
                };
                for child in children {
                    let child = self.evaluate(child);
                    matched.ids.extend(child.ids);
                    matched.cost = matched.cost.max(child.cost);
                }
                matched
            }
            Query::Not(child) => {
                let excluded = self.evaluate(child);
                Matched {
                    ids: self
                        .objects
                        .keys()
                        .filter(|id| !excluded.ids.contains(id))
                        .copied()
                        .collect(),
                    cost: retrieval_costs::FULL_SCAN,
                }
            }
        }
    }

    /// Intersect the indexed children, then filter by the rest
    fn evaluate_and(&self, query: &Query<O>, children: &[Query<O>]) -> Matched {
        let (indexed, filtered): (Vec<&Query<O>>, Vec<&Query<O>>) =
            children.iter().partition(|child| self.is_indexed(child));
        if indexed.is_empty() {
            return self.scan(query);
        }

        let mut parts: Vec<Matched> = indexed.into_iter().map(|child| self.evaluate(child)).collect();
        parts.sort_by_key(|part| part.ids.len());
        let cost = parts.iter().map(|part| part.cost).max().unwrap_or(0);

        let mut parts = parts.into_iter();
        let mut ids = parts.next().map(|part| part.ids).unwrap_or_default();
        for part in parts {
            ids.retain(|id| part.ids.contains(id));
        }
        if !filtered.is_empty() {
            ids.retain(|id| {
                self.objects
                    .get(id)
                    .is_some_and(|object| filtered.iter().all(|child| child.matches(object)))
            });
        }
        Matched { ids, cost }
    }
}

/// A set of objects queryable through attribute indexes
pub struct IndexedCollection<O> {
    inner: RwLock<Inner<O>>,
}

impl<O> fmt::Debug for IndexedCollection<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("IndexedCollection")
            .field("size", &inner.objects.len())
            .field(
                "indexes",
                &inner
                    .indexes
                    .iter()
                    .map(|index| (index.attribute_name().to_string(), index.kind()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<O: Hash + Eq + Send + Sync + 'static> Default for IndexedCollection<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Hash + Eq + Send + Sync + 'static> IndexedCollection<O> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                objects: BTreeMap::new(),
                ids: HashMap::new(),
                indexes: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Add an object; `Ok(false)` if an equal object is already present
    pub fn add(&self, object: O) -> Result<bool> {
        self.inner.write().insert(object)
    }

    /// Add objects until the first index rejects one
    pub fn add_all(&self, objects: impl IntoIterator<Item = O>) -> Result<bool> {
        let mut inner = self.inner.write();
        let mut modified = false;
        for object in objects {
            modified |= inner.insert(object)?;
        }
        Ok(modified)
    }

    pub fn remove(&self, object: &O) -> bool {
        self.inner.write().delete(object)
    }

    pub fn remove_all<'a>(&self, objects: impl IntoIterator<Item = &'a O>) -> bool
    where
        O: 'a,
    {
        let mut inner = self.inner.write();
        let mut modified = false;
        for object in objects {
            modified |= inner.delete(object);
        }
        modified
    }

    /// Remove then add under one lock, all or nothing
    ///
    /// If any addition is rejected the removals and earlier additions are
    /// undone before the error is returned. With [`FLAG_STRICT_REPLACEMENT`]
    /// enabled nothing changes unless every object in `to_remove` is present.
    pub fn update<'a>(
        &self,
        to_remove: impl IntoIterator<Item = &'a O>,
        to_add: impl IntoIterator<Item = O>,
        options: &QueryOptions<O>,
    ) -> Result<bool>
    where
        O: 'a,
    {
        let to_remove: Vec<&O> = to_remove.into_iter().collect();
        let mut inner = self.inner.write();
        if options.is_flag_enabled(FLAG_STRICT_REPLACEMENT)
            && !to_remove.iter().all(|object| inner.ids.contains_key(*object))
        {
            debug!(
                removing = to_remove.len(),
                "Strict replacement skipped: not every object is present"
            );
            return Ok(false);
        }

        let mut taken = Vec::new();
        for object in to_remove {
            if let Some(removed) = inner.take(object) {
                taken.push(removed);
            }
        }
        let mut added: Vec<Arc<O>> = Vec::new();
        for object in to_add {
            match inner.place(object) {
                Ok(Some(id)) => added.extend(inner.objects.get(&id).cloned()),
                Ok(None) => {}
                Err(error) => {
                    for object in &added {
                        inner.delete(object);
                    }
                    for (id, object) in taken {
                        inner.restore(id, object);
                    }
                    debug!(error = %error, "Update rolled back");
                    return Err(error);
                }
            }
        }
        Ok(!taken.is_empty() || !added.is_empty())
    }

    /// Keep only objects matching `keep`; returns whether anything was removed
    pub fn retain(&self, mut keep: impl FnMut(&O) -> bool) -> bool {
        let mut inner = self.inner.write();
        let doomed: Vec<Arc<O>> = inner
            .objects
            .values()
            .filter(|object| !keep(object))
            .cloned()
            .collect();
        for object in &doomed {
            inner.delete(object);
        }
        !doomed.is_empty()
    }

    pub fn contains(&self, object: &O) -> bool {
        self.inner.read().ids.contains_key(object)
    }

    pub fn contains_all<'a>(&self, objects: impl IntoIterator<Item = &'a O>) -> bool
    where
        O: 'a,
    {
        let inner = self.inner.read();
        objects.into_iter().all(|object| inner.ids.contains_key(object))
    }

    pub fn size(&self) -> usize {
        self.inner.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().objects.is_empty()
    }

    /// Remove every object; indexes stay registered
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.objects.clear();
        inner.ids.clear();
        for index in &mut inner.indexes {
            index.clear();
        }
    }

    /// Register an index and back-fill it with the current objects
    ///
    /// If back-filling fails (a unique index meeting duplicate values) the
    /// index is discarded and the error returned.
    pub fn add_index(&self, index: impl Index<O> + 'static) -> Result<()> {
        let mut index: Box<dyn Index<O>> = Box::new(index);
        let mut inner = self.inner.write();
        for (id, object) in &inner.objects {
            index.add(*id, object)?;
        }
        debug!(
            attribute = index.attribute_name(),
            kind = ?index.kind(),
            backfilled = inner.objects.len(),
            "Index added"
        );
        inner.indexes.push(index);
        Ok(())
    }

    /// Attribute names of the registered indexes, in registration order
    pub fn index_names(&self) -> Vec<String> {
        self.inner
            .read()
            .indexes
            .iter()
            .map(|index| index.attribute_name().to_string())
            .collect()
    }

    pub fn retrieve(&self, query: &Query<O>) -> ResultSet<O> {
        self.retrieve_with_options(query, &QueryOptions::default())
    }

    pub fn retrieve_with_options(&self, query: &Query<O>, options: &QueryOptions<O>) -> ResultSet<O> {
        let inner = self.inner.read();
        let matched = inner.evaluate(query);

        let mut ids: Vec<ObjectId> = matched.ids.into_iter().collect();
        ids.sort_unstable();
        let mut objects: Vec<Arc<O>> = ids
            .iter()
            .filter_map(|id| inner.objects.get(id).cloned())
            .collect();
        drop(inner);

        if !options.orderings().is_empty() {
            objects.sort_by(|a, b| options.compare(a, b));
        }
        if let Some(pagination) = options.pagination() {
            objects = pagination.apply(objects);
        }
        trace!(
            query = ?query,
            results = objects.len(),
            cost = matched.cost,
            "Retrieved"
        );
        ResultSet::new(objects, matched.cost)
    }

    /// Snapshot of every object in insertion order
    pub fn to_vec(&self) -> Vec<O>
    where
        O: Clone,
    {
        self.inner
            .read()
            .objects
            .values()
            .map(|object| object.as_ref().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::attribute::Attribute;
    use crate::collection::index::{HashIndex, NavigableIndex, RadixTreeIndex, UniqueIndex};
    use crate::collection::options::{ascending, descending};
    use crate::collection::pagination::Pagination;
    use crate::collection::query::*;
    use crate::error::IndexedCacheError;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Car {
        id: u32,
        make: String,
        price: u32,
    }

    fn car(id: u32, make: &str, price: u32) -> Car {
        Car {
            id,
            make: make.to_string(),
            price,
        }
    }

    fn id() -> Attribute<Car, u32> {
        Attribute::new("id", |c: &Car| c.id)
    }

    fn make() -> Attribute<Car, String> {
        Attribute::new("make", |c: &Car| c.make.clone())
    }

    fn price() -> Attribute<Car, u32> {
        Attribute::new("price", |c: &Car| c.price)
    }

    fn cars() -> IndexedCollection<Car> {
        let cars = IndexedCollection::new();
        cars.add_all([
            car(1, "Ford", 5000),
            car(2, "Honda", 3000),
            car(3, "Ford", 9000),
            car(4, "Toyota", 4000),
        ])
        .unwrap();
        cars
    }

    fn ids(results: &ResultSet<Car>) -> Vec<u32> {
        results.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_set_semantics() {
        let cars = cars();
        assert!(!cars.add(car(1, "Ford", 5000)).unwrap());
        assert_eq!(cars.size(), 4);
        assert!(cars.remove(&car(2, "Honda", 3000)));
        assert!(!cars.remove(&car(2, "Honda", 3000)));
        assert!(cars.contains(&car(4, "Toyota", 4000)));
        assert!(!cars.contains_all([&car(4, "Toyota", 4000), &car(2, "Honda", 3000)]));
    }

    #[test]
    fn test_scan_and_index_agree() {
        let cars = cars();
        let query = and([equal(&make(), "Ford"), less_than(&price(), 6000u32)]);
        let scanned = cars.retrieve(&query);
        assert_eq!(scanned.retrieval_cost(), retrieval_costs::FULL_SCAN);

        cars.add_index(HashIndex::on_attribute(&make())).unwrap();
        let indexed = cars.retrieve(&query);
        assert_eq!(indexed.retrieval_cost(), retrieval_costs::HASH_INDEX);
        assert_eq!(ids(&scanned), ids(&indexed));
        assert_eq!(ids(&indexed), vec![1]);
    }

    #[test]
    fn test_cheapest_index_wins() {
        let cars = cars();
        cars.add_index(NavigableIndex::on_attribute(&id())).unwrap();
        cars.add_index(UniqueIndex::on_attribute(&id())).unwrap();
        let results = cars.retrieve(&equal(&id(), 3u32));
        assert_eq!(results.retrieval_cost(), retrieval_costs::UNIQUE_INDEX);
        assert_eq!(results.unique_result().unwrap().make, "Ford");
    }

    #[test]
    fn test_or_and_not() {
        let cars = cars();
        cars.add_index(RadixTreeIndex::on_attribute(&make())).unwrap();
        cars.add_index(NavigableIndex::on_attribute(&price())).unwrap();

        let query = or([starts_with(&make(), "Toy"), greater_than(&price(), 8000u32)]);
        assert_eq!(ids(&cars.retrieve(&query)), vec![3, 4]);

        let query = not(equal(&make(), "Ford"));
        assert_eq!(ids(&cars.retrieve(&query)), vec![2, 4]);

        assert_eq!(cars.retrieve(&all()).size(), 4);
        assert!(cars.retrieve(&none()).is_empty());
    }

    #[test]
    fn test_ordering_and_pagination() {
        let cars = cars();
        let options = QueryOptions::new()
            .order_by([descending(&price())])
            .with_pagination(Pagination::limit_offset(2, 1));
        let results = cars.retrieve_with_options(&all(), &options);
        assert_eq!(ids(&results), vec![1, 4]);

        let options = QueryOptions::new().order_by([ascending(&make()), descending(&price())]);
        let results = cars.retrieve_with_options(&all(), &options);
        assert_eq!(ids(&results), vec![3, 1, 2, 4]);
    }

    #[test]
    fn test_unique_index_rejects_and_rolls_back() {
        let cars = cars();
        cars.add_index(HashIndex::on_attribute(&make())).unwrap();
        cars.add_index(UniqueIndex::on_attribute(&id())).unwrap();

        let err = cars.add(car(1, "Kia", 1)).unwrap_err();
        assert!(matches!(err, IndexedCacheError::UniqueConstraintViolation { .. }));
        assert_eq!(cars.size(), 4);
        // The hash index must not remember the rejected object
        assert!(cars.retrieve(&equal(&make(), "Kia")).is_empty());
    }

    #[test]
    fn test_add_index_backfill_failure() {
        let cars = cars();
        let err = cars
            .add_index(UniqueIndex::on_attribute(&make()))
            .unwrap_err();
        assert!(matches!(err, IndexedCacheError::UniqueConstraintViolation { .. }));
        assert!(cars.index_names().is_empty());
    }

    #[test]
    fn test_update_and_strict_replacement() {
        let cars = cars();
        let old = car(2, "Honda", 3000);
        let new = car(2, "Honda", 2500);
        assert!(cars
            .update([&old], [new.clone()], &QueryOptions::default())
            .unwrap());
        assert!(cars.contains(&new));
        assert!(!cars.contains(&old));

        let strict = QueryOptions::new().enable_flag(FLAG_STRICT_REPLACEMENT);
        let replacement = car(2, "Honda", 2000);
        assert!(!cars.update([&old], [replacement.clone()], &strict).unwrap());
        assert!(!cars.contains(&replacement));
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let cars = cars();
        cars.add_index(UniqueIndex::on_attribute(&id())).unwrap();
        cars.add_index(HashIndex::on_attribute(&make())).unwrap();
        let before = ids(&cars.retrieve(&all()));

        // Replacing car 2 is fine, but the second addition collides with car 3
        let err = cars
            .update(
                [&car(2, "Honda", 3000)],
                [car(2, "Honda", 2500), car(3, "Kia", 1)],
                &QueryOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, IndexedCacheError::UniqueConstraintViolation { .. }));

        assert_eq!(ids(&cars.retrieve(&all())), before);
        assert!(cars.contains(&car(2, "Honda", 3000)));
        assert!(!cars.contains(&car(2, "Honda", 2500)));
        assert_eq!(cars.retrieve(&equal(&make(), "Honda")).size(), 1);
        assert!(cars.retrieve(&equal(&make(), "Kia")).is_empty());
        assert_eq!(cars.retrieve(&equal(&id(), 2u32)).size(), 1);
    }

    #[test]
    fn test_retain_clear_to_vec() {
        let cars = cars();
        cars.add_index(HashIndex::on_attribute(&make())).unwrap();
        assert!(cars.retain(|c| c.make == "Ford"));
        assert_eq!(
            cars.to_vec().iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        cars.clear();
        assert!(cars.is_empty());
        assert!(cars.retrieve(&equal(&make(), "Ford")).is_empty());
        assert_eq!(cars.index_names(), vec!["make".to_string()]);
    }
}
