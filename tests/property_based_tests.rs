mod common;

use common::strategies::*;
use common::*;
use indexed_cache::collection::{
    HashIndex, IndexedCollection, NavigableIndex, RadixTreeIndex, ReversedRadixTreeIndex,
    SuffixTreeIndex,
};
use indexed_cache::CacheConfiguration;
use proptest::prelude::*;

fn fully_indexed(widgets: &[Widget]) -> IndexedCollection<Widget> {
    let collection = IndexedCollection::new();
    collection.add_index(HashIndex::on_attribute(&name())).unwrap();
    collection.add_index(RadixTreeIndex::on_attribute(&name())).unwrap();
    collection
        .add_index(ReversedRadixTreeIndex::on_attribute(&name()))
        .unwrap();
    collection.add_index(SuffixTreeIndex::on_attribute(&name())).unwrap();
    collection.add_index(NavigableIndex::on_attribute(&weight())).unwrap();
    collection.add_index(HashIndex::on_attribute(&tags())).unwrap();
    collection.add_all(widgets.iter().cloned()).unwrap();
    collection
}

fn naive_ids(widgets: &[Widget], query: &indexed_cache::Query<Widget>) -> Vec<u32> {
    widgets
        .iter()
        .filter(|w| query.matches(w))
        .map(|w| w.id)
        .collect()
}

proptest! {
    /// Property: index-backed retrieval returns exactly what filtering every object returns
    #[test]
    fn indexed_retrieval_matches_naive_filtering(
        widgets in widgets_strategy(),
        query in query_strategy(),
    ) {
        let collection = fully_indexed(&widgets);
        let ids: Vec<u32> = collection.retrieve(&query).iter().map(|w| w.id).collect();
        prop_assert_eq!(ids, naive_ids(&widgets, &query));
    }

    /// Property: indexes added after the objects agree with indexes added before
    #[test]
    fn backfilled_indexes_agree(widgets in widgets_strategy(), query in simple_query_strategy()) {
        let late = IndexedCollection::new();
        late.add_all(widgets.iter().cloned()).unwrap();
        late.add_index(SuffixTreeIndex::on_attribute(&name())).unwrap();
        late.add_index(NavigableIndex::on_attribute(&weight())).unwrap();

        let early = fully_indexed(&widgets);
        let late_ids: Vec<u32> = late.retrieve(&query).iter().map(|w| w.id).collect();
        let early_ids: Vec<u32> = early.retrieve(&query).iter().map(|w| w.id).collect();
        prop_assert_eq!(late_ids, early_ids);
    }

    /// Property: a bounded cache never holds more entries than its bound, and
    /// the collection mirrors it exactly
    #[test]
    fn bounded_cache_and_collection_stay_in_step(
        widgets in widgets_strategy(),
        bound in 1usize..8,
    ) {
        let indexed = widget_cache(CacheConfiguration::default().with_max_entries(bound));
        for widget in &widgets {
            indexed.add(widget.clone()).unwrap();
        }
        let cached = indexed.cache().entry_count().unwrap();
        prop_assert!(cached <= bound);
        prop_assert_eq!(indexed.size(), cached);
        for (key, value) in indexed.cache().entries().unwrap() {
            prop_assert_eq!(key, value.id);
            prop_assert!(indexed.contains(&value));
        }
    }
}
