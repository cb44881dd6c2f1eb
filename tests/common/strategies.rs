use super::{name, tags, weight, Widget};
use indexed_cache::collection::query::*;
use indexed_cache::Query;
use proptest::prelude::*;

/// Short names over a small alphabet so prefixes and suffixes collide often
pub fn widget_name_strategy() -> impl Strategy<Value = String> {
    "[abc]{0,4}"
}

pub fn tags_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[xyz]", 0..3)
}

/// Widgets with distinct ids
pub fn widgets_strategy() -> impl Strategy<Value = Vec<Widget>> {
    prop::collection::vec((widget_name_strategy(), 0u32..50, tags_strategy()), 0..40).prop_map(
        |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(id, (name, weight, tags))| Widget {
                    id: id as u32,
                    name,
                    weight,
                    tags,
                })
                .collect()
        },
    )
}

/// Simple queries over every attribute and predicate kind the indexes answer
pub fn simple_query_strategy() -> impl Strategy<Value = Query<Widget>> {
    prop_oneof![
        widget_name_strategy().prop_map(|n| equal(&name(), n)),
        widget_name_strategy().prop_map(|n| starts_with(&name(), n)),
        widget_name_strategy().prop_map(|n| ends_with(&name(), n)),
        widget_name_strategy().prop_map(|n| contains(&name(), n)),
        (0u32..50).prop_map(|w| less_than(&weight(), w)),
        (0u32..50).prop_map(|w| greater_than_or_equal(&weight(), w)),
        (0u32..50, 0u32..50, any::<bool>(), any::<bool>())
            .prop_map(|(l, u, li, ui)| between(&weight(), l, li, u, ui)),
        "[xyz]".prop_map(|t| equal(&tags(), t)),
        Just(has(&tags())),
    ]
}

/// Nested logical queries over the simple ones
pub fn query_strategy() -> impl Strategy<Value = Query<Widget>> {
    simple_query_strategy().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(|queries| and(queries)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(|queries| or(queries)),
            inner.prop_map(|query| not(query)),
        ]
    })
}
