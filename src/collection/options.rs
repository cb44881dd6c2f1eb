//! Options that shape a query result: ordering, flags and pagination.

use super::attribute::{Attribute, AttributeValue};
use super::pagination::Pagination;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// When enabled, [`super::IndexedCollection::update`] only applies if every
/// object to remove is present
pub const FLAG_STRICT_REPLACEMENT: &str = "strict_replacement";

type Comparator<O> = Arc<dyn Fn(&O, &O) -> Ordering + Send + Sync>;

/// Sort key derived from one attribute
pub struct AttributeOrder<O> {
    attribute_name: Arc<str>,
    descending: bool,
    compare: Comparator<O>,
}

impl<O> Clone for AttributeOrder<O> {
    fn clone(&self) -> Self {
        Self {
            attribute_name: Arc::clone(&self.attribute_name),
            descending: self.descending,
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<O> fmt::Debug for AttributeOrder<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeOrder")
            .field("attribute", &self.attribute_name)
            .field("descending", &self.descending)
            .finish()
    }
}

impl<O: 'static> AttributeOrder<O> {
    fn on<A: AttributeValue>(attribute: &Attribute<O, A>, descending: bool) -> Self {
        let extractor = attribute.clone();
        // Multi-valued attributes sort by their smallest value
        let key = move |object: &O| extractor.values(object).into_iter().min();
        Self {
            attribute_name: Arc::from(attribute.name()),
            descending,
            compare: Arc::new(move |a, b| match (key(a), key(b)) {
                (Some(x), Some(y)) if descending => y.cmp(&x),
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }),
        }
    }

    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Objects without a value for the attribute always sort last
    pub fn compare(&self, a: &O, b: &O) -> Ordering {
        (self.compare)(a, b)
    }
}

pub fn ascending<O: 'static, A: AttributeValue>(attribute: &Attribute<O, A>) -> AttributeOrder<O> {
    AttributeOrder::on(attribute, false)
}

pub fn descending<O: 'static, A: AttributeValue>(attribute: &Attribute<O, A>) -> AttributeOrder<O> {
    AttributeOrder::on(attribute, true)
}

/// Options for a single retrieval
pub struct QueryOptions<O> {
    order_by: Vec<AttributeOrder<O>>,
    flags: HashSet<String>,
    pagination: Option<Pagination>,
}

impl<O> Default for QueryOptions<O> {
    fn default() -> Self {
        Self {
            order_by: Vec::new(),
            flags: HashSet::new(),
            pagination: None,
        }
    }
}

impl<O> Clone for QueryOptions<O> {
    fn clone(&self) -> Self {
        Self {
            order_by: self.order_by.clone(),
            flags: self.flags.clone(),
            pagination: self.pagination,
        }
    }
}

impl<O> fmt::Debug for QueryOptions<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("order_by", &self.order_by)
            .field("flags", &self.flags)
            .field("pagination", &self.pagination)
            .finish()
    }
}

impl<O> QueryOptions<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by the given orderings; ties fall through to the next one
    pub fn order_by(mut self, orderings: impl IntoIterator<Item = AttributeOrder<O>>) -> Self {
        self.order_by = orderings.into_iter().collect();
        self
    }

    pub fn enable_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn disable_flag(mut self, flag: &str) -> Self {
        self.flags.remove(flag);
        self
    }

    pub fn is_flag_enabled(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn orderings(&self) -> &[AttributeOrder<O>] {
        &self.order_by
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub(crate) fn compare(&self, a: &O, b: &O) -> Ordering
    where
        O: 'static,
    {
        self.order_by
            .iter()
            .map(|order| order.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item {
        name: &'static str,
        rank: Option<u32>,
    }

    fn rank() -> Attribute<Item, u32> {
        Attribute::optional("rank", |i: &Item| i.rank)
    }

    fn name() -> Attribute<Item, &'static str> {
        Attribute::new("name", |i: &Item| i.name)
    }

    fn sorted(options: &QueryOptions<Item>, mut items: Vec<Item>) -> Vec<&'static str> {
        items.sort_by(|a, b| options.compare(a, b));
        items.into_iter().map(|i| i.name).collect()
    }

    fn items() -> Vec<Item> {
        vec![
            Item { name: "c", rank: Some(2) },
            Item { name: "a", rank: None },
            Item { name: "b", rank: Some(2) },
            Item { name: "d", rank: Some(1) },
        ]
    }

    #[test]
    fn test_ascending_with_tie_break() {
        let options = QueryOptions::new().order_by([ascending(&rank()), ascending(&name())]);
        assert_eq!(sorted(&options, items()), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_descending_keeps_missing_last() {
        let options = QueryOptions::new().order_by([descending(&rank()), descending(&name())]);
        assert_eq!(sorted(&options, items()), vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_flags() {
        let options = QueryOptions::<Item>::new()
            .enable_flag(FLAG_STRICT_REPLACEMENT)
            .enable_flag("other");
        assert!(options.is_flag_enabled(FLAG_STRICT_REPLACEMENT));
        let options = options.disable_flag("other");
        assert!(!options.is_flag_enabled("other"));
        assert!(options.pagination().is_none());
    }
}
