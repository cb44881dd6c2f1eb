//! # Query Language
//!
//! Queries are trees of logical operators over simple attribute predicates.
//! The free functions in this module are the intended way to build them:
//!
//! ```rust
//! use indexed_cache::collection::{query::*, Attribute};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Widget { name: String, weight: u32 }
//!
//! let name = Attribute::new("name", |w: &Widget| w.name.clone());
//! let weight = Attribute::new("weight", |w: &Widget| w.weight);
//!
//! let query = or([ends_with(&name, "ank"), starts_with(&name, "Bo")])
//!     .and(greater_than(&weight, 10u32));
//!
//! assert!(query.matches(&Widget { name: "Frank".into(), weight: 12 }));
//! assert!(!query.matches(&Widget { name: "Jane".into(), weight: 12 }));
//! ```

use super::attribute::{Attribute, AttributeValue};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shape of a simple predicate, used by indexes to decide what they can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    Equal,
    In,
    LessThan,
    GreaterThan,
    Between,
    Has,
    StartsWith,
    EndsWith,
    Contains,
}

/// Condition on a single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<A> {
    Equal(A),
    In(Vec<A>),
    LessThan {
        value: A,
        inclusive: bool,
    },
    GreaterThan {
        value: A,
        inclusive: bool,
    },
    Between {
        lower: A,
        lower_inclusive: bool,
        upper: A,
        upper_inclusive: bool,
    },
    Has,
    StartsWith(String),
    EndsWith(String),
    Contains(String),
}

impl<A: AttributeValue> Predicate<A> {
    pub fn kind(&self) -> PredicateKind {
        match self {
            Predicate::Equal(_) => PredicateKind::Equal,
            Predicate::In(_) => PredicateKind::In,
            Predicate::LessThan { .. } => PredicateKind::LessThan,
            Predicate::GreaterThan { .. } => PredicateKind::GreaterThan,
            Predicate::Between { .. } => PredicateKind::Between,
            Predicate::Has => PredicateKind::Has,
            Predicate::StartsWith(_) => PredicateKind::StartsWith,
            Predicate::EndsWith(_) => PredicateKind::EndsWith,
            Predicate::Contains(_) => PredicateKind::Contains,
        }
    }

    /// Whether one attribute value satisfies the predicate
    pub fn matches_value(&self, value: &A) -> bool {
        match self {
            Predicate::Equal(expected) => value == expected,
            Predicate::In(candidates) => candidates.contains(value),
            Predicate::LessThan {
                value: bound,
                inclusive,
            } => {
                if *inclusive {
                    value <= bound
                } else {
                    value < bound
                }
            }
            Predicate::GreaterThan {
                value: bound,
                inclusive,
            } => {
                if *inclusive {
                    value >= bound
                } else {
                    value > bound
                }
            }
            Predicate::Between {
                lower,
                lower_inclusive,
                upper,
                upper_inclusive,
            } => {
                let above = if *lower_inclusive {
                    value >= lower
                } else {
                    value > lower
                };
                let below = if *upper_inclusive {
                    value <= upper
                } else {
                    value < upper
                };
                above && below
            }
            Predicate::Has => true,
            Predicate::StartsWith(prefix) => value.as_text().is_some_and(|t| t.starts_with(prefix.as_str())),
            Predicate::EndsWith(suffix) => value.as_text().is_some_and(|t| t.ends_with(suffix.as_str())),
            Predicate::Contains(needle) => value.as_text().is_some_and(|t| t.contains(needle.as_str())),
        }
    }
}

/// A predicate on one named attribute, type-erased over the attribute's value type
pub trait SimpleQuery<O>: Send + Sync + fmt::Debug {
    fn attribute_name(&self) -> &str;

    fn kind(&self) -> PredicateKind;

    fn matches(&self, object: &O) -> bool;

    /// Lets an index recover the concrete [`AttributeQuery`] for its value type
    fn as_any(&self) -> &dyn Any;
}

/// A predicate applied to the values of one attribute
pub struct AttributeQuery<O, A> {
    attribute: Attribute<O, A>,
    predicate: Predicate<A>,
}

impl<O, A: fmt::Debug> fmt::Debug for AttributeQuery<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeQuery")
            .field("attribute", &self.attribute.name())
            .field("predicate", &self.predicate)
            .finish()
    }
}

impl<O, A> AttributeQuery<O, A> {
    pub fn new(attribute: &Attribute<O, A>, predicate: Predicate<A>) -> Self {
        Self {
            attribute: attribute.clone(),
            predicate,
        }
    }

    pub fn attribute(&self) -> &Attribute<O, A> {
        &self.attribute
    }

    pub fn predicate(&self) -> &Predicate<A> {
        &self.predicate
    }
}

impl<O: 'static, A: AttributeValue> SimpleQuery<O> for AttributeQuery<O, A> {
    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn kind(&self) -> PredicateKind {
        self.predicate.kind()
    }

    /// Multi-valued attributes match when any value matches
    fn matches(&self, object: &O) -> bool {
        let values = self.attribute.values(object);
        match self.predicate {
            Predicate::Has => !values.is_empty(),
            _ => values.iter().any(|value| self.predicate.matches_value(value)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A query over objects of type `O`
pub enum Query<O> {
    All,
    None,
    And(Vec<Query<O>>),
    Or(Vec<Query<O>>),
    Not(Box<Query<O>>),
    Simple(Arc<dyn SimpleQuery<O>>),
}

impl<O> Clone for Query<O> {
    fn clone(&self) -> Self {
        match self {
            Query::All => Query::All,
            Query::None => Query::None,
            Query::And(children) => Query::And(children.clone()),
            Query::Or(children) => Query::Or(children.clone()),
            Query::Not(child) => Query::Not(child.clone()),
            Query::Simple(simple) => Query::Simple(Arc::clone(simple)),
        }
    }
}

impl<O> fmt::Debug for Query<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::All => f.write_str("all()"),
            Query::None => f.write_str("none()"),
            Query::And(children) => f.debug_tuple("and").field(children).finish(),
            Query::Or(children) => f.debug_tuple("or").field(children).finish(),
            Query::Not(child) => f.debug_tuple("not").field(child).finish(),
            Query::Simple(simple) => fmt::Debug::fmt(simple.as_ref(), f),
        }
    }
}

impl<O> Query<O> {
    /// Evaluate against a single object without any index
    pub fn matches(&self, object: &O) -> bool {
        match self {
            Query::All => true,
            Query::None => false,
            Query::And(children) => children.iter().all(|q| q.matches(object)),
            Query::Or(children) => children.iter().any(|q| q.matches(object)),
            Query::Not(child) => !child.matches(object),
            Query::Simple(simple) => simple.matches(object),
        }
    }

    pub fn and(self, other: Query<O>) -> Query<O> {
        match self {
            Query::And(mut children) => {
                children.push(other);
                Query::And(children)
            }
            query => Query::And(vec![query, other]),
        }
    }

    pub fn or(self, other: Query<O>) -> Query<O> {
        match self {
            Query::Or(mut children) => {
                children.push(other);
                Query::Or(children)
            }
            query => Query::Or(vec![query, other]),
        }
    }

    pub fn negate(self) -> Query<O> {
        match self {
            Query::Not(child) => *child,
            query => Query::Not(Box::new(query)),
        }
    }
}

fn simple<O: 'static, A: AttributeValue>(
    attribute: &Attribute<O, A>,
    predicate: Predicate<A>,
) -> Query<O> {
    Query::Simple(Arc::new(AttributeQuery::new(attribute, predicate)))
}

pub fn equal<O: 'static, A: AttributeValue>(
    attribute: &Attribute<O, A>,
    value: impl Into<A>,
) -> Query<O> {
    simple(attribute, Predicate::Equal(value.into()))
}

pub fn in_values<O: 'static, A: AttributeValue, V: Into<A>>(
    attribute: &Attribute<O, A>,
    values: impl IntoIterator<Item = V>,
) -> Query<O> {
    simple(
        attribute,
        Predicate::In(values.into_iter().map(Into::into).collect()),
    )
}

pub fn less_than<O: 'static, A: AttributeValue>(
    attribute: &Attribute<O, A>,
    value: impl Into<A>,
) -> Query<O> {
    simple(
        attribute,
        Predicate::LessThan {
            value: value.into(),
            inclusive: false,
        },
    )
}

pub fn less_than_or_equal<O: 'static, A: AttributeValue>(
    attribute: &Attribute<O, A>,
    value: impl Into<A>,
) -> Query<O> {
    simple(
        attribute,
        Predicate::LessThan {
            value: value.into(),
            inclusive: true,
        },
    )
}

pub fn greater_than<O: 'static, A: AttributeValue>(
    attribute: &Attribute<O, A>,
    value: impl Into<A>,
) -> Query<O> {
    simple(
        attribute,
        Predicate::GreaterThan {
            value: value.into(),
            inclusive: false,
        },
    )
}

pub fn greater_than_or_equal<O: 'static, A: AttributeValue>(
    attribute: &Attribute<O, A>,
    value: impl Into<A>,
) -> Query<O> {
    simple(
        attribute,
        Predicate::GreaterThan {
            value: value.into(),
            inclusive: true,
        },
    )
}

pub fn between<O: 'static, A: AttributeValue>(
    attribute: &Attribute<O, A>,
    lower: impl Into<A>,
    lower_inclusive: bool,
    upper: impl Into<A>,
    upper_inclusive: bool,
) -> Query<O> {
    simple(
        attribute,
        Predicate::Between {
            lower: lower.into(),
            lower_inclusive,
            upper: upper.into(),
            upper_inclusive,
        },
    )
}

/// Objects for which the attribute yields at least one value
pub fn has<O: 'static, A: AttributeValue>(attribute: &Attribute<O, A>) -> Query<O> {
    simple(attribute, Predicate::Has)
}

pub fn starts_with<O: 'static, A: AttributeValue + AsRef<str>>(
    attribute: &Attribute<O, A>,
    prefix: impl Into<String>,
) -> Query<O> {
    simple(attribute, Predicate::StartsWith(prefix.into()))
}

pub fn ends_with<O: 'static, A: AttributeValue + AsRef<str>>(
    attribute: &Attribute<O, A>,
    suffix: impl Into<String>,
) -> Query<O> {
    simple(attribute, Predicate::EndsWith(suffix.into()))
}

pub fn contains<O: 'static, A: AttributeValue + AsRef<str>>(
    attribute: &Attribute<O, A>,
    needle: impl Into<String>,
) -> Query<O> {
    simple(attribute, Predicate::Contains(needle.into()))
}

/// Objects matching every query; an empty conjunction matches everything
pub fn and<O>(queries: impl IntoIterator<Item = Query<O>>) -> Query<O> {
    Query::And(queries.into_iter().collect())
}

/// Objects matching at least one query; an empty disjunction matches nothing
pub fn or<O>(queries: impl IntoIterator<Item = Query<O>>) -> Query<O> {
    Query::Or(queries.into_iter().collect())
}

pub fn not<O>(query: Query<O>) -> Query<O> {
    Query::Not(Box::new(query))
}

pub fn all<O>() -> Query<O> {
    Query::All
}

pub fn none<O>() -> Query<O> {
    Query::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Widget {
        name: String,
        weight: u32,
        tags: Vec<String>,
    }

    fn widget(name: &str, weight: u32, tags: &[&str]) -> Widget {
        Widget {
            name: name.to_string(),
            weight,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn name() -> Attribute<Widget, String> {
        Attribute::new("name", |w: &Widget| w.name.clone())
    }

    fn weight() -> Attribute<Widget, u32> {
        Attribute::new("weight", |w: &Widget| w.weight)
    }

    fn tags() -> Attribute<Widget, String> {
        Attribute::multi("tags", |w: &Widget| w.tags.clone())
    }

    #[test]
    fn test_string_predicates() {
        let frank = widget("Frank", 1, &[]);
        assert!(equal(&name(), "Frank").matches(&frank));
        assert!(starts_with(&name(), "Fr").matches(&frank));
        assert!(ends_with(&name(), "ank").matches(&frank));
        assert!(contains(&name(), "ran").matches(&frank));
        assert!(!contains(&name(), "xx").matches(&frank));
    }

    #[test]
    fn test_range_predicates() {
        let w = widget("w", 10, &[]);
        assert!(less_than(&weight(), 11u32).matches(&w));
        assert!(!less_than(&weight(), 10u32).matches(&w));
        assert!(less_than_or_equal(&weight(), 10u32).matches(&w));
        assert!(greater_than_or_equal(&weight(), 10u32).matches(&w));
        assert!(!greater_than(&weight(), 10u32).matches(&w));
        assert!(between(&weight(), 10u32, true, 20u32, false).matches(&w));
        assert!(!between(&weight(), 10u32, false, 20u32, true).matches(&w));
        assert!(in_values(&weight(), [1u32, 10]).matches(&w));
    }

    #[test]
    fn test_multi_valued_and_has() {
        let tagged = widget("a", 1, &["red", "blue"]);
        let untagged = widget("b", 1, &[]);
        assert!(equal(&tags(), "blue").matches(&tagged));
        assert!(has(&tags()).matches(&tagged));
        assert!(!has(&tags()).matches(&untagged));
    }

    #[test]
    fn test_logical_operators() {
        let bob = widget("Bob", 5, &[]);
        let query = or([ends_with(&name(), "ank"), starts_with(&name(), "Bo")]);
        assert!(query.matches(&bob));
        assert!(!not(query.clone()).matches(&bob));
        assert!(query.clone().negate().negate().matches(&bob));
        assert!(!query.and(greater_than(&weight(), 5u32)).matches(&bob));
        assert!(and::<Widget>([]).matches(&bob));
        assert!(!or::<Widget>([]).matches(&bob));
        assert!(all::<Widget>().matches(&bob));
        assert!(!none::<Widget>().matches(&bob));
    }

    #[test]
    fn test_combinators_flatten() {
        let query = equal(&name(), "a")
            .and(equal(&name(), "b"))
            .and(equal(&name(), "c"));
        match query {
            Query::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected and, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_query_metadata() {
        let query = starts_with(&name(), "Bo");
        let Query::Simple(simple) = query else {
            panic!("expected simple query");
        };
        assert_eq!(simple.attribute_name(), "name");
        assert_eq!(simple.kind(), PredicateKind::StartsWith);
        assert!(simple
            .as_any()
            .downcast_ref::<AttributeQuery<Widget, String>>()
            .is_some());
    }
}
