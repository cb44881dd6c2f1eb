//! Attributes: named extractors that read queryable values out of objects.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A value an attribute can produce and an index can store
pub trait AttributeValue: Clone + Ord + Hash + fmt::Debug + Send + Sync + 'static {
    /// Text view used by string predicates; `None` for non-text values
    fn as_text(&self) -> Option<&str> {
        None
    }
}

impl AttributeValue for String {
    fn as_text(&self) -> Option<&str> {
        Some(self)
    }
}

impl AttributeValue for &'static str {
    fn as_text(&self) -> Option<&str> {
        Some(self)
    }
}

macro_rules! non_text_attribute_values {
    ($($ty:ty),* $(,)?) => {
        $(impl AttributeValue for $ty {})*
    };
}

non_text_attribute_values!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize
);

type Extractor<O, A> = Arc<dyn Fn(&O) -> Vec<A> + Send + Sync>;

/// Named extractor of zero or more values of type `A` from objects of type `O`
pub struct Attribute<O, A> {
    name: Arc<str>,
    extractor: Extractor<O, A>,
}

impl<O, A> Clone for Attribute<O, A> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            extractor: Arc::clone(&self.extractor),
        }
    }
}

impl<O, A> fmt::Debug for Attribute<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute").field("name", &self.name).finish()
    }
}

impl<O, A> Attribute<O, A> {
    /// Attribute with exactly one value per object
    pub fn new(
        name: impl Into<String>,
        extract: impl Fn(&O) -> A + Send + Sync + 'static,
    ) -> Self {
        Self::multi(name, move |object| vec![extract(object)])
    }

    /// Attribute with any number of values per object
    pub fn multi(
        name: impl Into<String>,
        extract: impl Fn(&O) -> Vec<A> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            extractor: Arc::new(extract),
        }
    }

    /// Attribute that may be missing on some objects
    pub fn optional(
        name: impl Into<String>,
        extract: impl Fn(&O) -> Option<A> + Send + Sync + 'static,
    ) -> Self {
        Self::multi(name, move |object| extract(object).into_iter().collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self, object: &O) -> Vec<A> {
        (self.extractor)(object)
    }
}
