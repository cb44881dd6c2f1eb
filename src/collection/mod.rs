//! # Collection
//!
//! An in-memory indexed collection: objects are stored once, described by
//! [`Attribute`]s, looked up through [`index`]es and queried with the
//! combinators in [`query`].
//!
//! ```rust
//! use indexed_cache::collection::{query::*, HashIndex, IndexedCollection, Attribute};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Car { make: String, doors: u8 }
//!
//! let make = Attribute::new("make", |c: &Car| c.make.clone());
//! let cars = IndexedCollection::new();
//! cars.add_index(HashIndex::on_attribute(&make)).unwrap();
//! cars.add(Car { make: "Ford".into(), doors: 5 }).unwrap();
//! cars.add(Car { make: "Honda".into(), doors: 3 }).unwrap();
//!
//! let fords = cars.retrieve(&equal(&make, "Ford"));
//! assert_eq!(fords.unique_result().unwrap().doors, 5);
//! ```

pub mod attribute;
pub mod index;
pub mod indexed_collection;
pub mod options;
pub mod pagination;
pub mod query;
pub mod result_set;

pub use attribute::{Attribute, AttributeValue};
pub use index::{
    HashIndex, Index, IndexKind, NavigableIndex, ObjectId, RadixTreeIndex, ReversedRadixTreeIndex,
    SuffixTreeIndex, UniqueIndex,
};
pub use indexed_collection::IndexedCollection;
pub use options::{ascending, descending, AttributeOrder, QueryOptions, FLAG_STRICT_REPLACEMENT};
pub use pagination::Pagination;
pub use query::{AttributeQuery, Predicate, PredicateKind, Query, SimpleQuery};
pub use result_set::ResultSet;
