use crate::error::{IndexedCacheError, Result};
use std::fmt;
use std::sync::Arc;

/// Materialized, ordered result of a query
pub struct ResultSet<O> {
    objects: Vec<Arc<O>>,
    retrieval_cost: usize,
}

impl<O> Clone for ResultSet<O> {
    fn clone(&self) -> Self {
        Self {
            objects: self.objects.clone(),
            retrieval_cost: self.retrieval_cost,
        }
    }
}

impl<O: fmt::Debug> fmt::Debug for ResultSet<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("objects", &self.objects)
            .field("retrieval_cost", &self.retrieval_cost)
            .finish()
    }
}

impl<O> ResultSet<O> {
    pub(crate) fn new(objects: Vec<Arc<O>>, retrieval_cost: usize) -> Self {
        Self {
            objects,
            retrieval_cost,
        }
    }

    pub fn size(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &O> {
        self.objects.iter().map(Arc::as_ref)
    }

    pub fn first(&self) -> Option<&O> {
        self.objects.first().map(Arc::as_ref)
    }

    /// The single matching object
    pub fn unique_result(&self) -> Result<&O> {
        match self.objects.as_slice() {
            [only] => Ok(only.as_ref()),
            [] => Err(IndexedCacheError::NoSuchObject),
            many => Err(IndexedCacheError::NonUniqueResult { count: many.len() }),
        }
    }

    pub fn contains(&self, object: &O) -> bool
    where
        O: PartialEq,
    {
        self.iter().any(|candidate| candidate == object)
    }

    pub fn to_vec(&self) -> Vec<O>
    where
        O: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Cost of the most expensive index or scan used to answer the query
    pub fn retrieval_cost(&self) -> usize {
        self.retrieval_cost
    }
}

impl<O> IntoIterator for ResultSet<O> {
    type Item = Arc<O>;
    type IntoIter = std::vec::IntoIter<Arc<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

impl<'a, O> IntoIterator for &'a ResultSet<O> {
    type Item = &'a Arc<O>;
    type IntoIter = std::slice::Iter<'a, Arc<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}
