//! # Indexed Cache Error Types
//!
//! Structured error handling for caches, collections and the indexed cache
//! using thiserror instead of stringly-typed errors.

use thiserror::Error;

/// Errors raised by caches, collections and the indexed cache
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexedCacheError {
    #[error("Cache is closed: {cache}")]
    CacheClosed { cache: String },

    #[error("Cache already exists: {cache}")]
    CacheAlreadyExists { cache: String },

    #[error("Cache not found: {cache}")]
    CacheNotFound { cache: String },

    #[error("Cache {cache} was created with different key/value types")]
    CacheTypeMismatch { cache: String },

    #[error("Unique constraint violated on attribute {attribute}: value {value} is already indexed")]
    UniqueConstraintViolation { attribute: String, value: String },

    #[error("Query matched {count} objects where exactly one was expected")]
    NonUniqueResult { count: usize },

    #[error("Query matched no objects where exactly one was expected")]
    NoSuchObject,

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Listener error: {message}")]
    Listener { message: String },
}

impl IndexedCacheError {
    /// Create a cache closed error
    pub fn cache_closed(cache: impl Into<String>) -> Self {
        Self::CacheClosed {
            cache: cache.into(),
        }
    }

    /// Create a cache already exists error
    pub fn cache_already_exists(cache: impl Into<String>) -> Self {
        Self::CacheAlreadyExists {
            cache: cache.into(),
        }
    }

    /// Create a cache not found error
    pub fn cache_not_found(cache: impl Into<String>) -> Self {
        Self::CacheNotFound {
            cache: cache.into(),
        }
    }

    /// Create a cache type mismatch error
    pub fn cache_type_mismatch(cache: impl Into<String>) -> Self {
        Self::CacheTypeMismatch {
            cache: cache.into(),
        }
    }

    /// Create a unique constraint violation error
    pub fn unique_constraint_violation(
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::UniqueConstraintViolation {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create an invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a listener error
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener {
            message: message.into(),
        }
    }

    /// Whether the error was caused by using a closed cache
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::CacheClosed { .. })
    }
}

impl From<config::ConfigError> for IndexedCacheError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexedCacheError>;
