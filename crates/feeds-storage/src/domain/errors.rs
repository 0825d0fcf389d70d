//! Storage error types.

use shared_types::FeedError;
use thiserror::Error;

/// Errors from the durable store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying key-value store failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value failed to decode.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A row required by the operation is absent.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for FeedError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => FeedError::NotFound(what),
            StorageError::Database(msg) => FeedError::Transient(msg),
            StorageError::Serialization(msg) => FeedError::Transient(msg),
        }
    }
}

/// Errors from the best-effort cache.
///
/// These are always recoverable: the overlay rules fall back to the
/// durable store (or a zero bookmark) and never propagate cache errors
/// to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The cache backend is unreachable or failed mid-operation.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_maps_to_transient() {
        let err: FeedError = StorageError::Database("io".into()).into();
        assert!(err.is_retriable());
    }

    #[test]
    fn test_not_found_maps_to_not_found() {
        let err: FeedError = StorageError::NotFound("feed".into()).into();
        assert!(matches!(err, FeedError::NotFound(_)));
    }
}
