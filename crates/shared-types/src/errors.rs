//! # Error Types
//!
//! The semantic error kinds reported by the feeds core. Callers branch on
//! the kind, never on message strings.

use thiserror::Error;

/// Semantic error kinds of the feeds core.
///
/// Validation errors abort the transaction and surface as a typed status.
/// `Transient` marks recoverable failures the caller may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Empty/oversized title, malformed identifiers, missing required
    /// fields, non-32-byte author commitment.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Non-admin requesting an admin action; non-participant requesting
    /// per-feed data.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Group/attachment/message absent, or a cross-feed mismatch on
    /// message lookup.
    #[error("not found: {0}")]
    NotFound(String),

    /// Group deleted; member already in the target state; cooldown not
    /// elapsed.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Duplicate addresses in a participant list; duplicate key-rotation
    /// member entry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Key generation failed, member identity missing, or member public
    /// key malformed.
    #[error("key distribution failed: {0}")]
    CryptoFailure(String),

    /// Group would exceed the maximum member count.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// Cache or identity lookup failure; recoverable.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl FeedError {
    /// True for failures the caller may retry without changing the request.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, FeedError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_failure_names_key_distribution() {
        let err = FeedError::CryptoFailure("no identity for mrrD4ve".into());
        assert!(err.to_string().contains("key distribution failed"));
    }

    #[test]
    fn test_only_transient_is_retriable() {
        assert!(FeedError::Transient("cache down".into()).is_retriable());
        assert!(!FeedError::NotFound("feed".into()).is_retriable());
        assert!(!FeedError::PermissionDenied("not admin".into()).is_retriable());
    }
}
