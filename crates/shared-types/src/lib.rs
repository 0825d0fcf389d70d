//! # Shared Types - Feeds Core Domain Model
//!
//! Contains all domain entities shared across the feeds subsystems. This is
//! the Single Source of Truth for type definitions: every other crate
//! consumes these types instead of declaring its own.
//!
//! ## Clusters
//!
//! - **Identity**: `FeedId`, `MessageId`, `TransactionId`, `Address`, `EncryptKey`
//! - **Feeds**: `Feed`, `GroupFeed`, `Participant`
//! - **Keys**: `KeyGeneration`, `WrappedKey`, `KeyRotationPayload`
//! - **Messages**: `EncryptedMessage`, `Attachment`, `ReadPosition`
//! - **Envelope**: `SignedTransaction`, `ValidatedTransaction`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ids;

// Re-exports
pub use config::FeedsConfig;
pub use entities::{
    Attachment, EncryptedMessage, Feed, FeedKind, GroupFeed, KeyGeneration, KeyRotationPayload,
    Participant, ParticipantRole, ReadPosition, RotationTrigger, WrappedKey,
};
pub use envelope::{SignedTransaction, ValidatedTransaction};
pub use errors::FeedError;
pub use ids::{Address, BlockIndex, EncryptKey, FeedId, MessageId, TransactionId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
