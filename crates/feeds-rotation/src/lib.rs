//! # Feeds Rotation - Group Key Rotation Engine
//!
//! On every membership change a group gets a fresh 256-bit symmetric key,
//! wrapped individually for each active member under that member's public
//! encryption key, advancing the group's key generation monotonically.
//!
//! The engine writes through the caller's writable unit-of-work, so a
//! membership mutation and its rotation commit (or roll back) as one
//! atomic batch, and the rotation always sees the post-mutation member
//! set.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod engine;
pub mod ports;

pub use engine::{RotationEngine, RotationError};
pub use ports::outbound::{
    BlockchainCache, CredentialsProvider, IdentityStore, InMemoryBlockchainCache,
    InMemoryIdentityStore, NodeCredentials,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
