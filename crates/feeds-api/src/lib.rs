//! # Feeds API - Bounded Request/Response Surface
//!
//! Serves feed listings, message pagination, key generations, admin
//! mutations, and attachment streaming to clients. The wire shapes in
//! [`wire`] are normative; the RPC framing around them is the host's
//! concern.
//!
//! Mutations return `{success, message}`: success guarantees durability,
//! failure guarantees no externally visible partial effect.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod aliases;
pub mod attachments;
pub mod service;
pub mod wire;

pub use aliases::{AliasProvider, InMemoryAliasProvider};
pub use attachments::{AttachmentTempStore, ATTACHMENT_CHUNK_SIZE};
pub use service::FeedsApi;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
