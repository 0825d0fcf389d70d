//! # Feeds Storage - Durable Store + Overlay Cache
//!
//! The source of truth for replicated feed state, fronted by a best-effort
//! cache whose failure never changes correctness.
//!
//! ## Layout
//!
//! - `ports`: the `KeyValueStore` and `FeedCache` interfaces the host
//!   provides, with in-memory implementations.
//! - `domain`: key encoding, unit-of-work, typed repository queries.
//! - `service`: the `FeedStorage` facade applying the overlay rules
//!   (maximum wins for `last_block_index`, cache-aside population,
//!   swallow-and-log cache failures, zero-bookmark read positions).
//!
//! ## Unit of work
//!
//! `create_read_only()` yields a stale-but-consistent read view.
//! `create_writable()` stages every mutation into one atomic batch;
//! nothing is visible to other readers until `commit()`, and a dropped
//! unit-of-work discards its staged writes. Reads through a writable
//! unit-of-work observe its own staged state, so a handler that inserts a
//! participant and then rotates keys sees the post-mutation member set.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod test_utils;

pub use domain::errors::{CacheError, StorageError};
pub use domain::uow::{FeedReads, ReadOnlyUow, WritableUow};
pub use ports::cache::{CachedMessageTail, FeedCache};
pub use ports::outbound::{BatchOperation, InMemoryKVStore, KeyValueStore};
pub use service::{FeedStorage, MessageWindow};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
