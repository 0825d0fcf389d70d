//! # Murmur Node Runtime
//!
//! Builds and owns the feeds core: event bus, storage (in-memory or
//! RocksDB), identity/alias/chain collaborators, rotation engine,
//! transaction pipeline, and the API surface.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod wiring;

pub use config::NodeConfig;
pub use wiring::{build_node, build_node_with_storage, build_node_with_store, Node};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
