//! Durable-store backends.
//!
//! The in-memory backend (from `feeds-storage`) serves tests and
//! single-process runs; the RocksDB backend (feature `rocksdb`) is the
//! production store.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};
