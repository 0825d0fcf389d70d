//! Adapters: concrete implementations of the ports.

pub mod memory_cache;
