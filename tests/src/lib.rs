//! # Murmur Test Suite
//!
//! Unified test crate containing the cross-crate scenarios of the feeds
//! core.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs       # Shared harness (node, identities, helpers)
//!     ├── group_lifecycle.rs# Creation, membership, governance
//!     ├── rotation_flow.rs  # Key generations, exclusion, grace window
//!     └── overlay_flow.rs   # Cache overlay, read positions, listings
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p murmur-tests
//! cargo test -p murmur-tests integration::rotation_flow
//! ```

#![allow(dead_code)]

pub mod integration;
