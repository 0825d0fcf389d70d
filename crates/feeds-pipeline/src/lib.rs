//! # Feeds Pipeline - Two-Phase Transaction Engine
//!
//! Turns canonical transactions into replicated feed state. Dispatch is
//! strict: exactly one content handler (pure validator) and one
//! transaction handler (state mutator) per payload kind.
//!
//! ```text
//! SignedTransaction ──▶ ContentHandler::validate_and_sign ──▶ ValidatedTransaction
//!                                                             │
//!                                            TransactionHandler::handle
//!                                            (writable unit-of-work, commit,
//!                                             then publish events)
//! ```
//!
//! Validation never writes; a reject is terminal for the transaction.
//! Apply failures abort their unit-of-work; replays of already-applied
//! transactions are idempotent no-ops keyed by transaction id.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod handlers;
pub mod payloads;
pub mod pipeline;

pub use handlers::{ContentHandler, HandlerDeps, TransactionHandler, ValidationContext};
pub use payloads::{FeedPayload, PayloadKind};
pub use pipeline::TransactionPipeline;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
