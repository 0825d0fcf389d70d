//! # Shared Bus - Feed Event Choreography
//!
//! In-process event bus carrying post-commit feed events. Transaction
//! handlers publish here after their unit-of-work commits; push
//! notification and sync layers subscribe.
//!
//! ## Rules
//!
//! - Events are published only after the originating commit succeeded.
//!   Commit implies durable: a cancellation between commit and publish
//!   must still publish (subscribers tolerate replays).
//! - Publication sits on the transaction apply path and therefore never
//!   waits on a consumer: a subscriber that cannot keep up loses events,
//!   the handler does not stall.
//! - Subscribers never feed back into transaction handling; the bus is
//!   strictly a notification plane.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod bus;
pub mod events;

// Re-export main types
pub use bus::{EventPublisher, InMemoryEventBus, Subscription};
pub use events::{EventFilter, EventTopic, FeedEvent};

/// Events a subscriber may buffer before it starts losing them.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;
