//! # Post-Commit Event Fan-Out
//!
//! Transaction handlers publish here strictly after their unit-of-work
//! commits, so the bus sits on the hot apply path. Two rules follow:
//!
//! - publishing must never wait on a consumer: each subscriber owns a
//!   bounded mailbox, and an event that does not fit is dropped for that
//!   subscriber (with a warning) instead of stalling the handler;
//! - filtering happens on the publish side, so a subscriber interested in
//!   one feed's key rotations never pays for the firehose.
//!
//! Subscribers that went away are pruned lazily on the next publish;
//! dropping a [`Subscription`] is all the cleanup there is.

use crate::events::{EventFilter, FeedEvent};
use crate::DEFAULT_MAILBOX_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
///
/// Transaction handlers hold this behind an `Arc` and publish strictly
/// after their unit-of-work commits. Commit implies durable, so a
/// publisher may deliver an event more than once across restarts;
/// subscribers deduplicate by `(feed_id, block_index)` if they care.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// The number of subscriber mailboxes the event was delivered to.
    async fn publish(&self, event: FeedEvent) -> usize;
}

/// One subscriber's mailbox plus the filter it registered with.
struct Mailbox {
    filter: EventFilter,
    sender: mpsc::Sender<FeedEvent>,
}

/// In-process fan-out over per-subscriber bounded mailboxes.
pub struct InMemoryEventBus {
    mailboxes: Mutex<Vec<Mailbox>>,
    mailbox_capacity: usize,
    events_published: AtomicU64,
}

impl InMemoryEventBus {
    /// Create with the default mailbox capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    /// Create with a custom per-subscriber mailbox capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mailboxes: Mutex::new(Vec::new()),
            mailbox_capacity: capacity.max(1),
            events_published: AtomicU64::new(0),
        }
    }

    /// Register a subscriber; only events matching `filter` are
    /// delivered. Dropping the returned handle unsubscribes.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.mailbox_capacity);
        debug!(topics = ?filter.topics, feed = ?filter.feed_id, "Feed event subscription opened");
        if let Ok(mut mailboxes) = self.mailboxes.lock() {
            mailboxes.push(Mailbox { filter, sender });
        }
        Subscription { receiver }
    }

    /// Number of live subscribers (dropped ones are pruned first).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let Ok(mut mailboxes) = self.mailboxes.lock() else {
            return 0;
        };
        mailboxes.retain(|m| !m.sender.is_closed());
        mailboxes.len()
    }

    /// Total events published since startup.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: FeedEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        let Ok(mut mailboxes) = self.mailboxes.lock() else {
            return 0;
        };
        mailboxes.retain(|m| !m.sender.is_closed());

        let mut delivered = 0;
        for mailbox in mailboxes.iter() {
            if !mailbox.filter.matches(&event) {
                continue;
            }
            match mailbox.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // The commit path does not wait for slow consumers.
                    warn!(feed_id = %event.feed_id(), "Subscriber mailbox full; event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

/// A subscriber's receiving end. Dropping it unsubscribes.
pub struct Subscription {
    receiver: mpsc::Receiver<FeedEvent>,
}

impl Subscription {
    /// Receive the next matching event.
    ///
    /// Returns `None` once the bus has been dropped and the mailbox is
    /// drained.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.receiver.recv().await
    }
}
