//! # Feed Storage Service
//!
//! The facade other subsystems talk to. Owns the durable store and the
//! best-effort cache, hands out units of work, and applies the overlay
//! rules on the read paths that have both a cache and a durable source:
//!
//! - cache hit with no detectable gap: serve the cache;
//! - miss, gap, or error: consult the durable store and populate the
//!   cache on non-empty results (empty results are never cached);
//! - `last_block_index`: the maximum of both sources wins;
//! - cache failures are logged and swallowed, never surfaced;
//! - read positions degrade to a zero bookmark, never an error.

use crate::domain::errors::StorageError;
use crate::domain::uow::{FeedReads, ReadOnlyUow, SharedStore, WritableUow};
use crate::ports::cache::{CachedMessageTail, FeedCache};
use crate::ports::outbound::KeyValueStore;
use parking_lot::RwLock;
use shared_types::{Address, BlockIndex, EncryptedMessage, FeedId, WrappedKey};
use std::sync::Arc;
use tracing::{debug, warn};

/// One page of messages plus the pagination facts the API reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWindow {
    /// Messages, newest first.
    pub messages: Vec<EncryptedMessage>,
    /// Whether older messages exist beyond this window.
    pub has_more: bool,
    /// Lowest block index in the window (0 when empty).
    pub oldest_block: BlockIndex,
    /// Highest block index in the window (0 when empty).
    pub newest_block: BlockIndex,
}

impl MessageWindow {
    fn from_messages(messages: Vec<EncryptedMessage>, has_more: bool) -> Self {
        let newest_block = messages.first().map_or(0, |m| m.block_index);
        let oldest_block = messages.last().map_or(0, |m| m.block_index);
        Self {
            messages,
            has_more,
            oldest_block,
            newest_block,
        }
    }
}

/// The storage facade: durable store + overlay cache.
pub struct FeedStorage {
    store: SharedStore,
    cache: Arc<dyn FeedCache>,
}

impl FeedStorage {
    /// Build over a durable store and a cache implementation.
    pub fn new(store: Box<dyn KeyValueStore>, cache: Arc<dyn FeedCache>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            cache,
        }
    }

    /// Convenience constructor for tests and single-process runs.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(crate::ports::outbound::InMemoryKVStore::new()),
            Arc::new(crate::adapters::memory_cache::InMemoryFeedCache::new()),
        )
    }

    /// A stale-but-consistent read view.
    #[must_use]
    pub fn create_read_only(&self) -> ReadOnlyUow {
        ReadOnlyUow::new(self.store.clone())
    }

    /// A writable unit-of-work staging one atomic batch.
    #[must_use]
    pub fn create_writable(&self) -> WritableUow {
        WritableUow::new(self.store.clone(), self.cache.clone())
    }

    /// The cache handle (for wiring and tests).
    #[must_use]
    pub fn cache(&self) -> Arc<dyn FeedCache> {
        self.cache.clone()
    }

    /// Overlaid `last_block_index` for one feed: `max(durable, cache)`.
    ///
    /// The durable value is the floor; the cache may carry a fresher value
    /// written by in-flight work.
    pub fn last_block_index_overlaid(
        &self,
        feed_id: FeedId,
        durable: BlockIndex,
    ) -> BlockIndex {
        match self.cache.last_block_index(feed_id) {
            Ok(Some(cached)) => durable.max(cached),
            Ok(None) => durable,
            Err(err) => {
                warn!(%feed_id, %err, "Cache read failed; using durable block index");
                durable
            }
        }
    }

    /// Read position with the degraded-path rule: any cache or store
    /// failure yields a zero bookmark rather than an error.
    pub fn read_position_or_zero(&self, user: &Address, feed_id: FeedId) -> BlockIndex {
        match self.cache.read_position(user, feed_id) {
            Ok(Some(cached)) => return cached,
            Ok(None) => {}
            Err(err) => {
                warn!(%feed_id, %user, %err, "Read-position cache failed; defaulting to zero");
                return 0;
            }
        }

        let durable = self
            .create_read_only()
            .get_read_position(user, feed_id)
            .map(|row| row.map(|p| p.last_read_block_index));
        match durable {
            Ok(Some(position)) => {
                if let Err(err) = self.cache.put_read_position(user, feed_id, position) {
                    warn!(%feed_id, %user, %err, "Read-position cache populate failed");
                }
                position
            }
            Ok(None) => 0,
            Err(err) => {
                warn!(%feed_id, %user, %err, "Read-position lookup failed; defaulting to zero");
                0
            }
        }
    }

    /// The latest-or-before message window for the API.
    ///
    /// The cached tail only answers a latest-window request when it holds
    /// strictly more than `limit` messages, which both fills the window and
    /// proves older messages exist. Every other shape goes durable, and a
    /// non-empty latest window repopulates the tail as a side effect.
    pub fn message_window(
        &self,
        feed_id: FeedId,
        before_block: Option<BlockIndex>,
        limit: usize,
    ) -> Result<MessageWindow, StorageError> {
        if before_block.is_none() {
            match self.cache.message_tail(feed_id) {
                Ok(Some(tail)) if tail.messages.len() > limit => {
                    debug!(%feed_id, "Message window served from cache tail");
                    let mut newest_first: Vec<EncryptedMessage> =
                        tail.messages.iter().rev().take(limit).cloned().collect();
                    newest_first.truncate(limit);
                    return Ok(MessageWindow::from_messages(newest_first, true));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(%feed_id, %err, "Message-tail cache failed; falling back to store");
                }
            }
        }

        let reader = self.create_read_only();
        let fetch_latest = before_block.is_none();
        let over_fetched = reader.get_paginated_messages(
            feed_id,
            0,
            limit.saturating_add(1),
            fetch_latest,
            before_block,
        )?;
        let has_more = over_fetched.len() > limit;
        let mut messages = over_fetched;
        messages.truncate(limit);

        if fetch_latest && !messages.is_empty() {
            let mut ascending = messages.clone();
            ascending.reverse();
            let tail = CachedMessageTail {
                origin_block: ascending.first().map_or(0, |m| m.block_index),
                messages: ascending,
            };
            if let Err(err) = self.cache.put_message_tail(feed_id, tail) {
                warn!(%feed_id, %err, "Message-tail cache populate failed");
            }
        }

        Ok(MessageWindow::from_messages(messages, has_more))
    }

    /// Messages at or after `since_block`, ascending, answered from the
    /// cached tail only when it covers the requested range without a gap.
    pub fn messages_since(
        &self,
        feed_id: FeedId,
        since_block: BlockIndex,
        limit: usize,
    ) -> Result<Vec<EncryptedMessage>, StorageError> {
        match self.cache.message_tail(feed_id) {
            Ok(Some(tail)) if tail.covers_since(since_block) => {
                debug!(%feed_id, since_block, "Messages-since served from cache tail");
                return Ok(tail
                    .messages
                    .into_iter()
                    .filter(|m| m.block_index >= since_block)
                    .take(limit)
                    .collect());
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%feed_id, %err, "Message-tail cache failed; falling back to store");
            }
        }

        let messages = self.create_read_only().get_paginated_messages(
            feed_id,
            since_block,
            limit,
            false,
            None,
        )?;
        if !messages.is_empty() {
            let tail = CachedMessageTail {
                origin_block: since_block,
                messages: messages.clone(),
            };
            if let Err(err) = self.cache.put_message_tail(feed_id, tail) {
                warn!(%feed_id, %err, "Message-tail cache populate failed");
            }
        }
        Ok(messages)
    }

    /// A member's wrapped keys, cache-first with durable fallback.
    pub fn wrapped_keys_for_member(
        &self,
        feed_id: FeedId,
        member: &Address,
    ) -> Result<Vec<WrappedKey>, StorageError> {
        match self.cache.wrapped_keys(feed_id, member) {
            Ok(Some(keys)) => return Ok(keys),
            Ok(None) => {}
            Err(err) => {
                warn!(%feed_id, %member, %err, "Wrapped-key cache failed; falling back to store");
            }
        }

        let keys = self
            .create_read_only()
            .get_wrapped_keys_for_member(feed_id, member)?;
        if !keys.is_empty() {
            if let Err(err) = self.cache.put_wrapped_keys(feed_id, member, keys.clone()) {
                warn!(%feed_id, %member, %err, "Wrapped-key cache populate failed");
            }
        }
        Ok(keys)
    }
}
