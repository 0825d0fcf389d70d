//! # In-Memory Feed Cache
//!
//! LRU-backed implementation of the [`FeedCache`] port for single-node
//! operation. Distributed deployments would back the same port with an
//! external cache; the overlay rules in the service layer do not change.

use crate::domain::errors::CacheError;
use crate::ports::cache::{CachedMessageTail, FeedCache};
use lru::LruCache;
use parking_lot::Mutex;
use shared_types::{Address, BlockIndex, FeedId, WrappedKey};
use std::num::NonZeroUsize;

/// Default entry capacity per cache segment.
const DEFAULT_CAPACITY: usize = 4_096;

/// LRU cache over the hot feed read paths.
pub struct InMemoryFeedCache {
    block_indexes: Mutex<LruCache<FeedId, BlockIndex>>,
    read_positions: Mutex<LruCache<(Address, FeedId), BlockIndex>>,
    message_tails: Mutex<LruCache<FeedId, CachedMessageTail>>,
    wrapped_keys: Mutex<LruCache<(FeedId, Address), Vec<WrappedKey>>>,
}

impl InMemoryFeedCache {
    /// Create with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create with a custom per-segment capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        Self {
            block_indexes: Mutex::new(LruCache::new(cap)),
            read_positions: Mutex::new(LruCache::new(cap)),
            message_tails: Mutex::new(LruCache::new(cap)),
            wrapped_keys: Mutex::new(LruCache::new(cap)),
        }
    }
}

impl Default for InMemoryFeedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedCache for InMemoryFeedCache {
    fn last_block_index(&self, feed_id: FeedId) -> Result<Option<BlockIndex>, CacheError> {
        Ok(self.block_indexes.lock().get(&feed_id).copied())
    }

    fn put_last_block_index(
        &self,
        feed_id: FeedId,
        block_index: BlockIndex,
    ) -> Result<(), CacheError> {
        let mut cache = self.block_indexes.lock();
        // The cache may carry a fresher value than the durable floor;
        // never let a stale write regress it.
        let effective = cache
            .get(&feed_id)
            .map_or(block_index, |known| (*known).max(block_index));
        cache.put(feed_id, effective);
        Ok(())
    }

    fn read_position(
        &self,
        user: &Address,
        feed_id: FeedId,
    ) -> Result<Option<BlockIndex>, CacheError> {
        Ok(self
            .read_positions
            .lock()
            .get(&(user.clone(), feed_id))
            .copied())
    }

    fn put_read_position(
        &self,
        user: &Address,
        feed_id: FeedId,
        block_index: BlockIndex,
    ) -> Result<(), CacheError> {
        self.read_positions
            .lock()
            .put((user.clone(), feed_id), block_index);
        Ok(())
    }

    fn message_tail(&self, feed_id: FeedId) -> Result<Option<CachedMessageTail>, CacheError> {
        Ok(self.message_tails.lock().get(&feed_id).cloned())
    }

    fn put_message_tail(
        &self,
        feed_id: FeedId,
        tail: CachedMessageTail,
    ) -> Result<(), CacheError> {
        self.message_tails.lock().put(feed_id, tail);
        Ok(())
    }

    fn wrapped_keys(
        &self,
        feed_id: FeedId,
        member: &Address,
    ) -> Result<Option<Vec<WrappedKey>>, CacheError> {
        Ok(self
            .wrapped_keys
            .lock()
            .get(&(feed_id, member.clone()))
            .cloned())
    }

    fn put_wrapped_keys(
        &self,
        feed_id: FeedId,
        member: &Address,
        keys: Vec<WrappedKey>,
    ) -> Result<(), CacheError> {
        self.wrapped_keys.lock().put((feed_id, member.clone()), keys);
        Ok(())
    }

    fn invalidate_feed(&self, feed_id: FeedId) -> Result<(), CacheError> {
        self.message_tails.lock().pop(&feed_id);
        let stale: Vec<(FeedId, Address)> = self
            .wrapped_keys
            .lock()
            .iter()
            .filter(|((id, _), _)| *id == feed_id)
            .map(|(key, _)| key.clone())
            .collect();
        let mut wrapped = self.wrapped_keys.lock();
        for key in stale {
            wrapped.pop(&key);
        }
        Ok(())
    }
}
