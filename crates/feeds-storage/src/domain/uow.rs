//! # Unit of Work
//!
//! `ReadOnlyUow` serves stale-but-consistent reads straight from the
//! durable store. `WritableUow` stages every mutation into one atomic
//! batch; reads through it observe the staged state, so a handler that
//! inserts a participant and then rotates keys sees the post-mutation
//! member set. Dropping a writable unit-of-work without committing
//! discards all staged writes.
//!
//! Entities are immutable records keyed by id for the lifetime of the
//! unit-of-work; commit translates them into durable writes, and after
//! commit the handler holds no references into the store.

use crate::domain::errors::StorageError;
use crate::domain::keys;
use crate::ports::cache::FeedCache;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{
    Address, Attachment, BlockIndex, EncryptedMessage, Feed, FeedId, GroupFeed, KeyGeneration,
    KeyRotationPayload, MessageId, Participant, ParticipantRole, ReadPosition, TransactionId,
    WrappedKey,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Shared handle to the durable store.
pub type SharedStore = Arc<RwLock<Box<dyn KeyValueStore>>>;

/// Locator row pointing from a message id to its primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLocator {
    /// The feed the message lives in.
    pub feed_id: FeedId,
    /// The block the message was included in.
    pub block_index: BlockIndex,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Raw row access shared by both unit-of-work flavors.
pub trait KvRead {
    /// Get a row.
    fn kv_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Scan rows by prefix, ascending by key.
    fn kv_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}

/// Typed repository queries, available on any unit-of-work.
pub trait FeedReads: KvRead {
    /// The feed envelope, if the feed exists.
    fn get_feed(&self, feed_id: FeedId) -> Result<Option<Feed>, StorageError> {
        self.kv_get(&keys::feed(feed_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Group state, if the feed is a group.
    fn get_group_feed(&self, feed_id: FeedId) -> Result<Option<GroupFeed>, StorageError> {
        self.kv_get(&keys::group(feed_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// The highest key-generation version issued for a group.
    fn get_max_key_generation(&self, feed_id: FeedId) -> Result<Option<u32>, StorageError> {
        Ok(self
            .get_group_feed(feed_id)?
            .map(|group| group.current_key_generation))
    }

    /// One key generation row.
    fn get_key_generation(
        &self,
        feed_id: FeedId,
        version: u32,
    ) -> Result<Option<KeyGeneration>, StorageError> {
        self.kv_get(&keys::key_generation(feed_id, version))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// All key generations of a group, ascending by version.
    fn get_all_key_generations(&self, feed_id: FeedId) -> Result<Vec<KeyGeneration>, StorageError> {
        self.kv_scan(&keys::key_generation_prefix(feed_id))?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Every wrapped key a member holds in a group, ascending by version.
    fn get_wrapped_keys_for_member(
        &self,
        feed_id: FeedId,
        member: &Address,
    ) -> Result<Vec<WrappedKey>, StorageError> {
        let mut out = Vec::new();
        for (_, bytes) in self.kv_scan(&keys::wrapped_key_feed_prefix(feed_id))? {
            let wrapped: WrappedKey = decode(&bytes)?;
            if &wrapped.member_address == member {
                out.push(wrapped);
            }
        }
        Ok(out)
    }

    /// All wrapped keys of one generation.
    fn get_wrapped_keys_for_version(
        &self,
        feed_id: FeedId,
        version: u32,
    ) -> Result<Vec<WrappedKey>, StorageError> {
        let mut out = Vec::new();
        for (_, bytes) in self.kv_scan(&keys::wrapped_key_feed_prefix(feed_id))? {
            let wrapped: WrappedKey = decode(&bytes)?;
            if wrapped.version == version {
                out.push(wrapped);
            }
        }
        Ok(out)
    }

    /// A participation row including historical (left/banned) state.
    fn get_participant_with_history(
        &self,
        feed_id: FeedId,
        address: &Address,
    ) -> Result<Option<Participant>, StorageError> {
        self.kv_get(&keys::participant(feed_id, address))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Every participation row of a feed.
    fn get_participants(&self, feed_id: FeedId) -> Result<Vec<Participant>, StorageError> {
        self.kv_scan(&keys::participant_prefix(feed_id))?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Addresses of currently active members.
    fn get_active_group_member_addresses(
        &self,
        feed_id: FeedId,
    ) -> Result<Vec<Address>, StorageError> {
        Ok(self
            .get_participants(feed_id)?
            .into_iter()
            .filter(Participant::is_active)
            .map(|p| p.address)
            .collect())
    }

    /// Whether `address` is an active admin of the feed.
    fn is_admin(&self, feed_id: FeedId, address: &Address) -> Result<bool, StorageError> {
        Ok(self
            .get_participant_with_history(feed_id, address)?
            .map(|p| p.is_active() && p.role == ParticipantRole::Admin)
            .unwrap_or(false))
    }

    /// Whether `address` is an active participant of the feed.
    fn is_user_participant_of_feed(
        &self,
        feed_id: FeedId,
        address: &Address,
    ) -> Result<bool, StorageError> {
        Ok(self
            .get_participant_with_history(feed_id, address)?
            .map(|p| p.is_active())
            .unwrap_or(false))
    }

    /// Every feed where `address` participates actively.
    fn get_feeds_for_address(&self, address: &Address) -> Result<Vec<Feed>, StorageError> {
        let mut out = Vec::new();
        for (key, _) in self.kv_scan(&keys::participant_index_prefix(address))? {
            // The index key ends with the fixed-width feed id.
            let Some(raw) = key.get(key.len().saturating_sub(16)..) else {
                continue;
            };
            let Ok(uuid) = uuid::Uuid::from_slice(raw) else {
                continue;
            };
            let feed_id = FeedId::from(uuid);
            let active = self
                .get_participant_with_history(feed_id, address)?
                .map(|p| p.is_active())
                .unwrap_or(false);
            if !active {
                continue;
            }
            if let Some(group) = self.get_group_feed(feed_id)? {
                if group.is_deleted {
                    continue;
                }
            }
            if let Some(feed) = self.get_feed(feed_id)? {
                out.push(feed);
            }
        }
        Ok(out)
    }

    /// Group feeds where `address` participates actively.
    fn get_group_feeds_for_address(
        &self,
        address: &Address,
    ) -> Result<Vec<GroupFeed>, StorageError> {
        let mut out = Vec::new();
        for feed in self.get_feeds_for_address(address)? {
            if let Some(group) = self.get_group_feed(feed.id)? {
                out.push(group);
            }
        }
        Ok(out)
    }

    /// `last_block_index` for every feed of a user, from the durable store.
    fn get_all_last_block_indexes(
        &self,
        address: &Address,
    ) -> Result<Vec<(FeedId, BlockIndex)>, StorageError> {
        Ok(self
            .get_feeds_for_address(address)?
            .into_iter()
            .map(|feed| (feed.id, feed.last_block_index))
            .collect())
    }

    /// Paginated messages of one feed.
    ///
    /// - `fetch_latest`: the newest `limit` messages, newest first.
    /// - `before_block` set: messages strictly before that block, newest
    ///   first, up to `limit`.
    /// - otherwise: messages at or after `since_block`, ascending, up to
    ///   `limit`.
    fn get_paginated_messages(
        &self,
        feed_id: FeedId,
        since_block: BlockIndex,
        limit: usize,
        fetch_latest: bool,
        before_block: Option<BlockIndex>,
    ) -> Result<Vec<EncryptedMessage>, StorageError> {
        let mut messages: Vec<EncryptedMessage> = self
            .kv_scan(&keys::message_prefix(feed_id))?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect::<Result<_, _>>()?;

        if fetch_latest {
            let skip = messages.len().saturating_sub(limit);
            let mut window: Vec<_> = messages.split_off(skip);
            window.reverse();
            return Ok(window);
        }

        if let Some(before) = before_block {
            messages.retain(|m| m.block_index < before);
            let skip = messages.len().saturating_sub(limit);
            let mut window: Vec<_> = messages.split_off(skip);
            window.reverse();
            return Ok(window);
        }

        messages.retain(|m| m.block_index >= since_block);
        messages.truncate(limit);
        Ok(messages)
    }

    /// A message by id, wherever it lives.
    fn get_message_by_id(
        &self,
        message_id: MessageId,
    ) -> Result<Option<EncryptedMessage>, StorageError> {
        let Some(bytes) = self.kv_get(&keys::message_locator(message_id))? else {
            return Ok(None);
        };
        let locator: MessageLocator = decode(&bytes)?;
        self.kv_get(&keys::message(locator.feed_id, locator.block_index, message_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Attachment metadata and bytes by id.
    fn get_attachment_by_id(&self, id: MessageId) -> Result<Option<Attachment>, StorageError> {
        self.kv_get(&keys::attachment(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// One read position.
    fn get_read_position(
        &self,
        user: &Address,
        feed_id: FeedId,
    ) -> Result<Option<ReadPosition>, StorageError> {
        self.kv_get(&keys::read_position(user, feed_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Every bookmark of a user.
    fn get_read_positions_for_user(
        &self,
        user: &Address,
    ) -> Result<Vec<ReadPosition>, StorageError> {
        self.kv_scan(&keys::read_position_prefix(user))?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Whether a canonical transaction has already been applied.
    fn is_transaction_applied(&self, id: TransactionId) -> Result<bool, StorageError> {
        Ok(self.kv_get(&keys::applied_transaction(id))?.is_some())
    }
}

impl<T: KvRead + ?Sized> FeedReads for T {}

/// A stale-but-consistent read view over the durable store.
pub struct ReadOnlyUow {
    store: SharedStore,
}

impl ReadOnlyUow {
    pub(crate) fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

impl KvRead for ReadOnlyUow {
    fn kv_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.store.read().get(key)
    }

    fn kv_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        self.store.read().prefix_scan(prefix)
    }
}

/// A writable unit-of-work staging one atomic batch.
pub struct WritableUow {
    store: SharedStore,
    cache: Arc<dyn FeedCache>,
    /// Staged writes: `Some` = put, `None` = delete.
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    /// `last_block_index` values to push into the cache after commit.
    block_index_touches: Vec<(FeedId, BlockIndex)>,
    /// Feeds whose cache entries must be dropped after commit.
    invalidations: Vec<FeedId>,
}

impl WritableUow {
    pub(crate) fn new(store: SharedStore, cache: Arc<dyn FeedCache>) -> Self {
        Self {
            store,
            cache,
            staged: BTreeMap::new(),
            block_index_touches: Vec::new(),
            invalidations: Vec::new(),
        }
    }

    fn stage<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<(), StorageError> {
        self.staged.insert(key, Some(encode(value)?));
        Ok(())
    }

    /// Create the envelope and group rows of a new group feed.
    pub fn create_group_feed(
        &mut self,
        feed: &Feed,
        group: &GroupFeed,
    ) -> Result<(), StorageError> {
        self.stage(keys::feed(feed.id), feed)?;
        self.stage(keys::group(group.id), group)
    }

    /// Create the envelope row of a personal or chat feed.
    pub fn create_feed(&mut self, feed: &Feed) -> Result<(), StorageError> {
        self.stage(keys::feed(feed.id), feed)
    }

    /// Replace a group row (title, description, soft delete, generation).
    pub fn put_group_feed(&mut self, group: &GroupFeed) -> Result<(), StorageError> {
        self.invalidations.push(group.id);
        self.stage(keys::group(group.id), group)
    }

    /// Insert or replace a participation row plus its membership index.
    pub fn put_participant(&mut self, participant: &Participant) -> Result<(), StorageError> {
        self.stage(
            keys::participant(participant.feed_id, &participant.address),
            participant,
        )?;
        self.staged.insert(
            keys::participant_index(&participant.address, participant.feed_id),
            Some(Vec::new()),
        );
        self.invalidations.push(participant.feed_id);
        Ok(())
    }

    /// Insert a new participation row. Fails if one already exists; rejoin
    /// goes through [`WritableUow::update_participant_rejoin`].
    pub fn add_participant(&mut self, participant: &Participant) -> Result<(), StorageError> {
        if self
            .get_participant_with_history(participant.feed_id, &participant.address)?
            .is_some()
        {
            return Err(StorageError::Database(format!(
                "participant {} already recorded for feed {}",
                participant.address, participant.feed_id
            )));
        }
        self.put_participant(participant)
    }

    /// Reactivate a previously recorded participant.
    pub fn update_participant_rejoin(
        &mut self,
        feed_id: FeedId,
        address: &Address,
        joined_at_block: BlockIndex,
    ) -> Result<(), StorageError> {
        let mut participant = self
            .get_participant_with_history(feed_id, address)?
            .ok_or_else(|| StorageError::NotFound(format!("participant {address}")))?;
        participant.role = ParticipantRole::Member;
        participant.joined_at_block = joined_at_block;
        participant.left_at_block = None;
        self.put_participant(&participant)
    }

    /// Change a participant's role in place.
    pub fn update_participant_type(
        &mut self,
        feed_id: FeedId,
        address: &Address,
        role: ParticipantRole,
    ) -> Result<(), StorageError> {
        let mut participant = self
            .get_participant_with_history(feed_id, address)?
            .ok_or_else(|| StorageError::NotFound(format!("participant {address}")))?;
        participant.role = role;
        self.put_participant(&participant)
    }

    /// Persist a key generation and all of its wrapped keys.
    pub fn create_key_rotation(
        &mut self,
        payload: &KeyRotationPayload,
    ) -> Result<(), StorageError> {
        let generation = KeyGeneration {
            feed_id: payload.feed_id,
            version: payload.new_version,
            valid_from_block: payload.valid_from_block,
            trigger: payload.trigger,
        };
        self.stage(
            keys::key_generation(payload.feed_id, payload.new_version),
            &generation,
        )?;
        for wrapped in &payload.wrapped {
            self.stage(
                keys::wrapped_key(wrapped.feed_id, wrapped.version, &wrapped.member_address),
                wrapped,
            )?;
        }
        self.invalidations.push(payload.feed_id);
        Ok(())
    }

    /// Advance `current_key_generation` on the group row.
    pub fn update_current_key_generation(
        &mut self,
        feed_id: FeedId,
        version: u32,
    ) -> Result<(), StorageError> {
        let mut group = self
            .get_group_feed(feed_id)?
            .ok_or_else(|| StorageError::NotFound(format!("group {feed_id}")))?;
        group.current_key_generation = version;
        self.stage(keys::group(feed_id), &group)
    }

    /// Advance a feed's `last_block_index` (monotonic: maximum wins).
    pub fn update_feed_block_index(
        &mut self,
        feed_id: FeedId,
        block_index: BlockIndex,
    ) -> Result<(), StorageError> {
        let mut feed = self
            .get_feed(feed_id)?
            .ok_or_else(|| StorageError::NotFound(format!("feed {feed_id}")))?;
        feed.last_block_index = feed.last_block_index.max(block_index);
        let effective = feed.last_block_index;
        self.stage(keys::feed(feed_id), &feed)?;
        self.block_index_touches.push((feed_id, effective));
        Ok(())
    }

    /// Append a message row plus its id locator.
    pub fn create_feed_message(&mut self, message: &EncryptedMessage) -> Result<(), StorageError> {
        self.stage(
            keys::message(message.feed_id, message.block_index, message.id),
            message,
        )?;
        let locator = MessageLocator {
            feed_id: message.feed_id,
            block_index: message.block_index,
        };
        self.stage(keys::message_locator(message.id), &locator)?;
        self.invalidations.push(message.feed_id);
        Ok(())
    }

    /// Persist attachment metadata and bytes.
    pub fn create_attachment(&mut self, attachment: &Attachment) -> Result<(), StorageError> {
        self.stage(keys::attachment(attachment.id), attachment)
    }

    /// Insert or update a read bookmark.
    pub fn upsert_read_position(&mut self, position: &ReadPosition) -> Result<(), StorageError> {
        self.stage(
            keys::read_position(&position.user_address, position.feed_id),
            position,
        )
    }

    /// Record that a canonical transaction has been applied.
    pub fn mark_transaction_applied(&mut self, id: TransactionId) -> Result<(), StorageError> {
        self.staged
            .insert(keys::applied_transaction(id), Some(Vec::new()));
        Ok(())
    }

    /// Number of staged row writes, for test assertions.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Commit all staged writes as one atomic batch, then push best-effort
    /// cache updates. Cache failures are logged and swallowed; they never
    /// fail the commit. Consuming `self` makes a double commit
    /// unrepresentable.
    pub fn commit(mut self) -> Result<(), StorageError> {
        let operations: Vec<BatchOperation> = std::mem::take(&mut self.staged)
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOperation::Put { key, value },
                None => BatchOperation::Delete { key },
            })
            .collect();
        self.store.write().atomic_batch_write(operations)?;

        for feed_id in self.invalidations.drain(..) {
            if let Err(err) = self.cache.invalidate_feed(feed_id) {
                warn!(%feed_id, %err, "Cache invalidation failed; continuing");
            }
        }
        for (feed_id, block_index) in self.block_index_touches.drain(..) {
            if let Err(err) = self.cache.put_last_block_index(feed_id, block_index) {
                warn!(%feed_id, %err, "Cache block-index update failed; continuing");
            }
        }
        Ok(())
    }
}

impl KvRead for WritableUow {
    fn kv_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        self.store.read().get(key)
    }

    fn kv_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .store
            .read()
            .prefix_scan(prefix)?
            .into_iter()
            .collect();
        for (key, value) in self
            .staged
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}
