//! # Test Utilities
//!
//! Fixture builders and fault-injecting adapters shared by unit tests here
//! and the workspace integration suite.

use crate::domain::errors::CacheError;
use crate::ports::cache::{CachedMessageTail, FeedCache};
use crate::service::FeedStorage;
use shared_types::{
    Address, BlockIndex, EncryptedMessage, Feed, FeedId, FeedKind, GroupFeed, MessageId,
    Participant, ParticipantRole, WrappedKey,
};

/// A cache whose every operation fails, for degraded-path tests.
#[derive(Default)]
pub struct FailingFeedCache;

impl FailingFeedCache {
    /// Create a new failing cache.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn fail<T>() -> Result<T, CacheError> {
        Err(CacheError::Unavailable("injected cache failure".into()))
    }
}

impl FeedCache for FailingFeedCache {
    fn last_block_index(&self, _feed_id: FeedId) -> Result<Option<BlockIndex>, CacheError> {
        Self::fail()
    }

    fn put_last_block_index(
        &self,
        _feed_id: FeedId,
        _block_index: BlockIndex,
    ) -> Result<(), CacheError> {
        Self::fail()
    }

    fn read_position(
        &self,
        _user: &Address,
        _feed_id: FeedId,
    ) -> Result<Option<BlockIndex>, CacheError> {
        Self::fail()
    }

    fn put_read_position(
        &self,
        _user: &Address,
        _feed_id: FeedId,
        _block_index: BlockIndex,
    ) -> Result<(), CacheError> {
        Self::fail()
    }

    fn message_tail(&self, _feed_id: FeedId) -> Result<Option<CachedMessageTail>, CacheError> {
        Self::fail()
    }

    fn put_message_tail(
        &self,
        _feed_id: FeedId,
        _tail: CachedMessageTail,
    ) -> Result<(), CacheError> {
        Self::fail()
    }

    fn wrapped_keys(
        &self,
        _feed_id: FeedId,
        _member: &Address,
    ) -> Result<Option<Vec<WrappedKey>>, CacheError> {
        Self::fail()
    }

    fn put_wrapped_keys(
        &self,
        _feed_id: FeedId,
        _member: &Address,
        _keys: Vec<WrappedKey>,
    ) -> Result<(), CacheError> {
        Self::fail()
    }

    fn invalidate_feed(&self, _feed_id: FeedId) -> Result<(), CacheError> {
        Self::fail()
    }
}

/// Create a committed group feed with the given members.
///
/// The first member should be the admin by convention; roles are taken
/// as given.
pub fn group_with_members(
    storage: &FeedStorage,
    feed_id: FeedId,
    members: &[(&str, ParticipantRole)],
) {
    let mut uow = storage.create_writable();
    uow.create_group_feed(
        &Feed {
            id: feed_id,
            kind: FeedKind::Group,
            created_at_block: 1,
            last_block_index: 1,
        },
        &GroupFeed {
            id: feed_id,
            title: "Tech Friends".into(),
            description: String::new(),
            is_public: false,
            current_key_generation: 0,
            is_deleted: false,
        },
    )
    .expect("stage group");
    for (address, role) in members {
        uow.put_participant(&Participant {
            feed_id,
            address: Address::new(*address),
            role: *role,
            joined_at_block: 1,
            left_at_block: None,
            last_leave_block: None,
        })
        .expect("stage participant");
    }
    uow.commit().expect("commit fixture");
}

/// A minimal message at a given block.
#[must_use]
pub fn message_at(feed_id: FeedId, block_index: BlockIndex) -> EncryptedMessage {
    EncryptedMessage {
        id: MessageId::generate(),
        feed_id,
        ciphertext: vec![0xEE; 16],
        sender_address: Address::new("mrrA1ice"),
        block_index,
        timestamp: block_index * 1_000,
        key_generation: 0,
        reply_to: None,
        author_commitment: None,
    }
}
