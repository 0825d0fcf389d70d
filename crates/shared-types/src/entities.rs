//! # Core Domain Entities
//!
//! Defines the replicated-state entities of the feeds core.
//!
//! ## Clusters
//!
//! - **Feeds**: `Feed`, `GroupFeed`, `Participant`
//! - **Keys**: `KeyGeneration`, `WrappedKey`, `KeyRotationPayload`
//! - **Messages**: `EncryptedMessage`, `Attachment`, `ReadPosition`
//!
//! Entities are created by the transaction handler that applies the
//! originating transaction and mutated only by later handlers of the same
//! feed. Groups are soft-deleted via `is_deleted`; nothing is hard-deleted.

use crate::ids::{Address, BlockIndex, FeedId, MessageId};
use serde::{Deserialize, Serialize};

/// The kind of conversation surface a feed represents.
///
/// Wire codes: 1 = Personal, 2 = Chat, 3 = Group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKind {
    /// One owner writing to themselves (notes, sync between devices).
    Personal,
    /// Exactly two parties.
    Chat,
    /// N parties with admin governance.
    Group,
}

impl FeedKind {
    /// The numeric wire code for this kind.
    #[must_use]
    pub fn wire_code(self) -> u32 {
        match self {
            FeedKind::Personal => 1,
            FeedKind::Chat => 2,
            FeedKind::Group => 3,
        }
    }
}

/// Shared envelope for every conversation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Feed identity.
    pub id: FeedId,
    /// What kind of surface this is.
    pub kind: FeedKind,
    /// Block that created the feed.
    pub created_at_block: BlockIndex,
    /// Latest block that touched this feed (any transaction for it).
    /// Monotonic non-decreasing; governs client-visible ordering.
    pub last_block_index: BlockIndex,
}

/// Group-specific state extending [`Feed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFeed {
    /// Feed identity (same id as the `Feed` row).
    pub id: FeedId,
    /// Group title, 1..=100 chars, non-whitespace.
    pub title: String,
    /// Group description, possibly empty.
    pub description: String,
    /// Whether members may self-join.
    pub is_public: bool,
    /// The highest key-generation version issued for this group.
    pub current_key_generation: u32,
    /// Soft-delete flag. Deleted groups reject all mutations.
    pub is_deleted: bool,
}

/// Role of a participant within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantRole {
    /// May perform governance actions.
    Admin,
    /// Regular member.
    Member,
    /// May read but not send; keys unchanged (non-cryptographic).
    Blocked,
    /// Cryptographically excluded; may not rejoin until unbanned.
    Banned,
}

/// One participation row per `(feed_id, address)`.
///
/// Participation is reused on rejoin, never duplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// The group this participation belongs to.
    pub feed_id: FeedId,
    /// The member's signing identity.
    pub address: Address,
    /// Current role.
    pub role: ParticipantRole,
    /// Block at which the member (most recently) joined.
    pub joined_at_block: BlockIndex,
    /// Set when the member leaves or is banned; `None` iff currently active.
    pub left_at_block: Option<BlockIndex>,
    /// Block of the most recent self-leave, for the rejoin cooldown.
    pub last_leave_block: Option<BlockIndex>,
}

impl Participant {
    /// True while the participant holds current group keys.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.left_at_block.is_none()
    }

    /// True for active participants that may send messages.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.is_active()
            && !matches!(
                self.role,
                ParticipantRole::Blocked | ParticipantRole::Banned
            )
    }
}

/// The causal reason for a key rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationTrigger {
    /// A member joined or was added.
    Join,
    /// A member left.
    Leave,
    /// A member was banned.
    Ban,
    /// A banned member was readmitted.
    Unban,
    /// Operator-initiated rotation.
    Manual,
}

/// One key generation of a group: a distinct symmetric group key,
/// identified by a dense, monotonically advancing version.
///
/// Version 0 is created with the group. The wrapped per-member copies are
/// stored as separate [`WrappedKey`] rows keyed `(feed_id, version, member)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGeneration {
    /// The group this generation belongs to.
    pub feed_id: FeedId,
    /// Dense version number, starting at 0.
    pub version: u32,
    /// First block at which messages under this generation are valid.
    pub valid_from_block: BlockIndex,
    /// Why this generation was issued.
    pub trigger: RotationTrigger,
}

/// The group symmetric key encrypted for one member under that member's
/// public encryption key (ECIES).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// The group.
    pub feed_id: FeedId,
    /// The key generation this wraps.
    pub version: u32,
    /// Whose copy this is.
    pub member_address: Address,
    /// ECIES ciphertext: `ephemeral_pub(65) || nonce(12) || ct || tag(16)`.
    pub ciphertext: Vec<u8>,
}

/// The composed output of one successful key rotation, persisted atomically
/// and usable as the body of a `GroupFeedKeyRotation` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRotationPayload {
    /// The group that rotated.
    pub feed_id: FeedId,
    /// The version this rotation issued (`previous_version + 1`).
    pub new_version: u32,
    /// The version observed before rotating.
    pub previous_version: u32,
    /// Block at which the new generation becomes valid.
    pub valid_from_block: BlockIndex,
    /// Why the rotation happened.
    pub trigger: RotationTrigger,
    /// Exactly one wrapped key per member active after the rotation.
    pub wrapped: Vec<WrappedKey>,
}

/// An end-to-end encrypted message. The ciphertext is opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    /// Message identity.
    pub id: MessageId,
    /// The feed the message belongs to.
    pub feed_id: FeedId,
    /// Opaque encrypted body.
    pub ciphertext: Vec<u8>,
    /// Sender identity.
    pub sender_address: Address,
    /// Block that included the message.
    pub block_index: BlockIndex,
    /// Sender-declared wall-clock timestamp (milliseconds).
    pub timestamp: u64,
    /// Key generation the body was encrypted under.
    pub key_generation: u32,
    /// Message being replied to, if any.
    pub reply_to: Option<MessageId>,
    /// Sender commitment; exactly 32 bytes when present.
    pub author_commitment: Option<Vec<u8>>,
}

/// Metadata and encrypted bytes of a message attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment identity.
    pub id: MessageId,
    /// The message this attachment belongs to.
    pub feed_message_id: MessageId,
    /// Encrypted original bytes.
    pub encrypted_original: Vec<u8>,
    /// Encrypted thumbnail bytes, when one exists.
    pub encrypted_thumbnail: Option<Vec<u8>>,
    /// Declared MIME type.
    pub mime_type: String,
    /// Declared file name.
    pub file_name: String,
    /// Hash of the (plaintext) content, client-computed.
    pub content_hash: String,
    /// Size of the original in bytes.
    pub original_size: u64,
    /// Size of the thumbnail in bytes (0 when absent).
    pub thumbnail_size: u64,
    /// Wall-clock creation time (milliseconds).
    pub created_at: u64,
}

/// Per-user bookmark of the last read block in a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPosition {
    /// Whose bookmark.
    pub user_address: Address,
    /// Which feed.
    pub feed_id: FeedId,
    /// Last block index the user has read up to.
    pub last_read_block_index: BlockIndex,
}
