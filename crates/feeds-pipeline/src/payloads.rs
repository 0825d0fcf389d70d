//! # Transaction Payloads
//!
//! The complete set of payload kinds the feeds core recognizes, and the
//! typed payload bodies they carry. The tag travels with the payload so
//! dispatch never guesses.

use serde::{Deserialize, Serialize};
use shared_types::{Address, EncryptKey, FeedId, KeyRotationPayload, MessageId};

/// Stable identifier of a payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    /// Create a group feed with its initial participants.
    NewGroupFeed,
    /// Admin adds a member.
    AddMemberToGroupFeed,
    /// Self-join of a public group.
    JoinGroupFeed,
    /// Self-leave.
    LeaveGroupFeed,
    /// Admin bans a member.
    BanFromGroupFeed,
    /// Admin readmits a banned member.
    UnbanFromGroupFeed,
    /// Admin promotes a member to admin.
    PromoteToAdmin,
    /// Admin blocks a member (non-cryptographic mute).
    BlockMember,
    /// Admin unblocks a member.
    UnblockMember,
    /// Admin changes the title.
    UpdateGroupFeedTitle,
    /// Admin changes the description.
    UpdateGroupFeedDescription,
    /// Admin soft-deletes the group.
    DeleteGroupFeed,
    /// A key rotation arriving as a canonical transaction.
    GroupFeedKeyRotation,
    /// An encrypted message.
    NewGroupFeedMessage,
}

/// Body of a `NewGroupFeed` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroupFeed {
    /// Client-chosen feed id.
    pub feed_id: FeedId,
    /// Group title, 1..=100 chars non-whitespace.
    pub title: String,
    /// Group description, possibly empty.
    pub description: String,
    /// Whether members may self-join.
    pub is_public: bool,
    /// The creator; becomes the first admin.
    pub creator: Address,
    /// All initial participants, creator included.
    pub participants: Vec<Address>,
}

/// Body of an `AddMemberToGroupFeed` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMemberToGroupFeed {
    /// The group.
    pub feed_id: FeedId,
    /// The admin requesting the add.
    pub requester: Address,
    /// The member being added.
    pub member: Address,
    /// The new member's public encryption key, as declared on the wire.
    pub member_encrypt_key: EncryptKey,
}

/// Body of a membership transaction naming a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    /// The group.
    pub feed_id: FeedId,
    /// The admin requesting the change (equals the member for self ops).
    pub requester: Address,
    /// The member the change applies to.
    pub member: Address,
}

/// Body of an `UpdateGroupFeedTitle` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroupFeedTitle {
    /// The group.
    pub feed_id: FeedId,
    /// The requesting admin.
    pub requester: Address,
    /// New title.
    pub title: String,
}

/// Body of an `UpdateGroupFeedDescription` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroupFeedDescription {
    /// The group.
    pub feed_id: FeedId,
    /// The requesting admin.
    pub requester: Address,
    /// New description (may be empty).
    pub description: String,
}

/// Body of a `DeleteGroupFeed` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteGroupFeed {
    /// The group.
    pub feed_id: FeedId,
    /// The requesting admin.
    pub requester: Address,
}

/// Body of a `NewGroupFeedMessage` transaction. The sender is the
/// envelope signatory; the inclusion block is the envelope's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroupFeedMessage {
    /// The feed the message targets.
    pub feed_id: FeedId,
    /// Client-chosen message id.
    pub message_id: MessageId,
    /// Opaque encrypted body.
    pub ciphertext: Vec<u8>,
    /// Sender-declared wall-clock timestamp (milliseconds).
    pub timestamp: u64,
    /// Key generation the body was encrypted under.
    pub key_generation: u32,
    /// Message being replied to, if any.
    pub reply_to: Option<MessageId>,
    /// Sender commitment; exactly 32 bytes when present.
    pub author_commitment: Option<Vec<u8>>,
}

/// The typed payload of a feeds transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedPayload {
    /// See [`NewGroupFeed`].
    NewGroupFeed(NewGroupFeed),
    /// See [`AddMemberToGroupFeed`].
    AddMemberToGroupFeed(AddMemberToGroupFeed),
    /// Self-join of a public group.
    JoinGroupFeed(MembershipChange),
    /// Self-leave.
    LeaveGroupFeed(MembershipChange),
    /// Admin ban.
    BanFromGroupFeed(MembershipChange),
    /// Admin unban.
    UnbanFromGroupFeed(MembershipChange),
    /// Promote to admin.
    PromoteToAdmin(MembershipChange),
    /// Block (mute) a member.
    BlockMember(MembershipChange),
    /// Unblock a member.
    UnblockMember(MembershipChange),
    /// See [`UpdateGroupFeedTitle`].
    UpdateGroupFeedTitle(UpdateGroupFeedTitle),
    /// See [`UpdateGroupFeedDescription`].
    UpdateGroupFeedDescription(UpdateGroupFeedDescription),
    /// See [`DeleteGroupFeed`].
    DeleteGroupFeed(DeleteGroupFeed),
    /// A canonical key rotation.
    GroupFeedKeyRotation(KeyRotationPayload),
    /// See [`NewGroupFeedMessage`].
    NewGroupFeedMessage(NewGroupFeedMessage),
}

impl FeedPayload {
    /// The kind tag of this payload.
    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::NewGroupFeed(_) => PayloadKind::NewGroupFeed,
            Self::AddMemberToGroupFeed(_) => PayloadKind::AddMemberToGroupFeed,
            Self::JoinGroupFeed(_) => PayloadKind::JoinGroupFeed,
            Self::LeaveGroupFeed(_) => PayloadKind::LeaveGroupFeed,
            Self::BanFromGroupFeed(_) => PayloadKind::BanFromGroupFeed,
            Self::UnbanFromGroupFeed(_) => PayloadKind::UnbanFromGroupFeed,
            Self::PromoteToAdmin(_) => PayloadKind::PromoteToAdmin,
            Self::BlockMember(_) => PayloadKind::BlockMember,
            Self::UnblockMember(_) => PayloadKind::UnblockMember,
            Self::UpdateGroupFeedTitle(_) => PayloadKind::UpdateGroupFeedTitle,
            Self::UpdateGroupFeedDescription(_) => PayloadKind::UpdateGroupFeedDescription,
            Self::DeleteGroupFeed(_) => PayloadKind::DeleteGroupFeed,
            Self::GroupFeedKeyRotation(_) => PayloadKind::GroupFeedKeyRotation,
            Self::NewGroupFeedMessage(_) => PayloadKind::NewGroupFeedMessage,
        }
    }

    /// The feed the payload targets.
    #[must_use]
    pub fn feed_id(&self) -> FeedId {
        match self {
            Self::NewGroupFeed(p) => p.feed_id,
            Self::AddMemberToGroupFeed(p) => p.feed_id,
            Self::JoinGroupFeed(p)
            | Self::LeaveGroupFeed(p)
            | Self::BanFromGroupFeed(p)
            | Self::UnbanFromGroupFeed(p)
            | Self::PromoteToAdmin(p)
            | Self::BlockMember(p)
            | Self::UnblockMember(p) => p.feed_id,
            Self::UpdateGroupFeedTitle(p) => p.feed_id,
            Self::UpdateGroupFeedDescription(p) => p.feed_id,
            Self::DeleteGroupFeed(p) => p.feed_id,
            Self::GroupFeedKeyRotation(p) => p.feed_id,
            Self::NewGroupFeedMessage(p) => p.feed_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_stable() {
        let payload = FeedPayload::DeleteGroupFeed(DeleteGroupFeed {
            feed_id: FeedId::generate(),
            requester: Address::new("mrrA1ice"),
        });
        assert_eq!(payload.kind(), PayloadKind::DeleteGroupFeed);
    }

    #[test]
    fn test_feed_id_extraction() {
        let feed_id = FeedId::generate();
        let payload = FeedPayload::JoinGroupFeed(MembershipChange {
            feed_id,
            requester: Address::new("mrrB0b"),
            member: Address::new("mrrB0b"),
        });
        assert_eq!(payload.feed_id(), feed_id);
    }

    #[test]
    fn test_payload_serde_roundtrip() {
        let payload = FeedPayload::NewGroupFeedMessage(NewGroupFeedMessage {
            feed_id: FeedId::generate(),
            message_id: MessageId::generate(),
            ciphertext: vec![1, 2, 3],
            timestamp: 1_700_000_000_000,
            key_generation: 4,
            reply_to: None,
            author_commitment: Some(vec![0u8; 32]),
        });
        let bytes = bincode::serialize(&payload).unwrap();
        let back: FeedPayload = bincode::deserialize(&bytes).unwrap();
        assert_eq!(payload, back);
    }
}
