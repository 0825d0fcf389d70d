//! # Feed Events
//!
//! Defines all events that flow through the shared bus. Every event names
//! the feed it belongs to and the block that caused it, so subscribers can
//! order and deduplicate replays.

use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockIndex, FeedId, FeedKind, MessageId, ParticipantRole, RotationTrigger};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeedEvent {
    /// A feed came into existence.
    FeedCreated {
        /// The new feed.
        feed_id: FeedId,
        /// What kind of surface it is.
        feed_kind: FeedKind,
        /// Initial participants (creator first).
        participants: Vec<Address>,
        /// Block that created the feed.
        block_index: BlockIndex,
    },

    /// A message was appended to a feed.
    NewMessageCreated {
        /// The feed the message landed in.
        feed_id: FeedId,
        /// The message.
        message_id: MessageId,
        /// Who sent it.
        sender: Address,
        /// Block that included it.
        block_index: BlockIndex,
    },

    /// A member joined or was added to a group.
    MemberAdded {
        /// The group.
        feed_id: FeedId,
        /// Who was added.
        address: Address,
        /// Block of the membership change.
        block_index: BlockIndex,
    },

    /// A member left a group.
    MemberRemoved {
        /// The group.
        feed_id: FeedId,
        /// Who left.
        address: Address,
        /// Block of the membership change.
        block_index: BlockIndex,
    },

    /// A member was banned from a group.
    MemberBanned {
        /// The group.
        feed_id: FeedId,
        /// Who was banned.
        address: Address,
        /// Block of the ban.
        block_index: BlockIndex,
    },

    /// A banned member was readmitted.
    MemberUnbanned {
        /// The group.
        feed_id: FeedId,
        /// Who was readmitted.
        address: Address,
        /// Block of the unban.
        block_index: BlockIndex,
    },

    /// A member's role changed without a membership change (promote,
    /// block, unblock).
    MemberRoleChanged {
        /// The group.
        feed_id: FeedId,
        /// Whose role changed.
        address: Address,
        /// The new role.
        role: ParticipantRole,
        /// Block of the change.
        block_index: BlockIndex,
    },

    /// A new key generation was issued for a group.
    KeyRotated {
        /// The group.
        feed_id: FeedId,
        /// The new generation version.
        version: u32,
        /// Why the rotation happened.
        trigger: RotationTrigger,
        /// First block the generation is valid from.
        valid_from_block: BlockIndex,
    },

    /// Group title or description changed.
    GroupMetadataUpdated {
        /// The group.
        feed_id: FeedId,
        /// Block of the change.
        block_index: BlockIndex,
    },

    /// A group was soft-deleted.
    GroupDeleted {
        /// The group.
        feed_id: FeedId,
        /// Block of the deletion.
        block_index: BlockIndex,
    },
}

impl FeedEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::FeedCreated { .. } | Self::GroupMetadataUpdated { .. } | Self::GroupDeleted { .. } => {
                EventTopic::Lifecycle
            }
            Self::NewMessageCreated { .. } => EventTopic::Messages,
            Self::MemberAdded { .. }
            | Self::MemberRemoved { .. }
            | Self::MemberBanned { .. }
            | Self::MemberUnbanned { .. }
            | Self::MemberRoleChanged { .. } => EventTopic::Membership,
            Self::KeyRotated { .. } => EventTopic::Keys,
        }
    }

    /// The feed this event belongs to.
    #[must_use]
    pub fn feed_id(&self) -> FeedId {
        match self {
            Self::FeedCreated { feed_id, .. }
            | Self::NewMessageCreated { feed_id, .. }
            | Self::MemberAdded { feed_id, .. }
            | Self::MemberRemoved { feed_id, .. }
            | Self::MemberBanned { feed_id, .. }
            | Self::MemberUnbanned { feed_id, .. }
            | Self::MemberRoleChanged { feed_id, .. }
            | Self::KeyRotated { feed_id, .. }
            | Self::GroupMetadataUpdated { feed_id, .. }
            | Self::GroupDeleted { feed_id, .. } => *feed_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Feed creation, metadata updates, deletion.
    Lifecycle,
    /// New encrypted messages.
    Messages,
    /// Joins, leaves, bans, role changes.
    Membership,
    /// Key rotations.
    Keys,
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to receive. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Restrict to a single feed, when set.
    pub feed_id: Option<FeedId>,
}

impl EventFilter {
    /// Match every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Match only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            feed_id: None,
        }
    }

    /// Match only events of a single feed.
    #[must_use]
    pub fn feed(feed_id: FeedId) -> Self {
        Self {
            topics: Vec::new(),
            feed_id: Some(feed_id),
        }
    }

    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &FeedEvent) -> bool {
        let topic_ok = self.topics.is_empty() || self.topics.contains(&event.topic());
        let feed_ok = self.feed_id.map_or(true, |id| id == event.feed_id());
        topic_ok && feed_ok
    }
}
