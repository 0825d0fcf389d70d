//! # Transaction Handlers
//!
//! One state mutator per payload kind. Each opens a writable unit-of-work,
//! applies its effect (membership mutation strictly before key rotation,
//! so the rotation sees the post-mutation member set), commits once, and
//! publishes events only after the commit.
//!
//! A rotation failure aborts the unit-of-work: the membership change rolls
//! back and the feed's `last_block_index` is not advanced.

use crate::handlers::{expect_payload, HandlerDeps, TransactionHandler};
use crate::payloads::{FeedPayload, PayloadKind};
use async_trait::async_trait;
use feeds_storage::FeedReads;
use shared_bus::FeedEvent;
use shared_types::{
    EncryptedMessage, Feed, FeedError, FeedKind, GroupFeed, Participant, ParticipantRole,
    RotationTrigger, ValidatedTransaction,
};
use std::sync::Arc;
use tracing::info;

type Tx = ValidatedTransaction<FeedPayload>;

/// Applies `NewGroupFeed`: feed + group rows, participants, generation 0.
pub struct NewGroupFeedApply {
    deps: Arc<HandlerDeps>,
}

impl NewGroupFeedApply {
    /// Build over the shared dependencies.
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TransactionHandler for NewGroupFeedApply {
    fn kind(&self) -> PayloadKind {
        PayloadKind::NewGroupFeed
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = expect_payload!(&tx.inner.payload, NewGroupFeed);
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        uow.create_group_feed(
            &Feed {
                id: p.feed_id,
                kind: FeedKind::Group,
                created_at_block: now,
                last_block_index: now,
            },
            &GroupFeed {
                id: p.feed_id,
                title: p.title.clone(),
                description: p.description.clone(),
                is_public: p.is_public,
                current_key_generation: 0,
                is_deleted: false,
            },
        )
        .map_err(FeedError::from)?;

        for address in &p.participants {
            let role = if address == &p.creator {
                ParticipantRole::Admin
            } else {
                ParticipantRole::Member
            };
            uow.add_participant(&Participant {
                feed_id: p.feed_id,
                address: address.clone(),
                role,
                joined_at_block: now,
                left_at_block: None,
                last_leave_block: None,
            })
            .map_err(FeedError::from)?;
        }

        self.deps
            .rotation
            .initial_generation(&mut uow, p.feed_id, now)
            .map_err(FeedError::from)?;

        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(feed_id = %p.feed_id, participants = p.participants.len(), "Group feed created");
        self.deps
            .bus
            .publish(FeedEvent::FeedCreated {
                feed_id: p.feed_id,
                feed_kind: FeedKind::Group,
                participants: p.participants.clone(),
                block_index: now,
            })
            .await;
        Ok(())
    }
}

/// Applies `AddMemberToGroupFeed` and `JoinGroupFeed`: insert or
/// reactivate, then rotate with `Join`.
pub struct MemberJoinApply {
    deps: Arc<HandlerDeps>,
    kind: PayloadKind,
}

impl MemberJoinApply {
    /// The admin-add variant.
    pub fn add_member(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            kind: PayloadKind::AddMemberToGroupFeed,
        }
    }

    /// The self-join variant.
    pub fn self_join(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            kind: PayloadKind::JoinGroupFeed,
        }
    }
}

#[async_trait]
impl TransactionHandler for MemberJoinApply {
    fn kind(&self) -> PayloadKind {
        self.kind
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let (feed_id, member) = match &tx.inner.payload {
            FeedPayload::AddMemberToGroupFeed(p) => (p.feed_id, p.member.clone()),
            FeedPayload::JoinGroupFeed(p) => (p.feed_id, p.member.clone()),
            other => {
                return Err(FeedError::InvalidArgument(format!(
                    "expected a join payload, got {:?}",
                    other.kind()
                )))
            }
        };
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        let existing = uow
            .get_participant_with_history(feed_id, &member)
            .map_err(FeedError::from)?;
        if existing.is_some() {
            uow.update_participant_rejoin(feed_id, &member, now)
                .map_err(FeedError::from)?;
        } else {
            uow.add_participant(&Participant {
                feed_id,
                address: member.clone(),
                role: ParticipantRole::Member,
                joined_at_block: now,
                left_at_block: None,
                last_leave_block: None,
            })
            .map_err(FeedError::from)?;
        }

        // The new member is already staged, but pass the joining delta so
        // the rotation is explicit about why it includes them.
        let rotation = self
            .deps
            .rotation
            .trigger_rotation(
                &mut uow,
                feed_id,
                RotationTrigger::Join,
                now,
                Some(&member),
                None,
            )
            .map_err(FeedError::from)?;

        uow.update_feed_block_index(feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(%feed_id, %member, version = rotation.new_version, "Member joined");
        self.deps
            .bus
            .publish(FeedEvent::MemberAdded {
                feed_id,
                address: member,
                block_index: now,
            })
            .await;
        self.deps
            .bus
            .publish(FeedEvent::KeyRotated {
                feed_id,
                version: rotation.new_version,
                trigger: RotationTrigger::Join,
                valid_from_block: now,
            })
            .await;
        Ok(())
    }
}

/// Applies `LeaveGroupFeed`: mark left, rotate with `Leave`, soft-delete
/// the group when the last admin walks out.
pub struct LeaveGroupFeedApply {
    deps: Arc<HandlerDeps>,
}

impl LeaveGroupFeedApply {
    /// Build over the shared dependencies.
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TransactionHandler for LeaveGroupFeedApply {
    fn kind(&self) -> PayloadKind {
        PayloadKind::LeaveGroupFeed
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = expect_payload!(&tx.inner.payload, LeaveGroupFeed);
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        let mut participant = uow
            .get_participant_with_history(p.feed_id, &p.member)
            .map_err(FeedError::from)?
            .ok_or_else(|| FeedError::NotFound(format!("participant {}", p.member)))?;
        let was_admin = participant.role == ParticipantRole::Admin;
        participant.left_at_block = Some(now);
        participant.last_leave_block = Some(now);
        uow.put_participant(&participant).map_err(FeedError::from)?;

        let remaining = uow
            .get_active_group_member_addresses(p.feed_id)
            .map_err(FeedError::from)?;
        let mut rotation = None;
        if !remaining.is_empty() {
            rotation = Some(
                self.deps
                    .rotation
                    .trigger_rotation(
                        &mut uow,
                        p.feed_id,
                        RotationTrigger::Leave,
                        now,
                        None,
                        Some(&p.member),
                    )
                    .map_err(FeedError::from)?,
            );
        }

        let admins_remain = uow
            .get_participants(p.feed_id)
            .map_err(FeedError::from)?
            .iter()
            .any(|m| m.is_active() && m.role == ParticipantRole::Admin);
        let mut deleted = false;
        if was_admin && !admins_remain {
            let mut group = uow
                .get_group_feed(p.feed_id)
                .map_err(FeedError::from)?
                .ok_or_else(|| FeedError::NotFound(format!("group {}", p.feed_id)))?;
            group.is_deleted = true;
            uow.put_group_feed(&group).map_err(FeedError::from)?;
            deleted = true;
        }

        uow.update_feed_block_index(p.feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(feed_id = %p.feed_id, member = %p.member, deleted, "Member left");
        self.deps
            .bus
            .publish(FeedEvent::MemberRemoved {
                feed_id: p.feed_id,
                address: p.member.clone(),
                block_index: now,
            })
            .await;
        if let Some(rotation) = rotation {
            self.deps
                .bus
                .publish(FeedEvent::KeyRotated {
                    feed_id: p.feed_id,
                    version: rotation.new_version,
                    trigger: RotationTrigger::Leave,
                    valid_from_block: now,
                })
                .await;
        }
        if deleted {
            self.deps
                .bus
                .publish(FeedEvent::GroupDeleted {
                    feed_id: p.feed_id,
                    block_index: now,
                })
                .await;
        }
        Ok(())
    }
}

/// Applies `BanFromGroupFeed`: mark banned and excluded, rotate with `Ban`.
pub struct BanFromGroupFeedApply {
    deps: Arc<HandlerDeps>,
}

impl BanFromGroupFeedApply {
    /// Build over the shared dependencies.
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TransactionHandler for BanFromGroupFeedApply {
    fn kind(&self) -> PayloadKind {
        PayloadKind::BanFromGroupFeed
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = expect_payload!(&tx.inner.payload, BanFromGroupFeed);
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        let mut participant = uow
            .get_participant_with_history(p.feed_id, &p.member)
            .map_err(FeedError::from)?
            .ok_or_else(|| FeedError::NotFound(format!("participant {}", p.member)))?;
        participant.role = ParticipantRole::Banned;
        participant.left_at_block = Some(now);
        uow.put_participant(&participant).map_err(FeedError::from)?;

        let rotation = self
            .deps
            .rotation
            .trigger_rotation(
                &mut uow,
                p.feed_id,
                RotationTrigger::Ban,
                now,
                None,
                Some(&p.member),
            )
            .map_err(FeedError::from)?;

        uow.update_feed_block_index(p.feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(feed_id = %p.feed_id, member = %p.member, version = rotation.new_version, "Member banned");
        self.deps
            .bus
            .publish(FeedEvent::MemberBanned {
                feed_id: p.feed_id,
                address: p.member.clone(),
                block_index: now,
            })
            .await;
        self.deps
            .bus
            .publish(FeedEvent::KeyRotated {
                feed_id: p.feed_id,
                version: rotation.new_version,
                trigger: RotationTrigger::Ban,
                valid_from_block: now,
            })
            .await;
        Ok(())
    }
}

/// Applies `UnbanFromGroupFeed`: readmit as member, rotate with `Unban`.
pub struct UnbanFromGroupFeedApply {
    deps: Arc<HandlerDeps>,
}

impl UnbanFromGroupFeedApply {
    /// Build over the shared dependencies.
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TransactionHandler for UnbanFromGroupFeedApply {
    fn kind(&self) -> PayloadKind {
        PayloadKind::UnbanFromGroupFeed
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = expect_payload!(&tx.inner.payload, UnbanFromGroupFeed);
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        let mut participant = uow
            .get_participant_with_history(p.feed_id, &p.member)
            .map_err(FeedError::from)?
            .ok_or_else(|| FeedError::NotFound(format!("participant {}", p.member)))?;
        participant.role = ParticipantRole::Member;
        participant.left_at_block = None;
        participant.joined_at_block = now;
        uow.put_participant(&participant).map_err(FeedError::from)?;

        let rotation = self
            .deps
            .rotation
            .trigger_rotation(
                &mut uow,
                p.feed_id,
                RotationTrigger::Unban,
                now,
                Some(&p.member),
                None,
            )
            .map_err(FeedError::from)?;

        uow.update_feed_block_index(p.feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(feed_id = %p.feed_id, member = %p.member, version = rotation.new_version, "Member unbanned");
        self.deps
            .bus
            .publish(FeedEvent::MemberUnbanned {
                feed_id: p.feed_id,
                address: p.member.clone(),
                block_index: now,
            })
            .await;
        self.deps
            .bus
            .publish(FeedEvent::KeyRotated {
                feed_id: p.feed_id,
                version: rotation.new_version,
                trigger: RotationTrigger::Unban,
                valid_from_block: now,
            })
            .await;
        Ok(())
    }
}

/// Applies the three pure role changes: promote, block, unblock.
pub struct RoleChangeApply {
    deps: Arc<HandlerDeps>,
    kind: PayloadKind,
    role: ParticipantRole,
}

impl RoleChangeApply {
    /// Promote a member to admin.
    pub fn promote(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            kind: PayloadKind::PromoteToAdmin,
            role: ParticipantRole::Admin,
        }
    }

    /// Block (mute) a member; keys are unchanged.
    pub fn block(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            kind: PayloadKind::BlockMember,
            role: ParticipantRole::Blocked,
        }
    }

    /// Unblock a member.
    pub fn unblock(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            kind: PayloadKind::UnblockMember,
            role: ParticipantRole::Member,
        }
    }
}

#[async_trait]
impl TransactionHandler for RoleChangeApply {
    fn kind(&self) -> PayloadKind {
        self.kind
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = match &tx.inner.payload {
            FeedPayload::PromoteToAdmin(p)
            | FeedPayload::BlockMember(p)
            | FeedPayload::UnblockMember(p) => p,
            other => {
                return Err(FeedError::InvalidArgument(format!(
                    "expected a role-change payload, got {:?}",
                    other.kind()
                )))
            }
        };
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        uow.update_participant_type(p.feed_id, &p.member, self.role)
            .map_err(FeedError::from)?;
        uow.update_feed_block_index(p.feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(feed_id = %p.feed_id, member = %p.member, role = ?self.role, "Role changed");
        self.deps
            .bus
            .publish(FeedEvent::MemberRoleChanged {
                feed_id: p.feed_id,
                address: p.member.clone(),
                role: self.role,
                block_index: now,
            })
            .await;
        Ok(())
    }
}

/// Applies title and description updates.
pub struct MetadataUpdateApply {
    deps: Arc<HandlerDeps>,
    kind: PayloadKind,
}

impl MetadataUpdateApply {
    /// The title variant.
    pub fn title(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            kind: PayloadKind::UpdateGroupFeedTitle,
        }
    }

    /// The description variant.
    pub fn description(deps: Arc<HandlerDeps>) -> Self {
        Self {
            deps,
            kind: PayloadKind::UpdateGroupFeedDescription,
        }
    }
}

#[async_trait]
impl TransactionHandler for MetadataUpdateApply {
    fn kind(&self) -> PayloadKind {
        self.kind
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let now = tx.block_index();
        let mut uow = self.deps.storage.create_writable();

        let feed_id = match &tx.inner.payload {
            FeedPayload::UpdateGroupFeedTitle(p) => {
                let mut group = uow
                    .get_group_feed(p.feed_id)
                    .map_err(FeedError::from)?
                    .ok_or_else(|| FeedError::NotFound(format!("group {}", p.feed_id)))?;
                group.title = p.title.clone();
                uow.put_group_feed(&group).map_err(FeedError::from)?;
                p.feed_id
            }
            FeedPayload::UpdateGroupFeedDescription(p) => {
                let mut group = uow
                    .get_group_feed(p.feed_id)
                    .map_err(FeedError::from)?
                    .ok_or_else(|| FeedError::NotFound(format!("group {}", p.feed_id)))?;
                group.description = p.description.clone();
                uow.put_group_feed(&group).map_err(FeedError::from)?;
                p.feed_id
            }
            other => {
                return Err(FeedError::InvalidArgument(format!(
                    "expected a metadata payload, got {:?}",
                    other.kind()
                )))
            }
        };

        uow.update_feed_block_index(feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        self.deps
            .bus
            .publish(FeedEvent::GroupMetadataUpdated {
                feed_id,
                block_index: now,
            })
            .await;
        Ok(())
    }
}

/// Applies `DeleteGroupFeed` (soft delete).
pub struct DeleteGroupFeedApply {
    deps: Arc<HandlerDeps>,
}

impl DeleteGroupFeedApply {
    /// Build over the shared dependencies.
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TransactionHandler for DeleteGroupFeedApply {
    fn kind(&self) -> PayloadKind {
        PayloadKind::DeleteGroupFeed
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = expect_payload!(&tx.inner.payload, DeleteGroupFeed);
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        let mut group = uow
            .get_group_feed(p.feed_id)
            .map_err(FeedError::from)?
            .ok_or_else(|| FeedError::NotFound(format!("group {}", p.feed_id)))?;
        group.is_deleted = true;
        uow.put_group_feed(&group).map_err(FeedError::from)?;
        uow.update_feed_block_index(p.feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(feed_id = %p.feed_id, "Group soft-deleted");
        self.deps
            .bus
            .publish(FeedEvent::GroupDeleted {
                feed_id: p.feed_id,
                block_index: now,
            })
            .await;
        Ok(())
    }
}

/// Applies a canonical `GroupFeedKeyRotation` produced elsewhere.
pub struct GroupFeedKeyRotationApply {
    deps: Arc<HandlerDeps>,
}

impl GroupFeedKeyRotationApply {
    /// Build over the shared dependencies.
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TransactionHandler for GroupFeedKeyRotationApply {
    fn kind(&self) -> PayloadKind {
        PayloadKind::GroupFeedKeyRotation
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = expect_payload!(&tx.inner.payload, GroupFeedKeyRotation);
        let now = tx.block_index();

        let mut uow = self.deps.storage.create_writable();
        let current = uow
            .get_max_key_generation(p.feed_id)
            .map_err(FeedError::from)?
            .ok_or_else(|| FeedError::NotFound(format!("group {}", p.feed_id)))?;
        if p.previous_version != current {
            return Err(FeedError::FailedPrecondition(format!(
                "rotation expects generation {}, group is at {}",
                p.previous_version, current
            )));
        }

        uow.create_key_rotation(p).map_err(FeedError::from)?;
        uow.update_current_key_generation(p.feed_id, p.new_version)
            .map_err(FeedError::from)?;
        uow.update_feed_block_index(p.feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        info!(feed_id = %p.feed_id, version = p.new_version, "Canonical rotation applied");
        self.deps
            .bus
            .publish(FeedEvent::KeyRotated {
                feed_id: p.feed_id,
                version: p.new_version,
                trigger: p.trigger,
                valid_from_block: p.valid_from_block,
            })
            .await;
        Ok(())
    }
}

/// Applies `NewGroupFeedMessage`.
pub struct NewGroupFeedMessageApply {
    deps: Arc<HandlerDeps>,
}

impl NewGroupFeedMessageApply {
    /// Build over the shared dependencies.
    pub fn new(deps: Arc<HandlerDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl TransactionHandler for NewGroupFeedMessageApply {
    fn kind(&self) -> PayloadKind {
        PayloadKind::NewGroupFeedMessage
    }

    async fn handle(&self, tx: &Tx) -> Result<(), FeedError> {
        let p = expect_payload!(&tx.inner.payload, NewGroupFeedMessage);
        let now = tx.block_index();

        let message = EncryptedMessage {
            id: p.message_id,
            feed_id: p.feed_id,
            ciphertext: p.ciphertext.clone(),
            sender_address: tx.signatory().clone(),
            block_index: now,
            timestamp: p.timestamp,
            key_generation: p.key_generation,
            reply_to: p.reply_to,
            author_commitment: p.author_commitment.clone(),
        };

        let mut uow = self.deps.storage.create_writable();
        uow.create_feed_message(&message).map_err(FeedError::from)?;
        uow.update_feed_block_index(p.feed_id, now)
            .map_err(FeedError::from)?;
        uow.mark_transaction_applied(tx.id()).map_err(FeedError::from)?;
        uow.commit().map_err(FeedError::from)?;

        self.deps
            .bus
            .publish(FeedEvent::NewMessageCreated {
                feed_id: p.feed_id,
                message_id: p.message_id,
                sender: message.sender_address,
                block_index: now,
            })
            .await;
        Ok(())
    }
}
