//! # Content Handlers
//!
//! One pure validator per payload kind. Each reads only from the
//! read-only view and the inclusion block, and on success countersigns
//! the transaction. None of them writes state.

use crate::handlers::rules;
use crate::handlers::{expect_payload, ContentHandler, ValidationContext};
use crate::payloads::{FeedPayload, PayloadKind};
use feeds_storage::FeedReads;
use shared_types::{
    FeedError, ParticipantRole, SignedTransaction, ValidatedTransaction,
};

/// Validates `NewGroupFeed`.
pub struct NewGroupFeedContent;

impl ContentHandler for NewGroupFeedContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::NewGroupFeed
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, NewGroupFeed);
        if p.feed_id.is_nil() {
            return Err(FeedError::InvalidArgument("feed id must be set".into()));
        }
        rules::valid_title(&p.title)?;
        if p.participants.is_empty() {
            return Err(FeedError::InvalidArgument(
                "a group needs at least one participant".into(),
            ));
        }
        rules::unique_non_blank(&p.participants)?;
        if !p.participants.contains(&p.creator) {
            return Err(FeedError::InvalidArgument(
                "creator must be among the participants".into(),
            ));
        }
        rules::require_signatory(&tx.signatory, &p.creator)?;
        if ctx.reader.get_feed(p.feed_id).map_err(FeedError::from)?.is_some() {
            return Err(FeedError::Conflict(format!(
                "feed {} already exists",
                p.feed_id
            )));
        }
        ctx.stamp(tx)
    }
}

/// Validates `AddMemberToGroupFeed`.
pub struct AddMemberContent;

impl ContentHandler for AddMemberContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::AddMemberToGroupFeed
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, AddMemberToGroupFeed);
        rules::require_live_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        if p.member.is_blank() {
            return Err(FeedError::InvalidArgument(
                "member address must not be blank".into(),
            ));
        }
        if p.member_encrypt_key.is_blank() {
            return Err(FeedError::InvalidArgument(
                "member encryption key must not be blank".into(),
            ));
        }
        // An admin add bypasses the rejoin cooldown; only the target's
        // current state matters.
        if let Some(existing) = ctx
            .reader
            .get_participant_with_history(p.feed_id, &p.member)
            .map_err(FeedError::from)?
        {
            if existing.is_active() {
                return Err(FeedError::FailedPrecondition(format!(
                    "{} is already a member",
                    p.member
                )));
            }
            if existing.role == ParticipantRole::Banned {
                return Err(FeedError::FailedPrecondition(format!(
                    "{} is banned; unban first",
                    p.member
                )));
            }
        }
        ctx.stamp(tx)
    }
}

/// Validates `JoinGroupFeed` (self-join of a public group).
pub struct JoinGroupFeedContent;

impl ContentHandler for JoinGroupFeedContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::JoinGroupFeed
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, JoinGroupFeed);
        let group = rules::require_live_group(ctx.reader, p.feed_id)?;
        if !group.is_public {
            return Err(FeedError::PermissionDenied(format!(
                "group {} is not public",
                p.feed_id
            )));
        }
        rules::require_signatory(&tx.signatory, &p.member)?;
        if let Some(existing) = ctx
            .reader
            .get_participant_with_history(p.feed_id, &p.member)
            .map_err(FeedError::from)?
        {
            if existing.is_active() {
                return Err(FeedError::FailedPrecondition(format!(
                    "{} is already a member",
                    p.member
                )));
            }
            if existing.role == ParticipantRole::Banned {
                return Err(FeedError::PermissionDenied(format!(
                    "{} is banned from {}",
                    p.member, p.feed_id
                )));
            }
            if let Some(last_leave) = existing.last_leave_block {
                let elapsed = ctx.now.saturating_sub(last_leave);
                if elapsed < ctx.config.rejoin_cooldown_blocks {
                    return Err(FeedError::FailedPrecondition(format!(
                        "rejoin cooldown: {} of {} blocks elapsed",
                        elapsed, ctx.config.rejoin_cooldown_blocks
                    )));
                }
            }
        }
        ctx.stamp(tx)
    }
}

/// Validates `LeaveGroupFeed`.
pub struct LeaveGroupFeedContent;

impl ContentHandler for LeaveGroupFeedContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::LeaveGroupFeed
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, LeaveGroupFeed);
        rules::require_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.member)?;
        // Banned members are inactive, so this also rejects a banned
        // member trying to convert the ban into a clean leave.
        rules::require_active_participant(ctx.reader, p.feed_id, &p.member)?;
        ctx.stamp(tx)
    }
}

/// Validates `BanFromGroupFeed`.
pub struct BanFromGroupFeedContent;

impl ContentHandler for BanFromGroupFeedContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::BanFromGroupFeed
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, BanFromGroupFeed);
        rules::require_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        if p.member == p.requester {
            return Err(FeedError::InvalidArgument("cannot ban yourself".into()));
        }
        // A banned member is inactive, so the active-participant rule also
        // rejects double bans.
        let target = rules::require_active_participant(ctx.reader, p.feed_id, &p.member)?;
        rules::forbid_admin_target(&target)?;
        ctx.stamp(tx)
    }
}

/// Validates `UnbanFromGroupFeed`.
pub struct UnbanFromGroupFeedContent;

impl ContentHandler for UnbanFromGroupFeedContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::UnbanFromGroupFeed
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, UnbanFromGroupFeed);
        rules::require_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        let target = rules::require_participant_record(ctx.reader, p.feed_id, &p.member)?;
        if target.role != ParticipantRole::Banned {
            return Err(FeedError::FailedPrecondition(format!(
                "{} is not banned",
                p.member
            )));
        }
        ctx.stamp(tx)
    }
}

/// Validates `PromoteToAdmin`.
pub struct PromoteToAdminContent;

impl ContentHandler for PromoteToAdminContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::PromoteToAdmin
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, PromoteToAdmin);
        rules::require_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        let target = rules::require_active_participant(ctx.reader, p.feed_id, &p.member)?;
        if target.role != ParticipantRole::Member {
            return Err(FeedError::FailedPrecondition(format!(
                "{} must be a regular member to be promoted",
                p.member
            )));
        }
        ctx.stamp(tx)
    }
}

/// Validates `BlockMember`.
pub struct BlockMemberContent;

impl ContentHandler for BlockMemberContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::BlockMember
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, BlockMember);
        rules::require_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        let target = rules::require_active_participant(ctx.reader, p.feed_id, &p.member)?;
        rules::forbid_admin_target(&target)?;
        if target.role == ParticipantRole::Blocked {
            return Err(FeedError::FailedPrecondition(format!(
                "{} is already blocked",
                p.member
            )));
        }
        ctx.stamp(tx)
    }
}

/// Validates `UnblockMember`.
pub struct UnblockMemberContent;

impl ContentHandler for UnblockMemberContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::UnblockMember
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, UnblockMember);
        rules::require_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        let target = rules::require_active_participant(ctx.reader, p.feed_id, &p.member)?;
        if target.role != ParticipantRole::Blocked {
            return Err(FeedError::FailedPrecondition(format!(
                "{} is not blocked",
                p.member
            )));
        }
        ctx.stamp(tx)
    }
}

/// Validates `UpdateGroupFeedTitle`.
pub struct UpdateGroupFeedTitleContent;

impl ContentHandler for UpdateGroupFeedTitleContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::UpdateGroupFeedTitle
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, UpdateGroupFeedTitle);
        rules::require_live_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        rules::valid_title(&p.title)?;
        ctx.stamp(tx)
    }
}

/// Validates `UpdateGroupFeedDescription`.
pub struct UpdateGroupFeedDescriptionContent;

impl ContentHandler for UpdateGroupFeedDescriptionContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::UpdateGroupFeedDescription
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, UpdateGroupFeedDescription);
        rules::require_live_group(ctx.reader, p.feed_id)?;
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        // Descriptions may be empty; no content rule applies.
        ctx.stamp(tx)
    }
}

/// Validates `DeleteGroupFeed`.
pub struct DeleteGroupFeedContent;

impl ContentHandler for DeleteGroupFeedContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::DeleteGroupFeed
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, DeleteGroupFeed);
        let group = rules::require_group(ctx.reader, p.feed_id)?;
        if group.is_deleted {
            return Err(FeedError::FailedPrecondition(format!(
                "group {} is already deleted",
                p.feed_id
            )));
        }
        rules::require_signatory(&tx.signatory, &p.requester)?;
        rules::require_admin(ctx.reader, p.feed_id, &p.requester)?;
        ctx.stamp(tx)
    }
}

/// Validates `GroupFeedKeyRotation` payload shape.
pub struct GroupFeedKeyRotationContent;

impl ContentHandler for GroupFeedKeyRotationContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::GroupFeedKeyRotation
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, GroupFeedKeyRotation);
        if p.feed_id.is_nil() {
            return Err(FeedError::InvalidArgument("feed id must be set".into()));
        }
        if p.new_version < 1 || p.new_version != p.previous_version + 1 {
            return Err(FeedError::InvalidArgument(format!(
                "rotation must advance the version by one (got {} after {})",
                p.new_version, p.previous_version
            )));
        }
        if p.valid_from_block == 0 {
            return Err(FeedError::InvalidArgument(
                "valid-from block must be positive".into(),
            ));
        }
        if p.wrapped.is_empty() {
            return Err(FeedError::InvalidArgument(
                "rotation must carry at least one wrapped key".into(),
            ));
        }
        let members: Vec<_> = p.wrapped.iter().map(|w| w.member_address.clone()).collect();
        rules::unique_non_blank(&members)?;
        if p.wrapped.iter().any(|w| w.ciphertext.is_empty()) {
            return Err(FeedError::InvalidArgument(
                "wrapped key ciphertext must not be empty".into(),
            ));
        }
        ctx.stamp(tx)
    }
}

/// Validates `NewGroupFeedMessage`, including the key-generation window.
pub struct NewGroupFeedMessageContent;

impl ContentHandler for NewGroupFeedMessageContent {
    fn kind(&self) -> PayloadKind {
        PayloadKind::NewGroupFeedMessage
    }

    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let p = expect_payload!(&tx.payload, NewGroupFeedMessage);
        let group = rules::require_live_group(ctx.reader, p.feed_id)?;
        if tx.signatory.is_blank() {
            return Err(FeedError::InvalidArgument(
                "signatory must not be blank".into(),
            ));
        }
        if p.message_id.is_nil() {
            return Err(FeedError::InvalidArgument("message id must be set".into()));
        }
        let sender = rules::require_participant_record(ctx.reader, p.feed_id, &tx.signatory)?;
        if !sender.can_send() {
            return Err(FeedError::PermissionDenied(format!(
                "{} may not send to {}",
                tx.signatory, p.feed_id
            )));
        }
        if let Some(commitment) = &p.author_commitment {
            if commitment.len() != 32 {
                return Err(FeedError::InvalidArgument(format!(
                    "author commitment must be exactly 32 bytes, got {}",
                    commitment.len()
                )));
            }
        }

        let current = group.current_key_generation;
        if p.key_generation != current {
            let in_grace = current > 0 && p.key_generation == current - 1 && {
                let generation = ctx
                    .reader
                    .get_key_generation(p.feed_id, current)
                    .map_err(FeedError::from)?
                    .ok_or_else(|| {
                        FeedError::Transient(format!(
                            "missing key generation {current} for {}",
                            p.feed_id
                        ))
                    })?;
                ctx.now <= ctx.config.grace_deadline(generation.valid_from_block)
            };
            if !in_grace {
                return Err(FeedError::FailedPrecondition(format!(
                    "key generation {} is not acceptable (current {})",
                    p.key_generation, current
                )));
            }
        }
        ctx.stamp(tx)
    }
}
