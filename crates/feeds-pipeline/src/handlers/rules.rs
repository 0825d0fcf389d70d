//! # Shared Validation Rules
//!
//! The checks every admin/membership validator composes. Each returns the
//! semantic error kind the failure maps to, so content handlers stay
//! declarative.

use feeds_storage::{FeedReads, ReadOnlyUow};
use shared_types::{Address, FeedError, FeedId, GroupFeed, Participant, ParticipantRole};

/// Admin rules verify that the transaction signatory equals the declared
/// requester; a forged requester is an authority violation.
pub fn require_signatory(signatory: &Address, requester: &Address) -> Result<(), FeedError> {
    if signatory != requester {
        return Err(FeedError::PermissionDenied(format!(
            "signatory {signatory} does not match requester {requester}"
        )));
    }
    Ok(())
}

/// Title must be 1..=100 chars and not whitespace-only.
pub fn valid_title(title: &str) -> Result<(), FeedError> {
    if title.trim().is_empty() {
        return Err(FeedError::InvalidArgument("title must not be empty".into()));
    }
    if title.chars().count() > 100 {
        return Err(FeedError::InvalidArgument(
            "title must be at most 100 characters".into(),
        ));
    }
    Ok(())
}

/// The group must exist.
pub fn require_group(reader: &ReadOnlyUow, feed_id: FeedId) -> Result<GroupFeed, FeedError> {
    reader
        .get_group_feed(feed_id)
        .map_err(FeedError::from)?
        .ok_or_else(|| FeedError::NotFound(format!("group {feed_id}")))
}

/// The group must exist and not be soft-deleted.
pub fn require_live_group(reader: &ReadOnlyUow, feed_id: FeedId) -> Result<GroupFeed, FeedError> {
    let group = require_group(reader, feed_id)?;
    if group.is_deleted {
        return Err(FeedError::FailedPrecondition(format!(
            "group {feed_id} is deleted"
        )));
    }
    Ok(group)
}

/// The requester must be an active admin of the group.
pub fn require_admin(
    reader: &ReadOnlyUow,
    feed_id: FeedId,
    requester: &Address,
) -> Result<(), FeedError> {
    if !reader.is_admin(feed_id, requester).map_err(FeedError::from)? {
        return Err(FeedError::PermissionDenied(format!(
            "{requester} is not an admin of {feed_id}"
        )));
    }
    Ok(())
}

/// The member must have a participation row (active or not).
pub fn require_participant_record(
    reader: &ReadOnlyUow,
    feed_id: FeedId,
    member: &Address,
) -> Result<Participant, FeedError> {
    reader
        .get_participant_with_history(feed_id, member)
        .map_err(FeedError::from)?
        .ok_or_else(|| FeedError::NotFound(format!("{member} is not recorded in {feed_id}")))
}

/// The member must be an active participant.
pub fn require_active_participant(
    reader: &ReadOnlyUow,
    feed_id: FeedId,
    member: &Address,
) -> Result<Participant, FeedError> {
    let participant = require_participant_record(reader, feed_id, member)?;
    if !participant.is_active() {
        return Err(FeedError::FailedPrecondition(format!(
            "{member} is not an active participant of {feed_id}"
        )));
    }
    Ok(participant)
}

/// Participant lists must be non-blank and duplicate-free.
pub fn unique_non_blank(addresses: &[Address]) -> Result<(), FeedError> {
    let mut seen = std::collections::BTreeSet::new();
    for address in addresses {
        if address.is_blank() {
            return Err(FeedError::InvalidArgument(
                "participant address must not be blank".into(),
            ));
        }
        if !seen.insert(address) {
            return Err(FeedError::Conflict(format!(
                "duplicate participant address {address}"
            )));
        }
    }
    Ok(())
}

/// Admin actions may not target another admin.
pub fn forbid_admin_target(participant: &Participant) -> Result<(), FeedError> {
    if participant.role == ParticipantRole::Admin {
        return Err(FeedError::FailedPrecondition(format!(
            "{} is an admin",
            participant.address
        )));
    }
    Ok(())
}
