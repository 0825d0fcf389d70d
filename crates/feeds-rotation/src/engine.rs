//! # Rotation Engine
//!
//! Issues a new key generation for a group:
//!
//! 1. read the previous version;
//! 2. resolve the active member set, applying the joining/leaving deltas;
//! 3. resolve each member's public encryption key;
//! 4. generate a fresh 256-bit group key;
//! 5. wrap it per member via ECIES;
//! 6. compose the rotation payload;
//! 7. persist generation, wrapped keys, and the version bump through the
//!    caller's unit-of-work;
//! 8. return the payload.
//!
//! A rotation triggered by Leave/Ban omits the target from the member
//! set; the omitted party cannot derive any key at or above the new
//! version. Versions are issued gap-free because the per-feed writable
//! unit-of-work serializes concurrent callers.

use crate::ports::outbound::{IdentityStore, IdentityLookupError};
use feeds_storage::{FeedReads, StorageError, WritableUow};
use shared_crypto::{ecies_encrypt, EciesRecipient, GroupKey};
use shared_types::{
    Address, BlockIndex, FeedError, FeedId, FeedsConfig, KeyRotationPayload, RotationTrigger,
    WrappedKey,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Rotation failure taxonomy.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The group does not exist.
    #[error("Group not found: {0}")]
    GroupNotFound(FeedId),

    /// The resulting member set would be empty.
    #[error("No active members remain in group {0}")]
    NoActiveMembers(FeedId),

    /// The resulting member set exceeds the hard cap.
    #[error("Group too large: {size} members, maximum {max}")]
    GroupTooLarge {
        /// Resulting member count.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A member has no identity record.
    #[error("Missing identity for {0}")]
    MissingIdentity(Address),

    /// A member's registered encryption key does not parse.
    #[error("Invalid encryption key for {0}")]
    InvalidKey(Address),

    /// Key generation or wrapping failed.
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// The identity store was unreachable.
    #[error(transparent)]
    IdentityLookup(#[from] IdentityLookupError),

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<RotationError> for FeedError {
    fn from(err: RotationError) -> Self {
        match err {
            RotationError::GroupNotFound(id) => FeedError::NotFound(format!("group {id}")),
            RotationError::NoActiveMembers(id) => {
                FeedError::FailedPrecondition(format!("group {id} has no active members"))
            }
            RotationError::GroupTooLarge { size, max } => {
                FeedError::Capacity(format!("group has {size} members, maximum {max}"))
            }
            RotationError::MissingIdentity(address) => {
                FeedError::CryptoFailure(format!("no identity record for {address}"))
            }
            RotationError::InvalidKey(address) => {
                FeedError::CryptoFailure(format!("malformed encryption key for {address}"))
            }
            RotationError::KeyGenerationFailed(msg) => FeedError::CryptoFailure(msg),
            RotationError::IdentityLookup(err) => FeedError::Transient(err.to_string()),
            RotationError::Storage(err) => err.into(),
        }
    }
}

/// The key rotation engine.
pub struct RotationEngine {
    identity_store: Arc<dyn IdentityStore>,
    config: FeedsConfig,
}

impl RotationEngine {
    /// Build over an identity store with the given limits.
    pub fn new(identity_store: Arc<dyn IdentityStore>, config: FeedsConfig) -> Self {
        Self {
            identity_store,
            config,
        }
    }

    /// Issue generation 0 for a group being created in `uow`.
    ///
    /// Reads the member set the caller has already staged, wraps a fresh
    /// key for every member, and persists the generation without bumping
    /// `current_key_generation` (the group row is created at 0).
    pub fn initial_generation(
        &self,
        uow: &mut WritableUow,
        feed_id: FeedId,
        now: BlockIndex,
    ) -> Result<KeyRotationPayload, RotationError> {
        let members = uow.get_active_group_member_addresses(feed_id)?;
        let payload = self.wrap_for_members(feed_id, members, 0, RotationTrigger::Join, now)?;
        uow.create_key_rotation(&payload)?;
        Ok(payload)
    }

    /// Issue the next key generation for `feed_id` at block `now`.
    ///
    /// Writes through `uow`; the caller owns the commit, so a failure here
    /// (or later in the caller) rolls the whole operation back.
    pub fn trigger_rotation(
        &self,
        uow: &mut WritableUow,
        feed_id: FeedId,
        trigger: RotationTrigger,
        now: BlockIndex,
        joining: Option<&Address>,
        leaving: Option<&Address>,
    ) -> Result<KeyRotationPayload, RotationError> {
        let group = uow
            .get_group_feed(feed_id)?
            .ok_or(RotationError::GroupNotFound(feed_id))?;
        let previous_version = group.current_key_generation;

        let mut members = uow.get_active_group_member_addresses(feed_id)?;
        if let Some(joining) = joining {
            if !members.contains(joining) {
                members.push(joining.clone());
            }
        }
        if let Some(leaving) = leaving {
            members.retain(|m| m != leaving);
        }
        let new_version = previous_version + 1;
        let payload = self.wrap_for_members(feed_id, members, new_version, trigger, now)?;

        uow.create_key_rotation(&payload)?;
        uow.update_current_key_generation(feed_id, new_version)?;

        info!(
            %feed_id,
            new_version,
            ?trigger,
            members = payload.wrapped.len(),
            "Key rotation staged"
        );
        Ok(payload)
    }

    /// Resolve identities and wrap a fresh group key for `members`.
    fn wrap_for_members(
        &self,
        feed_id: FeedId,
        mut members: Vec<Address>,
        new_version: u32,
        trigger: RotationTrigger,
        now: BlockIndex,
    ) -> Result<KeyRotationPayload, RotationError> {
        if members.is_empty() {
            return Err(RotationError::NoActiveMembers(feed_id));
        }
        if members.len() > self.config.max_group_size {
            return Err(RotationError::GroupTooLarge {
                size: members.len(),
                max: self.config.max_group_size,
            });
        }
        // Deterministic wrap order; the set itself is what matters.
        members.sort();

        let mut recipients = Vec::with_capacity(members.len());
        for member in &members {
            let key = self
                .identity_store
                .encrypt_key_for(member)?
                .ok_or_else(|| RotationError::MissingIdentity(member.clone()))?;
            let recipient = EciesRecipient::from_hex(key.as_str())
                .map_err(|_| RotationError::InvalidKey(member.clone()))?;
            recipients.push((member.clone(), recipient));
        }

        let group_key = GroupKey::generate();

        let mut wrapped = Vec::with_capacity(recipients.len());
        for (member, recipient) in recipients {
            let ciphertext = ecies_encrypt(&recipient, group_key.as_bytes())
                .map_err(|e| RotationError::KeyGenerationFailed(e.to_string()))?;
            debug!(%feed_id, %member, new_version, "Wrapped group key for member");
            wrapped.push(WrappedKey {
                feed_id,
                version: new_version,
                member_address: member,
                ciphertext,
            });
        }

        Ok(KeyRotationPayload {
            feed_id,
            new_version,
            previous_version: new_version.saturating_sub(1),
            valid_from_block: now,
            trigger,
            wrapped,
        })
    }
}
