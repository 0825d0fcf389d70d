//! # Handler Contracts
//!
//! Content handlers are pure validators: they read, they never write, and
//! on success they countersign the transaction. Transaction handlers own a
//! writable unit-of-work each, mutate, commit once, then publish events.

use crate::payloads::{FeedPayload, PayloadKind};
use async_trait::async_trait;
use feeds_rotation::{CredentialsProvider, RotationEngine};
use feeds_storage::{FeedStorage, ReadOnlyUow};
use shared_bus::EventPublisher;
use shared_types::{
    BlockIndex, FeedError, FeedsConfig, SignedTransaction, ValidatedTransaction,
};
use std::sync::Arc;

pub mod apply;
pub mod content;
pub mod rules;

/// Everything a content handler may consult: a read-only view, the
/// inclusion block, the node credentials, and the protocol limits.
pub struct ValidationContext<'a> {
    /// Read-only storage view.
    pub reader: &'a ReadOnlyUow,
    /// The block the transaction was included in; every "now" decision
    /// uses this.
    pub now: BlockIndex,
    /// Node credentials for countersigning.
    pub credentials: &'a dyn CredentialsProvider,
    /// Protocol limits.
    pub config: &'a FeedsConfig,
}

impl ValidationContext<'_> {
    /// Countersign a transaction that passed validation.
    pub fn stamp(
        &self,
        tx: &SignedTransaction<FeedPayload>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError> {
        let payload_bytes = bincode::serialize(&tx.payload)
            .map_err(|e| FeedError::InvalidArgument(format!("unencodable payload: {e}")))?;
        Ok(ValidatedTransaction {
            inner: tx.clone(),
            node_signature: self.credentials.sign(&payload_bytes),
        })
    }
}

/// A pure validator for one payload kind.
pub trait ContentHandler: Send + Sync {
    /// The kind this handler validates.
    fn kind(&self) -> PayloadKind;

    /// Whether this handler validates `kind`.
    fn can_validate(&self, kind: PayloadKind) -> bool {
        kind == self.kind()
    }

    /// Validate and countersign, or reject. Must not write state and must
    /// be deterministic given its inputs.
    fn validate_and_sign(
        &self,
        tx: &SignedTransaction<FeedPayload>,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidatedTransaction<FeedPayload>, FeedError>;
}

/// A state mutator for one payload kind.
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    /// The kind this handler applies.
    fn kind(&self) -> PayloadKind;

    /// Apply the validated transaction inside a writable unit-of-work and
    /// publish events after the commit. Retriable up to, but not past, a
    /// successful commit.
    async fn handle(&self, tx: &ValidatedTransaction<FeedPayload>) -> Result<(), FeedError>;
}

/// Shared dependencies of the transaction handlers.
pub struct HandlerDeps {
    /// The storage facade.
    pub storage: Arc<FeedStorage>,
    /// The key rotation engine.
    pub rotation: Arc<RotationEngine>,
    /// Post-commit event bus.
    pub bus: Arc<dyn EventPublisher>,
    /// Protocol limits.
    pub config: FeedsConfig,
}

/// Destructure the expected payload variant or reject the transaction.
macro_rules! expect_payload {
    ($payload:expr, $variant:ident) => {
        match $payload {
            crate::payloads::FeedPayload::$variant(p) => p,
            other => {
                return Err(shared_types::FeedError::InvalidArgument(format!(
                    "expected {:?} payload, got {:?}",
                    crate::payloads::PayloadKind::$variant,
                    other.kind()
                )))
            }
        }
    };
}
pub(crate) use expect_payload;
