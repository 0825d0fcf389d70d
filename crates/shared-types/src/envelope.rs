//! # Signed Transaction Envelope
//!
//! The layered record every state-changing operation travels in. A
//! transaction becomes canonical only when included in a block; the
//! envelope carries the inclusion block alongside the signer identity.
//!
//! Envelopes are threaded as explicit values through the pipeline. No
//! handler stores one in ambient or thread-local state.

use crate::ids::{Address, BlockIndex, TransactionId};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// A 64-byte secp256k1 signature in `r || s` form.
pub type TransactionSignature = [u8; 64];

/// A transaction as received from the replicated log: a typed payload plus
/// the signer's signature over it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction<P> {
    /// Canonical transaction identity; the replay/idempotency key.
    pub id: TransactionId,
    /// The typed payload, tagged by its kind.
    pub payload: P,
    /// The signing identity that authored the transaction.
    pub signatory: Address,
    /// Signature over the serialized payload.
    #[serde_as(as = "Bytes")]
    pub signature: TransactionSignature,
    /// The block that included this transaction. All "now" decisions in
    /// validation and apply use this, never wall-clock time.
    pub block_index: BlockIndex,
}

/// A transaction that passed content validation and was countersigned by
/// this node.
///
/// Only content handlers construct these; transaction handlers consume
/// them. The inner envelope is carried unchanged.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedTransaction<P> {
    /// The validated envelope.
    pub inner: SignedTransaction<P>,
    /// This node's countersignature stamped at validation time.
    #[serde_as(as = "Bytes")]
    pub node_signature: TransactionSignature,
}

impl<P> ValidatedTransaction<P> {
    /// The canonical transaction identity.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    /// The block that included the transaction.
    #[must_use]
    pub fn block_index(&self) -> BlockIndex {
        self.inner.block_index
    }

    /// The original signer.
    #[must_use]
    pub fn signatory(&self) -> &Address {
        &self.inner.signatory
    }
}
