//! # Outbound Ports (Driven Ports)
//!
//! The external collaborators the feeds core consumes but does not own:
//! identity resolution, chain head tracking, and node credentials. Each
//! trait ships an in-memory implementation for single-node operation and
//! tests.

use parking_lot::RwLock;
use shared_crypto::SigningIdentity;
use shared_types::{Address, BlockIndex, EncryptKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Identity lookup failure (transient; the identity may exist).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Identity lookup failed: {0}")]
pub struct IdentityLookupError(pub String);

/// Resolves a member address to its current public encryption key.
pub trait IdentityStore: Send + Sync {
    /// The encryption key registered for `address`, or `None` when no
    /// identity record exists.
    fn encrypt_key_for(&self, address: &Address)
        -> Result<Option<EncryptKey>, IdentityLookupError>;
}

/// Tracks the latest block the node has observed.
pub trait BlockchainCache: Send + Sync {
    /// The most recent block index.
    fn last_block_index(&self) -> BlockIndex;
}

/// The node's own signing identity.
pub trait CredentialsProvider: Send + Sync {
    /// The node's address.
    fn address(&self) -> Address;

    /// Sign bytes with the node key (used to countersign validated
    /// transactions).
    fn sign(&self, message: &[u8]) -> [u8; 64];
}

/// Map-backed identity store for single-node operation and tests.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    identities: RwLock<HashMap<Address, EncryptKey>>,
}

impl InMemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an identity.
    pub fn register(&self, address: Address, key: EncryptKey) {
        self.identities.write().insert(address, key);
    }

    /// Remove an identity.
    pub fn remove(&self, address: &Address) {
        self.identities.write().remove(address);
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn encrypt_key_for(
        &self,
        address: &Address,
    ) -> Result<Option<EncryptKey>, IdentityLookupError> {
        Ok(self.identities.read().get(address).cloned())
    }
}

/// Atomic block-head tracker for single-node operation and tests.
#[derive(Default)]
pub struct InMemoryBlockchainCache {
    head: AtomicU64,
}

impl InMemoryBlockchainCache {
    /// Create at block 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create at a given head.
    #[must_use]
    pub fn at(head: BlockIndex) -> Self {
        let cache = Self::default();
        cache.set(head);
        cache
    }

    /// Advance (or rewind, in tests) the head.
    pub fn set(&self, head: BlockIndex) {
        self.head.store(head, Ordering::SeqCst);
    }
}

impl BlockchainCache for InMemoryBlockchainCache {
    fn last_block_index(&self) -> BlockIndex {
        self.head.load(Ordering::SeqCst)
    }
}

/// Node credentials backed by a local signing identity.
pub struct NodeCredentials {
    identity: SigningIdentity,
    address: Address,
}

impl NodeCredentials {
    /// Wrap a signing identity; the identity's address string is the
    /// node's address.
    #[must_use]
    pub fn new(identity: SigningIdentity) -> Self {
        let address = Address::new(identity.address());
        Self { identity, address }
    }

    /// Generate a fresh node identity.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(SigningIdentity::generate())
    }
}

impl CredentialsProvider for NodeCredentials {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.identity.sign_envelope(message)
    }
}
