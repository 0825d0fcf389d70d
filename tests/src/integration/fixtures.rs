//! # Shared Test Harness
//!
//! A fully wired node with controllable identities, aliases, and chain
//! head, plus helpers for driving canonical transactions through the
//! pipeline the way block application would.

use feeds_pipeline::payloads::{
    AddMemberToGroupFeed, FeedPayload, MembershipChange, NewGroupFeed, NewGroupFeedMessage,
};
use feeds_storage::{FeedCache, FeedStorage, InMemoryKVStore, KeyValueStore};
use node_runtime::{build_node_with_storage, build_node_with_store, Node, NodeConfig};
use std::sync::Arc;
use shared_types::{
    Address, EncryptKey, FeedError, FeedId, MessageId, SignedTransaction, TransactionId,
};
use std::collections::HashMap;
use tempfile::TempDir;

/// A wired node plus the member secrets the tests hold on to.
pub struct TestNode {
    /// The assembled feeds core.
    pub node: Node,
    secrets: HashMap<Address, k256::SecretKey>,
    _attachment_dir: TempDir,
}

impl TestNode {
    /// Build over the default in-memory store.
    pub fn new() -> Self {
        Self::with_store(Box::new(InMemoryKVStore::new()))
    }

    /// Build over a caller-provided durable store.
    pub fn with_store(store: Box<dyn KeyValueStore>) -> Self {
        let attachment_dir = TempDir::new().expect("temp attachment dir");
        let config = NodeConfig {
            attachment_dir: attachment_dir.path().to_string_lossy().into_owned(),
            ..NodeConfig::default()
        };
        let node = build_node_with_store(&config, store).expect("build node");
        Self {
            node,
            secrets: HashMap::new(),
            _attachment_dir: attachment_dir,
        }
    }

    /// Build over a pre-assembled storage facade (e.g. one wired to a
    /// failing cache).
    pub fn with_storage(storage: Arc<FeedStorage>) -> Self {
        let attachment_dir = TempDir::new().expect("temp attachment dir");
        let config = NodeConfig {
            attachment_dir: attachment_dir.path().to_string_lossy().into_owned(),
            ..NodeConfig::default()
        };
        let node = build_node_with_storage(&config, storage).expect("build node");
        Self {
            node,
            secrets: HashMap::new(),
            _attachment_dir: attachment_dir,
        }
    }

    /// Register a member identity (encryption keypair + alias) and keep
    /// the secret for unwrap assertions.
    pub fn register_member(&mut self, name: &str) -> Address {
        let address = Address::new(name);
        let secret = k256::SecretKey::random(&mut rand::thread_rng());
        let recipient = shared_crypto::EciesRecipient::from_public_key(secret.public_key());
        self.node
            .identities
            .register(address.clone(), EncryptKey::new(recipient.to_hex()));
        self.secrets.insert(address.clone(), secret);
        address
    }

    /// The decryption secret a member registered with.
    pub fn secret_for(&self, name: &str) -> &k256::SecretKey {
        self.secrets
            .get(&Address::new(name))
            .expect("member registered")
    }

    /// Run one canonical transaction through the pipeline.
    pub async fn execute(
        &self,
        payload: FeedPayload,
        signatory: &str,
        block: u64,
    ) -> Result<(), FeedError> {
        self.node.chain.set(block);
        self.node
            .pipeline
            .execute(&SignedTransaction {
                id: TransactionId::generate(),
                payload,
                signatory: Address::new(signatory),
                signature: [0u8; 64],
                block_index: block,
            })
            .await
    }

    /// Create a group with the given members (first is the creator).
    pub async fn create_group(
        &self,
        feed_id: FeedId,
        title: &str,
        members: &[&str],
        block: u64,
    ) -> Result<(), FeedError> {
        self.execute(
            FeedPayload::NewGroupFeed(NewGroupFeed {
                feed_id,
                title: title.into(),
                description: String::new(),
                is_public: false,
                creator: Address::new(members[0]),
                participants: members.iter().map(|m| Address::new(*m)).collect(),
            }),
            members[0],
            block,
        )
        .await
    }

    /// Admin `requester` adds `member`.
    pub async fn add_member(
        &self,
        feed_id: FeedId,
        requester: &str,
        member: &str,
        block: u64,
    ) -> Result<(), FeedError> {
        self.execute(
            FeedPayload::AddMemberToGroupFeed(AddMemberToGroupFeed {
                feed_id,
                requester: Address::new(requester),
                member: Address::new(member),
                member_encrypt_key: EncryptKey::new("provided-on-wire"),
            }),
            requester,
            block,
        )
        .await
    }

    /// A single-target membership payload.
    pub fn change(feed_id: FeedId, requester: &str, member: &str) -> MembershipChange {
        MembershipChange {
            feed_id,
            requester: Address::new(requester),
            member: Address::new(member),
        }
    }

    /// Send a message under a key generation.
    pub async fn send_message(
        &self,
        feed_id: FeedId,
        sender: &str,
        key_generation: u32,
        block: u64,
    ) -> Result<MessageId, FeedError> {
        let message_id = MessageId::generate();
        self.execute(
            FeedPayload::NewGroupFeedMessage(NewGroupFeedMessage {
                feed_id,
                message_id,
                ciphertext: vec![0xEE; 24],
                timestamp: block * 1_000,
                key_generation,
                reply_to: None,
                author_commitment: None,
            }),
            sender,
            block,
        )
        .await?;
        Ok(message_id)
    }

    /// Push a `last_block_index` value straight into the cache, as
    /// in-flight work would.
    pub fn seed_cache_block_index(&self, feed_id: FeedId, block: u64) {
        self.node
            .storage
            .cache()
            .put_last_block_index(feed_id, block)
            .expect("cache seed");
    }
}

impl Default for TestNode {
    fn default() -> Self {
        Self::new()
    }
}
