//! # Node Wiring
//!
//! Builds the feeds core bottom-up: collaborators, storage, rotation
//! engine, pipeline (all fourteen handler pairs), and the API facade.

use crate::config::NodeConfig;
use anyhow::Context;
use feeds_api::{AttachmentTempStore, FeedsApi, InMemoryAliasProvider};
use feeds_pipeline::{HandlerDeps, TransactionPipeline};
use feeds_rotation::{
    CredentialsProvider, InMemoryBlockchainCache, InMemoryIdentityStore, NodeCredentials,
    RotationEngine,
};
use feeds_storage::adapters::memory_cache::InMemoryFeedCache;
use feeds_storage::{FeedStorage, InMemoryKVStore, KeyValueStore};
use shared_bus::InMemoryEventBus;
use std::sync::Arc;
use tracing::info;

/// The assembled feeds core.
pub struct Node {
    /// Post-commit event bus.
    pub bus: Arc<InMemoryEventBus>,
    /// Storage facade.
    pub storage: Arc<FeedStorage>,
    /// Identity records of known members.
    pub identities: Arc<InMemoryIdentityStore>,
    /// Display aliases.
    pub aliases: Arc<InMemoryAliasProvider>,
    /// Chain head tracker.
    pub chain: Arc<InMemoryBlockchainCache>,
    /// The transaction pipeline.
    pub pipeline: Arc<TransactionPipeline>,
    /// The client-facing API.
    pub api: Arc<FeedsApi>,
    /// Attachment staging store.
    pub attachments: AttachmentTempStore,
}

/// Build a node over the given durable store backend.
pub fn build_node_with_store(
    config: &NodeConfig,
    store: Box<dyn KeyValueStore>,
) -> anyhow::Result<Node> {
    let storage = Arc::new(FeedStorage::new(store, Arc::new(InMemoryFeedCache::new())));
    build_node_with_storage(config, storage)
}

/// Build a node over a pre-assembled storage facade (custom cache or
/// store combinations).
pub fn build_node_with_storage(
    config: &NodeConfig,
    storage: Arc<FeedStorage>,
) -> anyhow::Result<Node> {
    let bus = Arc::new(InMemoryEventBus::new());
    let identities = Arc::new(InMemoryIdentityStore::new());
    let aliases = Arc::new(InMemoryAliasProvider::new());
    let chain = Arc::new(InMemoryBlockchainCache::new());
    let credentials: Arc<dyn CredentialsProvider> = Arc::new(NodeCredentials::generate());

    let rotation = Arc::new(RotationEngine::new(identities.clone(), config.feeds.clone()));
    let deps = Arc::new(HandlerDeps {
        storage: storage.clone(),
        rotation,
        bus: bus.clone(),
        config: config.feeds.clone(),
    });
    let pipeline = Arc::new(TransactionPipeline::with_default_handlers(
        deps,
        credentials.clone(),
    ));
    info!(
        kinds = pipeline.registered_kinds().len(),
        "Transaction pipeline registered"
    );

    let api = Arc::new(FeedsApi::new(
        storage.clone(),
        pipeline.clone(),
        chain.clone(),
        credentials,
        aliases.clone(),
        config.feeds.clone(),
    ));
    let attachments = AttachmentTempStore::new(&config.attachment_dir)
        .context("opening attachment staging directory")?;

    Ok(Node {
        bus,
        storage,
        identities,
        aliases,
        chain,
        pipeline,
        api,
        attachments,
    })
}

/// Build a node with the default (in-memory) store. Compile with the
/// `rocksdb` feature and use [`build_node_with_store`] with a
/// `RocksDbStore` for a durable deployment.
pub fn build_node(config: &NodeConfig) -> anyhow::Result<Node> {
    build_node_with_store(config, Box::new(InMemoryKVStore::new()))
}
