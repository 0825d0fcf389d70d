//! # Feeds API Service
//!
//! The facade clients reach through the node's RPC layer. Queries read
//! through the storage overlay; mutations produce a transaction, run it
//! through the pipeline, and report `{success, message}`.

use crate::aliases::AliasProvider;
use crate::attachments::chunk_bytes;
use crate::wire::{
    AddMemberToGroupFeedRequest, AttachmentChunk, DownloadAttachmentRequest, FeedSummary,
    GetFeedForAddressRequest, GetFeedForAddressResponse, GetFeedMessagesByIdRequest,
    GetFeedMessagesByIdResponse, GetKeyGenerationsRequest, GetKeyGenerationsResponse,
    GetMessageByIdRequest, GetMessageByIdResponse, KeyGenerationEntry, MessageView,
    MutationResponse,
};
use feeds_pipeline::payloads::{AddMemberToGroupFeed, FeedPayload};
use feeds_pipeline::TransactionPipeline;
use feeds_rotation::{BlockchainCache, CredentialsProvider};
use feeds_storage::{FeedCache, FeedReads, FeedStorage};
use shared_types::{
    Address, Attachment, EncryptKey, EncryptedMessage, FeedError, FeedId, FeedKind, FeedsConfig,
    MessageId, ReadPosition, SignedTransaction, TransactionId,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The bounded API surface of the feeds core.
pub struct FeedsApi {
    storage: Arc<FeedStorage>,
    pipeline: Arc<TransactionPipeline>,
    chain: Arc<dyn BlockchainCache>,
    credentials: Arc<dyn CredentialsProvider>,
    aliases: Arc<dyn AliasProvider>,
    config: FeedsConfig,
}

impl FeedsApi {
    /// Wire up the service.
    pub fn new(
        storage: Arc<FeedStorage>,
        pipeline: Arc<TransactionPipeline>,
        chain: Arc<dyn BlockchainCache>,
        credentials: Arc<dyn CredentialsProvider>,
        aliases: Arc<dyn AliasProvider>,
        config: FeedsConfig,
    ) -> Self {
        Self {
            storage,
            pipeline,
            chain,
            credentials,
            aliases,
            config,
        }
    }

    fn render_title(&self, feed_kind: FeedKind, feed_id: FeedId, owner: &Address) -> String {
        let reader = self.storage.create_read_only();
        match feed_kind {
            FeedKind::Personal => {
                format!("{} (YOU)", self.aliases.alias_or_address(owner))
            }
            FeedKind::Chat => reader
                .get_participants(feed_id)
                .ok()
                .and_then(|participants| {
                    participants
                        .into_iter()
                        .find(|p| &p.address != owner)
                        .map(|p| self.aliases.alias_or_address(&p.address))
                })
                .unwrap_or_else(|| "Chat".to_owned()),
            FeedKind::Group => reader
                .get_group_feed(feed_id)
                .ok()
                .flatten()
                .map(|group| group.title)
                .unwrap_or_default(),
        }
    }

    /// Union of the profile's feeds with overlay, display titles, and
    /// read bookmarks, newest activity first.
    pub fn list_feeds_for_address(
        &self,
        request: &GetFeedForAddressRequest,
    ) -> Result<GetFeedForAddressResponse, FeedError> {
        let owner = Address::new(request.profile_public_key.clone());
        let reader = self.storage.create_read_only();
        let feeds = reader.get_feeds_for_address(&owner).map_err(FeedError::from)?;
        drop(reader);

        let mut summaries = Vec::with_capacity(feeds.len());
        for feed in feeds {
            let block_index = self
                .storage
                .last_block_index_overlaid(feed.id, feed.last_block_index);
            if block_index < request.block_index {
                continue;
            }
            summaries.push(FeedSummary {
                feed_id: feed.id.to_string(),
                feed_type: feed.kind.wire_code(),
                feed_title: self.render_title(feed.kind, feed.id, &owner),
                block_index,
                last_read_block_index: self.storage.read_position_or_zero(&owner, feed.id),
            });
        }
        summaries.sort_by(|a, b| b.block_index.cmp(&a.block_index));
        Ok(GetFeedForAddressResponse { feeds: summaries })
    }

    fn message_view(&self, message: EncryptedMessage) -> MessageView {
        MessageView {
            feed_message_id: message.id.to_string(),
            feed_id: message.feed_id.to_string(),
            message_content: message.ciphertext,
            issuer_name: self.aliases.alias_or_address(&message.sender_address),
            timestamp: message.timestamp,
            block_index: message.block_index,
            key_generation: message.key_generation,
            reply_to_message_id: message.reply_to.map(|id| id.to_string()),
        }
    }

    /// One message by id; the uniform not-found shape covers malformed
    /// identifiers, absent rows, and cross-feed mismatches alike.
    pub fn get_message_by_id(&self, request: &GetMessageByIdRequest) -> GetMessageByIdResponse {
        let (Ok(feed_id), Ok(message_id)) = (
            FeedId::parse(&request.feed_id),
            MessageId::parse(&request.message_id),
        ) else {
            return GetMessageByIdResponse::not_found();
        };

        let reader = self.storage.create_read_only();
        match reader.get_message_by_id(message_id) {
            Ok(Some(message)) if message.feed_id == feed_id => {
                GetMessageByIdResponse::found(self.message_view(message))
            }
            Ok(_) => GetMessageByIdResponse::not_found(),
            Err(err) => {
                warn!(%message_id, %err, "Message lookup failed");
                GetMessageByIdResponse::not_found()
            }
        }
    }

    /// Paginated messages, newest first. A non-participant gets an empty
    /// page without any message read.
    pub fn get_feed_messages_by_id(
        &self,
        request: &GetFeedMessagesByIdRequest,
    ) -> Result<GetFeedMessagesByIdResponse, FeedError> {
        let empty = GetFeedMessagesByIdResponse {
            messages: Vec::new(),
            has_more_messages: false,
            oldest_block_index: 0,
            newest_block_index: 0,
        };
        let Ok(feed_id) = FeedId::parse(&request.feed_id) else {
            return Ok(empty);
        };
        let user = Address::new(request.user_address.clone());

        let reader = self.storage.create_read_only();
        if !reader
            .is_user_participant_of_feed(feed_id, &user)
            .map_err(FeedError::from)?
        {
            debug!(%feed_id, %user, "Non-participant message request rejected");
            return Ok(empty);
        }
        drop(reader);

        let ceiling = self.config.max_messages_per_response;
        let limit = request
            .limit
            .map_or(ceiling, |requested| (requested as usize).min(ceiling));
        let window = self
            .storage
            .message_window(feed_id, request.before_block_index, limit)
            .map_err(FeedError::from)?;

        Ok(GetFeedMessagesByIdResponse {
            has_more_messages: window.has_more,
            oldest_block_index: window.oldest_block,
            newest_block_index: window.newest_block,
            messages: window
                .messages
                .into_iter()
                .map(|m| self.message_view(m))
                .collect(),
        })
    }

    /// The generations the user can decrypt, cache-first.
    pub fn get_key_generations(
        &self,
        request: &GetKeyGenerationsRequest,
    ) -> Result<GetKeyGenerationsResponse, FeedError> {
        let Ok(feed_id) = FeedId::parse(&request.feed_id) else {
            return Ok(GetKeyGenerationsResponse {
                key_generations: Vec::new(),
            });
        };
        let user = Address::new(request.user_public_address.clone());
        let mut keys = self
            .storage
            .wrapped_keys_for_member(feed_id, &user)
            .map_err(FeedError::from)?;
        keys.sort_by_key(|k| k.version);
        Ok(GetKeyGenerationsResponse {
            key_generations: keys
                .into_iter()
                .map(|k| KeyGenerationEntry {
                    key_generation: k.version,
                    encrypted_key: k.ciphertext,
                })
                .collect(),
        })
    }

    async fn execute_mutation(
        &self,
        signatory: Address,
        payload: FeedPayload,
        success_message: &str,
    ) -> MutationResponse {
        let payload_bytes = match bincode_payload(&payload) {
            Ok(bytes) => bytes,
            Err(err) => return MutationResponse::failed(err.to_string()),
        };
        let tx = SignedTransaction {
            id: TransactionId::generate(),
            payload,
            signatory,
            signature: self.credentials.sign(&payload_bytes),
            block_index: self.chain.last_block_index(),
        };
        match self.pipeline.execute(&tx).await {
            Ok(()) => MutationResponse::ok(success_message),
            Err(err) => {
                info!(tx_id = %tx.id, %err, "Mutation rejected");
                MutationResponse::failed(err.to_string())
            }
        }
    }

    /// The remaining admin mutations (ban, unban, promote, block,
    /// unblock, title, description, delete, leave, join) share one shape:
    /// a typed payload signed by the requesting user, validated and
    /// applied by the pipeline.
    pub async fn submit_mutation(
        &self,
        signatory: &Address,
        payload: FeedPayload,
    ) -> MutationResponse {
        self.execute_mutation(signatory.clone(), payload, "applied")
            .await
    }

    /// Admin adds a member; on success the feed's `last_block_index`
    /// advances, on failure nothing is visible.
    pub async fn add_member_to_group_feed(
        &self,
        request: &AddMemberToGroupFeedRequest,
    ) -> MutationResponse {
        let Ok(feed_id) = FeedId::parse(&request.feed_id) else {
            return MutationResponse::failed("malformed feed id");
        };
        let payload = FeedPayload::AddMemberToGroupFeed(AddMemberToGroupFeed {
            feed_id,
            requester: Address::new(request.admin_public_address.clone()),
            member: Address::new(request.new_member_public_address.clone()),
            member_encrypt_key: EncryptKey::new(request.new_member_public_encrypt_key.clone()),
        });
        self.execute_mutation(
            Address::new(request.admin_public_address.clone()),
            payload,
            "member added",
        )
        .await
    }

    /// Move the caller's read bookmark; monotonic per `(user, feed)`.
    pub fn mark_feed_read(
        &self,
        user: &Address,
        feed_id: FeedId,
        block_index: u64,
    ) -> MutationResponse {
        let current = self.storage.read_position_or_zero(user, feed_id);
        let effective = current.max(block_index);
        let mut uow = self.storage.create_writable();
        let staged = uow.upsert_read_position(&ReadPosition {
            user_address: user.clone(),
            feed_id,
            last_read_block_index: effective,
        });
        if let Err(err) = staged.and_then(|()| uow.commit()) {
            return MutationResponse::failed(err.to_string());
        }
        if let Err(err) = self
            .storage
            .cache()
            .put_read_position(user, feed_id, effective)
        {
            warn!(%feed_id, %user, %err, "Read-position cache update failed");
        }
        MutationResponse::ok("read position updated")
    }

    /// Persist attachment metadata and bytes alongside its message.
    pub fn save_attachment(&self, attachment: &Attachment) -> MutationResponse {
        let mut uow = self.storage.create_writable();
        let staged = uow.create_attachment(attachment);
        match staged.and_then(|()| uow.commit()) {
            Ok(()) => MutationResponse::ok("attachment saved"),
            Err(err) => MutationResponse::failed(err.to_string()),
        }
    }

    /// Stream an attachment in 64 KiB chunks. The requester must be an
    /// active participant of the feed the attachment belongs to; the
    /// first chunk carries the totals.
    pub fn download_attachment(
        &self,
        request: &DownloadAttachmentRequest,
        cancel: CancellationToken,
    ) -> Result<ReceiverStream<AttachmentChunk>, FeedError> {
        let (Ok(attachment_id), Ok(feed_id)) = (
            MessageId::parse(&request.attachment_id),
            FeedId::parse(&request.feed_id),
        ) else {
            return Err(FeedError::NotFound("attachment".into()));
        };
        let requester = Address::new(request.requester_user_address.clone());

        let reader = self.storage.create_read_only();
        if !reader
            .is_user_participant_of_feed(feed_id, &requester)
            .map_err(FeedError::from)?
        {
            return Err(FeedError::PermissionDenied(format!(
                "{requester} is not a participant of {feed_id}"
            )));
        }
        let attachment = reader
            .get_attachment_by_id(attachment_id)
            .map_err(FeedError::from)?
            .ok_or_else(|| FeedError::NotFound(format!("attachment {attachment_id}")))?;
        let message = reader
            .get_message_by_id(attachment.feed_message_id)
            .map_err(FeedError::from)?
            .ok_or_else(|| FeedError::NotFound(format!("attachment {attachment_id}")))?;
        if message.feed_id != feed_id {
            return Err(FeedError::NotFound(format!("attachment {attachment_id}")));
        }

        let bytes = if request.thumbnail_only {
            attachment
                .encrypted_thumbnail
                .ok_or_else(|| FeedError::NotFound(format!("thumbnail {attachment_id}")))?
        } else {
            attachment.encrypted_original
        };

        let chunks = chunk_bytes(&bytes);
        let (sender, receiver) = mpsc::channel(8);
        tokio::spawn(async move {
            for chunk in chunks {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Attachment download cancelled");
                        return;
                    }
                    sent = sender.send(chunk) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        Ok(ReceiverStream::new(receiver))
    }
}

fn bincode_payload(payload: &FeedPayload) -> Result<Vec<u8>, FeedError> {
    bincode::serialize(payload)
        .map_err(|e| FeedError::InvalidArgument(format!("unencodable payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::InMemoryAliasProvider;
    use feeds_pipeline::handlers::HandlerDeps;
    use feeds_rotation::{
        InMemoryBlockchainCache, InMemoryIdentityStore, NodeCredentials, RotationEngine,
    };
    use feeds_storage::test_utils::{group_with_members, message_at, FailingFeedCache};
    use feeds_storage::InMemoryKVStore;
    use shared_bus::InMemoryEventBus;
    use shared_types::{Feed, GroupFeed, Participant, ParticipantRole};
    use tokio_stream::StreamExt;

    struct Harness {
        api: FeedsApi,
        storage: Arc<FeedStorage>,
        identities: Arc<InMemoryIdentityStore>,
        aliases: Arc<InMemoryAliasProvider>,
        chain: Arc<InMemoryBlockchainCache>,
    }

    fn harness_with_storage(storage: Arc<FeedStorage>) -> Harness {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let aliases = Arc::new(InMemoryAliasProvider::new());
        let chain = Arc::new(InMemoryBlockchainCache::at(1));
        let deps = Arc::new(HandlerDeps {
            storage: storage.clone(),
            rotation: Arc::new(RotationEngine::new(
                identities.clone(),
                FeedsConfig::default(),
            )),
            bus: Arc::new(InMemoryEventBus::new()),
            config: FeedsConfig::default(),
        });
        let credentials: Arc<dyn CredentialsProvider> = Arc::new(NodeCredentials::generate());
        let pipeline = Arc::new(TransactionPipeline::with_default_handlers(
            deps,
            credentials.clone(),
        ));
        let api = FeedsApi::new(
            storage.clone(),
            pipeline,
            chain.clone(),
            credentials,
            aliases.clone(),
            FeedsConfig::default(),
        );
        Harness {
            api,
            storage,
            identities,
            aliases,
            chain,
        }
    }

    fn harness() -> Harness {
        harness_with_storage(Arc::new(FeedStorage::in_memory()))
    }

    fn register_identity(h: &Harness, address: &str) {
        let secret = k256::SecretKey::random(&mut rand::thread_rng());
        let recipient = shared_crypto::EciesRecipient::from_public_key(secret.public_key());
        h.identities
            .register(Address::new(address), EncryptKey::new(recipient.to_hex()));
    }

    #[test]
    fn test_list_feeds_titles_per_kind() {
        let h = harness();
        let alice = Address::new("mrrA1ice");
        h.aliases.register(alice.clone(), "Alice");
        h.aliases.register(Address::new("mrrB0b"), "Bob");

        let personal = FeedId::generate();
        let chat = FeedId::generate();
        let group = FeedId::generate();

        let mut uow = h.storage.create_writable();
        uow.create_feed(&Feed {
            id: personal,
            kind: FeedKind::Personal,
            created_at_block: 1,
            last_block_index: 30,
        })
        .unwrap();
        uow.put_participant(&Participant {
            feed_id: personal,
            address: alice.clone(),
            role: ParticipantRole::Admin,
            joined_at_block: 1,
            left_at_block: None,
            last_leave_block: None,
        })
        .unwrap();
        uow.create_feed(&Feed {
            id: chat,
            kind: FeedKind::Chat,
            created_at_block: 1,
            last_block_index: 20,
        })
        .unwrap();
        for address in ["mrrA1ice", "mrrB0b"] {
            uow.put_participant(&Participant {
                feed_id: chat,
                address: Address::new(address),
                role: ParticipantRole::Member,
                joined_at_block: 1,
                left_at_block: None,
                last_leave_block: None,
            })
            .unwrap();
        }
        uow.create_group_feed(
            &Feed {
                id: group,
                kind: FeedKind::Group,
                created_at_block: 1,
                last_block_index: 10,
            },
            &GroupFeed {
                id: group,
                title: "Tech Friends".into(),
                description: String::new(),
                is_public: false,
                current_key_generation: 0,
                is_deleted: false,
            },
        )
        .unwrap();
        uow.put_participant(&Participant {
            feed_id: group,
            address: alice.clone(),
            role: ParticipantRole::Member,
            joined_at_block: 1,
            left_at_block: None,
            last_leave_block: None,
        })
        .unwrap();
        uow.commit().unwrap();

        let response = h
            .api
            .list_feeds_for_address(&GetFeedForAddressRequest {
                profile_public_key: "mrrA1ice".into(),
                block_index: 0,
            })
            .unwrap();

        assert_eq!(response.feeds.len(), 3);
        // Newest activity first.
        let titles: Vec<_> = response.feeds.iter().map(|f| f.feed_title.clone()).collect();
        assert_eq!(titles, vec!["Alice (YOU)", "Bob", "Tech Friends"]);
        assert_eq!(response.feeds[0].feed_type, 1);
        assert_eq!(response.feeds[1].feed_type, 2);
        assert_eq!(response.feeds[2].feed_type, 3);
    }

    #[test]
    fn test_list_feeds_overlay_and_read_position() {
        let h = harness();
        let feed_id = FeedId::generate();
        group_with_members(&h.storage, feed_id, &[("mrrA1ice", ParticipantRole::Admin)]);

        let mut uow = h.storage.create_writable();
        uow.update_feed_block_index(feed_id, 100).unwrap();
        uow.upsert_read_position(&ReadPosition {
            user_address: Address::new("mrrA1ice"),
            feed_id,
            last_read_block_index: 500,
        })
        .unwrap();
        uow.commit().unwrap();
        // The cache carries a fresher value than the durable floor.
        h.storage.cache().put_last_block_index(feed_id, 200).unwrap();

        let response = h
            .api
            .list_feeds_for_address(&GetFeedForAddressRequest {
                profile_public_key: "mrrA1ice".into(),
                block_index: 0,
            })
            .unwrap();
        assert_eq!(response.feeds.len(), 1);
        assert_eq!(response.feeds[0].block_index, 200);
        assert_eq!(response.feeds[0].last_read_block_index, 500);
    }

    #[test]
    fn test_list_feeds_with_failing_cache_degrades() {
        let storage = Arc::new(FeedStorage::new(
            Box::new(InMemoryKVStore::new()),
            Arc::new(FailingFeedCache::new()),
        ));
        let h = harness_with_storage(storage);
        let feed_id = FeedId::generate();
        group_with_members(&h.storage, feed_id, &[("mrrA1ice", ParticipantRole::Admin)]);

        let mut uow = h.storage.create_writable();
        uow.update_feed_block_index(feed_id, 100).unwrap();
        uow.upsert_read_position(&ReadPosition {
            user_address: Address::new("mrrA1ice"),
            feed_id,
            last_read_block_index: 500,
        })
        .unwrap();
        uow.commit().unwrap();

        let response = h
            .api
            .list_feeds_for_address(&GetFeedForAddressRequest {
                profile_public_key: "mrrA1ice".into(),
                block_index: 0,
            })
            .unwrap();
        // Durable block index; zero bookmark.
        assert_eq!(response.feeds[0].block_index, 100);
        assert_eq!(response.feeds[0].last_read_block_index, 0);
    }

    #[test]
    fn test_get_message_by_id_not_found_shapes() {
        let h = harness();
        let feed_id = FeedId::generate();
        let other_feed = FeedId::generate();

        let mut uow = h.storage.create_writable();
        let message = message_at(feed_id, 42);
        uow.create_feed_message(&message).unwrap();
        uow.commit().unwrap();

        // Malformed ids.
        let response = h.api.get_message_by_id(&GetMessageByIdRequest {
            feed_id: "not-a-uuid".into(),
            message_id: message.id.to_string(),
        });
        assert!(!response.success);

        // Cross-feed mismatch.
        let response = h.api.get_message_by_id(&GetMessageByIdRequest {
            feed_id: other_feed.to_string(),
            message_id: message.id.to_string(),
        });
        assert!(!response.success);

        // The real thing.
        let response = h.api.get_message_by_id(&GetMessageByIdRequest {
            feed_id: feed_id.to_string(),
            message_id: message.id.to_string(),
        });
        assert!(response.success);
        assert_eq!(
            response.message.unwrap().block_index,
            42
        );
    }

    #[test]
    fn test_feed_messages_reject_non_participant() {
        let h = harness();
        let feed_id = FeedId::generate();
        group_with_members(&h.storage, feed_id, &[("mrrA1ice", ParticipantRole::Admin)]);
        let mut uow = h.storage.create_writable();
        for block in 1..=5 {
            uow.create_feed_message(&message_at(feed_id, block)).unwrap();
        }
        uow.commit().unwrap();

        let response = h
            .api
            .get_feed_messages_by_id(&GetFeedMessagesByIdRequest {
                feed_id: feed_id.to_string(),
                user_address: "mrrOutsider".into(),
                before_block_index: None,
                limit: None,
            })
            .unwrap();
        assert!(response.messages.is_empty());
        assert!(!response.has_more_messages);

        let response = h
            .api
            .get_feed_messages_by_id(&GetFeedMessagesByIdRequest {
                feed_id: feed_id.to_string(),
                user_address: "mrrA1ice".into(),
                before_block_index: None,
                limit: Some(3),
            })
            .unwrap();
        assert_eq!(response.messages.len(), 3);
        assert!(response.has_more_messages);
        assert_eq!(response.newest_block_index, 5);
        assert_eq!(response.oldest_block_index, 3);
    }

    #[test]
    fn test_feed_messages_limit_is_capped() {
        let h = harness();
        let feed_id = FeedId::generate();
        group_with_members(&h.storage, feed_id, &[("mrrA1ice", ParticipantRole::Admin)]);
        let mut uow = h.storage.create_writable();
        for block in 1..=120 {
            uow.create_feed_message(&message_at(feed_id, block)).unwrap();
        }
        uow.commit().unwrap();

        let response = h
            .api
            .get_feed_messages_by_id(&GetFeedMessagesByIdRequest {
                feed_id: feed_id.to_string(),
                user_address: "mrrA1ice".into(),
                before_block_index: None,
                limit: Some(10_000),
            })
            .unwrap();
        // Clamped to the configured ceiling.
        assert_eq!(response.messages.len(), 100);
    }

    #[tokio::test]
    async fn test_add_member_mutation_roundtrip() {
        let h = harness();
        for member in ["mrrA1ice", "mrrB0b", "mrrD4ve"] {
            register_identity(&h, member);
        }
        let feed_id = FeedId::generate();
        group_with_members(
            &h.storage,
            feed_id,
            &[
                ("mrrA1ice", ParticipantRole::Admin),
                ("mrrB0b", ParticipantRole::Member),
            ],
        );
        h.chain.set(500);

        let response = h
            .api
            .add_member_to_group_feed(&AddMemberToGroupFeedRequest {
                feed_id: feed_id.to_string(),
                admin_public_address: "mrrA1ice".into(),
                new_member_public_address: "mrrD4ve".into(),
                new_member_public_encrypt_key: "02abcd".into(),
            })
            .await;
        assert!(response.success, "{}", response.message);

        let reader = h.storage.create_read_only();
        assert!(reader
            .is_user_participant_of_feed(feed_id, &Address::new("mrrD4ve"))
            .unwrap());
        assert_eq!(
            reader.get_feed(feed_id).unwrap().unwrap().last_block_index,
            500
        );
    }

    #[tokio::test]
    async fn test_add_member_failure_reports_key_distribution() {
        let h = harness();
        for member in ["mrrA1ice", "mrrB0b"] {
            register_identity(&h, member);
        }
        let feed_id = FeedId::generate();
        group_with_members(
            &h.storage,
            feed_id,
            &[
                ("mrrA1ice", ParticipantRole::Admin),
                ("mrrB0b", ParticipantRole::Member),
            ],
        );
        h.chain.set(500);

        // mrrD4ve has no identity record.
        let response = h
            .api
            .add_member_to_group_feed(&AddMemberToGroupFeedRequest {
                feed_id: feed_id.to_string(),
                admin_public_address: "mrrA1ice".into(),
                new_member_public_address: "mrrD4ve".into(),
                new_member_public_encrypt_key: "02abcd".into(),
            })
            .await;
        assert!(!response.success);
        assert!(response.message.contains("key distribution failed"));

        let reader = h.storage.create_read_only();
        assert_eq!(
            reader.get_feed(feed_id).unwrap().unwrap().last_block_index,
            1
        );
    }

    #[test]
    fn test_key_generations_only_for_holder() {
        let h = harness();
        let feed_id = FeedId::generate();
        let mut uow = h.storage.create_writable();
        uow.create_key_rotation(&shared_types::KeyRotationPayload {
            feed_id,
            new_version: 1,
            previous_version: 0,
            valid_from_block: 5,
            trigger: shared_types::RotationTrigger::Join,
            wrapped: vec![
                shared_types::WrappedKey {
                    feed_id,
                    version: 1,
                    member_address: Address::new("mrrA1ice"),
                    ciphertext: vec![0xAA; 93],
                },
                shared_types::WrappedKey {
                    feed_id,
                    version: 1,
                    member_address: Address::new("mrrB0b"),
                    ciphertext: vec![0xBB; 93],
                },
            ],
        })
        .unwrap();
        uow.commit().unwrap();

        let response = h
            .api
            .get_key_generations(&GetKeyGenerationsRequest {
                feed_id: feed_id.to_string(),
                user_public_address: "mrrA1ice".into(),
            })
            .unwrap();
        assert_eq!(response.key_generations.len(), 1);
        assert_eq!(response.key_generations[0].key_generation, 1);
        assert_eq!(response.key_generations[0].encrypted_key, vec![0xAA; 93]);
    }

    #[tokio::test]
    async fn test_download_attachment_stream() {
        let h = harness();
        let feed_id = FeedId::generate();
        group_with_members(&h.storage, feed_id, &[("mrrA1ice", ParticipantRole::Admin)]);

        let message = message_at(feed_id, 9);
        let attachment_id = MessageId::generate();
        let payload = vec![0x5Au8; crate::ATTACHMENT_CHUNK_SIZE + 500];
        let mut uow = h.storage.create_writable();
        uow.create_feed_message(&message).unwrap();
        uow.create_attachment(&Attachment {
            id: attachment_id,
            feed_message_id: message.id,
            encrypted_original: payload.clone(),
            encrypted_thumbnail: None,
            mime_type: "image/jpeg".into(),
            file_name: "photo.jpg.enc".into(),
            content_hash: "abc123".into(),
            original_size: payload.len() as u64,
            thumbnail_size: 0,
            created_at: 1,
        })
        .unwrap();
        uow.commit().unwrap();

        let stream = h
            .api
            .download_attachment(
                &DownloadAttachmentRequest {
                    attachment_id: attachment_id.to_string(),
                    feed_id: feed_id.to_string(),
                    requester_user_address: "mrrA1ice".into(),
                    thumbnail_only: false,
                },
                CancellationToken::new(),
            )
            .unwrap();
        let chunks: Vec<AttachmentChunk> = stream.collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].total_chunks, 2);
        assert_eq!(chunks[0].total_size, payload.len() as u64);
        assert_eq!(chunks[1].total_chunks, 0);
        let reassembled: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        assert_eq!(reassembled, payload);
    }

    #[tokio::test]
    async fn test_download_attachment_auth_and_404() {
        let h = harness();
        let feed_id = FeedId::generate();
        group_with_members(&h.storage, feed_id, &[("mrrA1ice", ParticipantRole::Admin)]);

        // Non-participant.
        let err = h
            .api
            .download_attachment(
                &DownloadAttachmentRequest {
                    attachment_id: MessageId::generate().to_string(),
                    feed_id: feed_id.to_string(),
                    requester_user_address: "mrrOutsider".into(),
                    thumbnail_only: false,
                },
                CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, FeedError::PermissionDenied(_)));

        // Participant, absent attachment.
        let err = h
            .api
            .download_attachment(
                &DownloadAttachmentRequest {
                    attachment_id: MessageId::generate().to_string(),
                    feed_id: feed_id.to_string(),
                    requester_user_address: "mrrA1ice".into(),
                    thumbnail_only: false,
                },
                CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
    }

    #[test]
    fn test_mark_feed_read_is_monotonic() {
        let h = harness();
        let feed_id = FeedId::generate();
        let alice = Address::new("mrrA1ice");
        group_with_members(&h.storage, feed_id, &[("mrrA1ice", ParticipantRole::Admin)]);

        assert!(h.api.mark_feed_read(&alice, feed_id, 300).success);
        assert!(h.api.mark_feed_read(&alice, feed_id, 100).success);
        assert_eq!(h.storage.read_position_or_zero(&alice, feed_id), 300);
    }
}
