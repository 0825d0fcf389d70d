//! # Overlay and Listing Scenarios
//!
//! The storage overlay as clients observe it: maximum-wins block indexes,
//! read bookmarks, degraded cache behavior, pagination authorization, and
//! attachment streaming totals.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::TestNode;
    use feeds_api::wire::{
        DownloadAttachmentRequest, GetFeedForAddressRequest, GetFeedMessagesByIdRequest,
        GetKeyGenerationsRequest,
    };
    use feeds_api::ATTACHMENT_CHUNK_SIZE;
    use feeds_storage::test_utils::FailingFeedCache;
    use feeds_storage::{FeedStorage, InMemoryKVStore};
    use shared_types::{Address, Attachment, FeedId, MessageId};
    use std::sync::Arc;
    use tokio_stream::StreamExt;
    use tokio_util::sync::CancellationToken;

    /// Durable floor 100, cached 200, bookmark 500: the listing reports
    /// the cache-fresh block index and the durable bookmark.
    #[tokio::test]
    async fn test_overlay_prefers_fresher_cache_value() {
        let mut harness = TestNode::new();
        harness.register_member("mrrA1ice");
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice"], 100)
            .await
            .unwrap();
        assert!(harness
            .node
            .api
            .mark_feed_read(&Address::new("mrrA1ice"), feed_id, 500)
            .success);
        harness.seed_cache_block_index(feed_id, 200);

        let response = harness
            .node
            .api
            .list_feeds_for_address(&GetFeedForAddressRequest {
                profile_public_key: "mrrA1ice".into(),
                block_index: 0,
            })
            .unwrap();
        assert_eq!(response.feeds.len(), 1);
        assert_eq!(response.feeds[0].block_index, 200);
        assert_eq!(response.feeds[0].last_read_block_index, 500);
        assert_eq!(response.feeds[0].feed_title, "Tech Friends");
    }

    /// The same state with a throwing cache degrades to the durable block
    /// index and a zero bookmark.
    #[tokio::test]
    async fn test_overlay_with_throwing_cache_degrades() {
        let storage = Arc::new(FeedStorage::new(
            Box::new(InMemoryKVStore::new()),
            Arc::new(FailingFeedCache::new()),
        ));
        let mut harness = TestNode::with_storage(storage);
        harness.register_member("mrrA1ice");
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice"], 100)
            .await
            .unwrap();
        assert!(harness
            .node
            .api
            .mark_feed_read(&Address::new("mrrA1ice"), feed_id, 500)
            .success);

        let response = harness
            .node
            .api
            .list_feeds_for_address(&GetFeedForAddressRequest {
                profile_public_key: "mrrA1ice".into(),
                block_index: 0,
            })
            .unwrap();
        assert_eq!(response.feeds[0].block_index, 100);
        assert_eq!(response.feeds[0].last_read_block_index, 0);
    }

    /// Durable can only raise the overlaid value, never lower it.
    #[tokio::test]
    async fn test_overlay_maximum_wins_both_ways() {
        let mut harness = TestNode::new();
        harness.register_member("mrrA1ice");
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice"], 100)
            .await
            .unwrap();

        // Cache behind the durable floor: durable wins.
        harness.seed_cache_block_index(feed_id, 50);
        assert_eq!(
            harness.node.storage.last_block_index_overlaid(feed_id, 100),
            100
        );

        // Cache ahead: cache wins.
        harness.seed_cache_block_index(feed_id, 200);
        assert_eq!(
            harness.node.storage.last_block_index_overlaid(feed_id, 100),
            200
        );
    }

    #[tokio::test]
    async fn test_pagination_and_participant_authorization() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b"], 10)
            .await
            .unwrap();
        for block in 11..=30u64 {
            harness
                .send_message(feed_id, "mrrA1ice", 0, block)
                .await
                .unwrap();
        }

        // Latest window.
        let page = harness
            .node
            .api
            .get_feed_messages_by_id(&GetFeedMessagesByIdRequest {
                feed_id: feed_id.to_string(),
                user_address: "mrrB0b".into(),
                before_block_index: None,
                limit: Some(5),
            })
            .unwrap();
        assert_eq!(page.messages.len(), 5);
        assert_eq!(page.newest_block_index, 30);
        assert_eq!(page.oldest_block_index, 26);
        assert!(page.has_more_messages);

        // Older page, descending before the boundary.
        let older = harness
            .node
            .api
            .get_feed_messages_by_id(&GetFeedMessagesByIdRequest {
                feed_id: feed_id.to_string(),
                user_address: "mrrB0b".into(),
                before_block_index: Some(26),
                limit: Some(5),
            })
            .unwrap();
        assert_eq!(older.newest_block_index, 25);
        assert_eq!(older.oldest_block_index, 21);

        // A non-participant gets an empty page.
        let outsider = harness
            .node
            .api
            .get_feed_messages_by_id(&GetFeedMessagesByIdRequest {
                feed_id: feed_id.to_string(),
                user_address: "mrrOutsider".into(),
                before_block_index: None,
                limit: None,
            })
            .unwrap();
        assert!(outsider.messages.is_empty());
        assert!(!outsider.has_more_messages);
    }

    #[tokio::test]
    async fn test_key_generations_visible_only_to_holders() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b"], 10)
            .await
            .unwrap();
        harness
            .add_member(feed_id, "mrrA1ice", "mrrC4rol", 20)
            .await
            .unwrap();

        // Alice holds generations 0 and 1; carol only 1.
        let alice = harness
            .node
            .api
            .get_key_generations(&GetKeyGenerationsRequest {
                feed_id: feed_id.to_string(),
                user_public_address: "mrrA1ice".into(),
            })
            .unwrap();
        let versions: Vec<u32> = alice
            .key_generations
            .iter()
            .map(|k| k.key_generation)
            .collect();
        assert_eq!(versions, vec![0, 1]);

        let carol = harness
            .node
            .api
            .get_key_generations(&GetKeyGenerationsRequest {
                feed_id: feed_id.to_string(),
                user_public_address: "mrrC4rol".into(),
            })
            .unwrap();
        let versions: Vec<u32> = carol
            .key_generations
            .iter()
            .map(|k| k.key_generation)
            .collect();
        assert_eq!(versions, vec![1]);
    }

    #[tokio::test]
    async fn test_attachment_streaming_totals_and_reassembly() {
        let mut harness = TestNode::new();
        harness.register_member("mrrA1ice");
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice"], 10)
            .await
            .unwrap();
        let message_id = harness
            .send_message(feed_id, "mrrA1ice", 0, 11)
            .await
            .unwrap();

        let attachment_id = MessageId::generate();
        let payload = vec![0x7Cu8; ATTACHMENT_CHUNK_SIZE * 3 + 123];
        assert!(harness
            .node
            .api
            .save_attachment(&Attachment {
                id: attachment_id,
                feed_message_id: message_id,
                encrypted_original: payload.clone(),
                encrypted_thumbnail: Some(vec![0x11; 256]),
                mime_type: "image/jpeg".into(),
                file_name: "photo.jpg.enc".into(),
                content_hash: "deadbeef".into(),
                original_size: payload.len() as u64,
                thumbnail_size: 256,
                created_at: 1,
            })
            .success);

        let stream = harness
            .node
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
        let chunks: Vec<_> = stream.collect().await;

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 4);
        assert_eq!(chunks[0].total_size, payload.len() as u64);
        for (index, chunk) in chunks.iter().enumerate().skip(1) {
            assert_eq!(chunk.chunk_index, index as u32);
            assert_eq!(chunk.total_chunks, 0);
            assert_eq!(chunk.total_size, 0);
        }
        let reassembled: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        assert_eq!(reassembled, payload);

        // Thumbnail stream is served separately.
        let thumb: Vec<_> = harness
            .node
            .api
            .download_attachment(
                &DownloadAttachmentRequest {
                    attachment_id: attachment_id.to_string(),
                    feed_id: feed_id.to_string(),
                    requester_user_address: "mrrA1ice".into(),
                    thumbnail_only: true,
                },
                CancellationToken::new(),
            )
            .unwrap()
            .collect()
            .await;
        assert_eq!(thumb.len(), 1);
        assert_eq!(thumb[0].total_size, 256);
    }

    #[tokio::test]
    async fn test_temp_store_delete_is_idempotent() {
        let harness = TestNode::new();
        let id = MessageId::generate();
        harness
            .node
            .attachments
            .save(id, b"staged bytes", None)
            .unwrap();

        harness.node.attachments.delete(id).unwrap();
        // Deleting an attachment that no longer exists still succeeds.
        harness.node.attachments.delete(id).unwrap();
        assert!(harness.node.attachments.retrieve(id).unwrap().is_none());
    }
}
