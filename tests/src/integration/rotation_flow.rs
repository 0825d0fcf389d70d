//! # Rotation Scenarios
//!
//! Key generations across membership changes: coverage, exclusion,
//! monotonicity, the grace window, and rollback on key-distribution
//! failure.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::TestNode;
    use feeds_api::wire::AddMemberToGroupFeedRequest;
    use feeds_pipeline::payloads::FeedPayload;
    use feeds_storage::FeedReads;
    use shared_crypto::ecies_decrypt;
    use shared_types::{Address, FeedError, FeedId, RotationTrigger};

    fn wrapped_members(harness: &TestNode, feed_id: FeedId, version: u32) -> Vec<String> {
        let reader = harness.node.storage.create_read_only();
        let mut members: Vec<String> = reader
            .get_wrapped_keys_for_version(feed_id, version)
            .unwrap()
            .into_iter()
            .map(|w| w.member_address.as_str().to_owned())
            .collect();
        members.sort();
        members
    }

    #[tokio::test]
    async fn test_admin_add_rotates_with_full_coverage() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol", "mrrD4ve"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b", "mrrC4rol"], 10)
            .await
            .unwrap();

        harness
            .add_member(feed_id, "mrrA1ice", "mrrD4ve", 500)
            .await
            .unwrap();

        let reader = harness.node.storage.create_read_only();
        let generation = reader.get_key_generation(feed_id, 1).unwrap().unwrap();
        assert_eq!(generation.valid_from_block, 500);
        assert_eq!(generation.trigger, RotationTrigger::Join);
        assert_eq!(reader.get_max_key_generation(feed_id).unwrap(), Some(1));
        assert_eq!(
            reader.get_feed(feed_id).unwrap().unwrap().last_block_index,
            500
        );
        drop(reader);

        assert_eq!(
            wrapped_members(&harness, feed_id, 1),
            vec!["mrrA1ice", "mrrB0b", "mrrC4rol", "mrrD4ve"]
        );

        // Every member unwraps the same fresh group key.
        let reader = harness.node.storage.create_read_only();
        let wrapped = reader.get_wrapped_keys_for_version(feed_id, 1).unwrap();
        let mut recovered: Vec<Vec<u8>> = Vec::new();
        for key in &wrapped {
            let secret = harness.secret_for(key.member_address.as_str());
            recovered.push(ecies_decrypt(secret, &key.ciphertext).unwrap());
        }
        assert!(recovered.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(recovered[0].len(), 32);
    }

    #[tokio::test]
    async fn test_add_without_identity_rolls_back_via_api() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b", "mrrC4rol"], 10)
            .await
            .unwrap();
        harness.node.chain.set(500);

        // mrrD4ve never registered an identity.
        let response = harness
            .node
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

        let reader = harness.node.storage.create_read_only();
        assert!(reader
            .get_participant_with_history(feed_id, &Address::new("mrrD4ve"))
            .unwrap()
            .is_none());
        assert_eq!(
            reader.get_feed(feed_id).unwrap().unwrap().last_block_index,
            10
        );
        assert_eq!(reader.get_max_key_generation(feed_id).unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_ban_excludes_and_stays_excluded() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol", "mrrD4ve", "mrrEve"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b", "mrrC4rol"], 10)
            .await
            .unwrap();
        harness
            .add_member(feed_id, "mrrA1ice", "mrrD4ve", 500)
            .await
            .unwrap();

        harness
            .execute(
                FeedPayload::BanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                600,
            )
            .await
            .unwrap();

        let reader = harness.node.storage.create_read_only();
        let generation = reader.get_key_generation(feed_id, 2).unwrap().unwrap();
        assert_eq!(generation.trigger, RotationTrigger::Ban);
        drop(reader);
        assert_eq!(
            wrapped_members(&harness, feed_id, 2),
            vec!["mrrA1ice", "mrrC4rol", "mrrD4ve"]
        );

        // The banned member cannot send under any generation.
        for generation in [0u32, 1, 2] {
            let err = harness
                .send_message(feed_id, "mrrB0b", generation, 601)
                .await
                .unwrap_err();
            assert!(matches!(err, FeedError::PermissionDenied(_)));
        }

        // Later rotations keep excluding the banned member.
        harness
            .add_member(feed_id, "mrrA1ice", "mrrEve", 700)
            .await
            .unwrap();
        assert_eq!(
            wrapped_members(&harness, feed_id, 3),
            vec!["mrrA1ice", "mrrC4rol", "mrrD4ve", "mrrEve"]
        );

        // The excluded member holds no wrapped key at or above the ban.
        let reader = harness.node.storage.create_read_only();
        let bobs = reader
            .get_wrapped_keys_for_member(feed_id, &Address::new("mrrB0b"))
            .unwrap();
        assert!(bobs.iter().all(|w| w.version < 2));
    }

    #[tokio::test]
    async fn test_unban_reincludes_in_fresh_generation() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b"], 10)
            .await
            .unwrap();

        harness
            .execute(
                FeedPayload::BanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                20,
            )
            .await
            .unwrap();
        harness
            .execute(
                FeedPayload::UnbanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                30,
            )
            .await
            .unwrap();

        let reader = harness.node.storage.create_read_only();
        let generation = reader.get_key_generation(feed_id, 2).unwrap().unwrap();
        assert_eq!(generation.trigger, RotationTrigger::Unban);
        drop(reader);
        assert_eq!(
            wrapped_members(&harness, feed_id, 2),
            vec!["mrrA1ice", "mrrB0b"]
        );

        // Readmitted members send again under the new generation.
        harness.send_message(feed_id, "mrrB0b", 2, 31).await.unwrap();
    }

    #[tokio::test]
    async fn test_generation_versions_are_dense_and_monotonic() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol", "mrrD4ve"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice"], 10)
            .await
            .unwrap();

        harness.add_member(feed_id, "mrrA1ice", "mrrB0b", 20).await.unwrap();
        harness.add_member(feed_id, "mrrA1ice", "mrrC4rol", 30).await.unwrap();
        harness
            .execute(
                FeedPayload::BanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                40,
            )
            .await
            .unwrap();
        harness.add_member(feed_id, "mrrA1ice", "mrrD4ve", 50).await.unwrap();

        let reader = harness.node.storage.create_read_only();
        let versions: Vec<u32> = reader
            .get_all_key_generations(feed_id)
            .unwrap()
            .iter()
            .map(|g| g.version)
            .collect();
        assert_eq!(versions, vec![0, 1, 2, 3, 4]);
        assert_eq!(reader.get_max_key_generation(feed_id).unwrap(), Some(4));
    }

    #[tokio::test]
    async fn grace_window_boundary() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice"], 5)
            .await
            .unwrap();

        // Five real membership rotations, the last at block 100.
        harness.add_member(feed_id, "mrrA1ice", "mrrB0b", 20).await.unwrap(); // v1
        harness
            .execute(
                FeedPayload::BanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                40,
            )
            .await
            .unwrap(); // v2
        harness
            .execute(
                FeedPayload::UnbanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                60,
            )
            .await
            .unwrap(); // v3
        harness
            .execute(
                FeedPayload::BanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                80,
            )
            .await
            .unwrap(); // v4
        harness
            .execute(
                FeedPayload::UnbanFromGroupFeed(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                100,
            )
            .await
            .unwrap(); // v5, valid from block 100

        let reader = harness.node.storage.create_read_only();
        assert_eq!(reader.get_max_key_generation(feed_id).unwrap(), Some(5));
        assert_eq!(
            reader
                .get_key_generation(feed_id, 5)
                .unwrap()
                .unwrap()
                .valid_from_block,
            100
        );
        drop(reader);

        // Previous generation: accepted through block 104, rejected at 105.
        harness.send_message(feed_id, "mrrA1ice", 4, 104).await.unwrap();
        let err = harness
            .send_message(feed_id, "mrrA1ice", 4, 105)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::FailedPrecondition(_)));

        // Older and future generations never pass.
        assert!(harness.send_message(feed_id, "mrrA1ice", 3, 104).await.is_err());
        assert!(harness.send_message(feed_id, "mrrA1ice", 6, 104).await.is_err());

        // The current generation always passes.
        harness.send_message(feed_id, "mrrA1ice", 5, 105).await.unwrap();
    }
}
