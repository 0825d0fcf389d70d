//! # Group Lifecycle Scenarios
//!
//! Creation, governance, and the admin-only boundary, driven through the
//! full pipeline the way block application drives it.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::TestNode;
    use feeds_pipeline::payloads::{
        DeleteGroupFeed, FeedPayload, UpdateGroupFeedDescription, UpdateGroupFeedTitle,
    };
    use feeds_storage::FeedReads;
    use shared_bus::{EventFilter, FeedEvent};
    use shared_types::{Address, FeedError, FeedId, FeedKind, ParticipantRole};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_group_creation_roles_keys_and_event() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol"] {
            harness.register_member(member);
        }
        let mut events = harness.node.bus.subscribe(EventFilter::all());
        let feed_id = FeedId::generate();

        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b", "mrrC4rol"], 10)
            .await
            .unwrap();

        let reader = harness.node.storage.create_read_only();
        for (member, expected) in [
            ("mrrA1ice", ParticipantRole::Admin),
            ("mrrB0b", ParticipantRole::Member),
            ("mrrC4rol", ParticipantRole::Member),
        ] {
            let row = reader
                .get_participant_with_history(feed_id, &Address::new(member))
                .unwrap()
                .unwrap();
            assert_eq!(row.role, expected, "{member}");
        }

        assert_eq!(reader.get_max_key_generation(feed_id).unwrap(), Some(0));
        assert_eq!(
            reader.get_wrapped_keys_for_version(feed_id, 0).unwrap().len(),
            3
        );

        let event = timeout(Duration::from_millis(200), events.recv())
            .await
            .expect("event timeout")
            .expect("event");
        match event {
            FeedEvent::FeedCreated {
                feed_id: created,
                feed_kind,
                participants,
                ..
            } => {
                assert_eq!(created, feed_id);
                assert_eq!(feed_kind, FeedKind::Group);
                let names: Vec<_> = participants.iter().map(|a| a.as_str()).collect();
                assert_eq!(names, vec!["mrrA1ice", "mrrB0b", "mrrC4rol"]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_admin_only_mutations_reject_without_state_change() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b", "mrrC4rol"], 10)
            .await
            .unwrap();

        // Every admin action attempted by a plain member.
        let attempts: Vec<FeedPayload> = vec![
            FeedPayload::BanFromGroupFeed(TestNode::change(feed_id, "mrrB0b", "mrrC4rol")),
            FeedPayload::UnbanFromGroupFeed(TestNode::change(feed_id, "mrrB0b", "mrrC4rol")),
            FeedPayload::PromoteToAdmin(TestNode::change(feed_id, "mrrB0b", "mrrC4rol")),
            FeedPayload::BlockMember(TestNode::change(feed_id, "mrrB0b", "mrrC4rol")),
            FeedPayload::UnblockMember(TestNode::change(feed_id, "mrrB0b", "mrrC4rol")),
            FeedPayload::UpdateGroupFeedTitle(UpdateGroupFeedTitle {
                feed_id,
                requester: Address::new("mrrB0b"),
                title: "Hijacked".into(),
            }),
            FeedPayload::UpdateGroupFeedDescription(UpdateGroupFeedDescription {
                feed_id,
                requester: Address::new("mrrB0b"),
                description: "Hijacked".into(),
            }),
            FeedPayload::DeleteGroupFeed(DeleteGroupFeed {
                feed_id,
                requester: Address::new("mrrB0b"),
            }),
        ];
        for payload in attempts {
            let err = harness.execute(payload, "mrrB0b", 20).await.unwrap_err();
            assert!(
                matches!(err, FeedError::PermissionDenied(_)),
                "expected permission denial, got {err:?}"
            );
        }

        let reader = harness.node.storage.create_read_only();
        let group = reader.get_group_feed(feed_id).unwrap().unwrap();
        assert_eq!(group.title, "Tech Friends");
        assert!(!group.is_deleted);
        assert_eq!(
            reader.get_feed(feed_id).unwrap().unwrap().last_block_index,
            10
        );
        assert_eq!(reader.get_max_key_generation(feed_id).unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_block_mutes_without_rotation_and_unblock_restores() {
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
                feeds_pipeline::payloads::FeedPayload::BlockMember(TestNode::change(
                    feed_id, "mrrA1ice", "mrrB0b",
                )),
                "mrrA1ice",
                20,
            )
            .await
            .unwrap();

        // Blocking is non-cryptographic: no new generation.
        let reader = harness.node.storage.create_read_only();
        assert_eq!(reader.get_max_key_generation(feed_id).unwrap(), Some(0));
        drop(reader);

        let err = harness
            .send_message(feed_id, "mrrB0b", 0, 21)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::PermissionDenied(_)));

        harness
            .execute(
                feeds_pipeline::payloads::FeedPayload::UnblockMember(TestNode::change(
                    feed_id, "mrrA1ice", "mrrB0b",
                )),
                "mrrA1ice",
                22,
            )
            .await
            .unwrap();
        harness.send_message(feed_id, "mrrB0b", 0, 23).await.unwrap();
    }

    #[tokio::test]
    async fn test_promoted_member_gains_admin_rights() {
        let mut harness = TestNode::new();
        for member in ["mrrA1ice", "mrrB0b", "mrrC4rol"] {
            harness.register_member(member);
        }
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Tech Friends", &["mrrA1ice", "mrrB0b", "mrrC4rol"], 10)
            .await
            .unwrap();

        harness
            .execute(
                FeedPayload::PromoteToAdmin(TestNode::change(feed_id, "mrrA1ice", "mrrB0b")),
                "mrrA1ice",
                20,
            )
            .await
            .unwrap();

        // The new admin can now govern.
        harness
            .execute(
                FeedPayload::UpdateGroupFeedTitle(UpdateGroupFeedTitle {
                    feed_id,
                    requester: Address::new("mrrB0b"),
                    title: "Renamed by Bob".into(),
                }),
                "mrrB0b",
                30,
            )
            .await
            .unwrap();

        let reader = harness.node.storage.create_read_only();
        assert_eq!(
            reader.get_group_feed(feed_id).unwrap().unwrap().title,
            "Renamed by Bob"
        );
    }

    #[tokio::test]
    async fn test_deleted_group_rejects_messages_and_double_delete() {
        let mut harness = TestNode::new();
        harness.register_member("mrrA1ice");
        let feed_id = FeedId::generate();
        harness
            .create_group(feed_id, "Ephemeral", &["mrrA1ice"], 10)
            .await
            .unwrap();

        harness
            .execute(
                FeedPayload::DeleteGroupFeed(DeleteGroupFeed {
                    feed_id,
                    requester: Address::new("mrrA1ice"),
                }),
                "mrrA1ice",
                20,
            )
            .await
            .unwrap();

        let err = harness
            .send_message(feed_id, "mrrA1ice", 0, 21)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::FailedPrecondition(_)));

        let err = harness
            .execute(
                FeedPayload::DeleteGroupFeed(DeleteGroupFeed {
                    feed_id,
                    requester: Address::new("mrrA1ice"),
                }),
                "mrrA1ice",
                22,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::FailedPrecondition(_)));
    }
}
