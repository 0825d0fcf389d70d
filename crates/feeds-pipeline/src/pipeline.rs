//! # Transaction Pipeline
//!
//! The two-phase `validate -> apply` engine. Holds exactly one content
//! handler and one transaction handler per payload kind; duplicate
//! registration is a programming error that fails loudly at startup, and
//! an unrecognized kind is rejected at the edge.

use crate::handlers::apply::{
    BanFromGroupFeedApply, DeleteGroupFeedApply, GroupFeedKeyRotationApply, LeaveGroupFeedApply,
    MemberJoinApply, MetadataUpdateApply, NewGroupFeedApply, NewGroupFeedMessageApply,
    RoleChangeApply, UnbanFromGroupFeedApply,
};
use crate::handlers::content::{
    AddMemberContent, BanFromGroupFeedContent, BlockMemberContent, DeleteGroupFeedContent,
    GroupFeedKeyRotationContent, JoinGroupFeedContent, LeaveGroupFeedContent,
    NewGroupFeedContent, NewGroupFeedMessageContent, PromoteToAdminContent,
    UnbanFromGroupFeedContent, UnblockMemberContent, UpdateGroupFeedDescriptionContent,
    UpdateGroupFeedTitleContent,
};
use crate::handlers::{ContentHandler, HandlerDeps, TransactionHandler, ValidationContext};
use crate::payloads::{FeedPayload, PayloadKind};
use feeds_rotation::CredentialsProvider;
use feeds_storage::FeedReads;
use shared_types::{FeedError, SignedTransaction};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The kind-keyed dispatch engine.
pub struct TransactionPipeline {
    content: HashMap<PayloadKind, Arc<dyn ContentHandler>>,
    transaction: HashMap<PayloadKind, Arc<dyn TransactionHandler>>,
    deps: Arc<HandlerDeps>,
    credentials: Arc<dyn CredentialsProvider>,
}

impl TransactionPipeline {
    /// An empty pipeline; register handlers before executing.
    pub fn new(deps: Arc<HandlerDeps>, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            content: HashMap::new(),
            transaction: HashMap::new(),
            deps,
            credentials,
        }
    }

    /// A pipeline with all fourteen payload kinds registered.
    pub fn with_default_handlers(
        deps: Arc<HandlerDeps>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        let mut pipeline = Self::new(deps.clone(), credentials);
        pipeline.register(
            Arc::new(NewGroupFeedContent),
            Arc::new(NewGroupFeedApply::new(deps.clone())),
        );
        pipeline.register(
            Arc::new(AddMemberContent),
            Arc::new(MemberJoinApply::add_member(deps.clone())),
        );
        pipeline.register(
            Arc::new(JoinGroupFeedContent),
            Arc::new(MemberJoinApply::self_join(deps.clone())),
        );
        pipeline.register(
            Arc::new(LeaveGroupFeedContent),
            Arc::new(LeaveGroupFeedApply::new(deps.clone())),
        );
        pipeline.register(
            Arc::new(BanFromGroupFeedContent),
            Arc::new(BanFromGroupFeedApply::new(deps.clone())),
        );
        pipeline.register(
            Arc::new(UnbanFromGroupFeedContent),
            Arc::new(UnbanFromGroupFeedApply::new(deps.clone())),
        );
        pipeline.register(
            Arc::new(PromoteToAdminContent),
            Arc::new(RoleChangeApply::promote(deps.clone())),
        );
        pipeline.register(
            Arc::new(BlockMemberContent),
            Arc::new(RoleChangeApply::block(deps.clone())),
        );
        pipeline.register(
            Arc::new(UnblockMemberContent),
            Arc::new(RoleChangeApply::unblock(deps.clone())),
        );
        pipeline.register(
            Arc::new(UpdateGroupFeedTitleContent),
            Arc::new(MetadataUpdateApply::title(deps.clone())),
        );
        pipeline.register(
            Arc::new(UpdateGroupFeedDescriptionContent),
            Arc::new(MetadataUpdateApply::description(deps.clone())),
        );
        pipeline.register(
            Arc::new(DeleteGroupFeedContent),
            Arc::new(DeleteGroupFeedApply::new(deps.clone())),
        );
        pipeline.register(
            Arc::new(GroupFeedKeyRotationContent),
            Arc::new(GroupFeedKeyRotationApply::new(deps.clone())),
        );
        pipeline.register(
            Arc::new(NewGroupFeedMessageContent),
            Arc::new(NewGroupFeedMessageApply::new(deps)),
        );
        pipeline
    }

    /// Register the handler pair for one kind.
    ///
    /// # Panics
    ///
    /// Panics when the pair disagrees on its kind or the kind is already
    /// registered: both are wiring bugs that must surface at startup, not
    /// at request time.
    pub fn register(
        &mut self,
        content: Arc<dyn ContentHandler>,
        transaction: Arc<dyn TransactionHandler>,
    ) {
        let kind = content.kind();
        assert_eq!(
            kind,
            transaction.kind(),
            "content and transaction handlers must agree on kind"
        );
        assert!(
            self.content.insert(kind, content).is_none(),
            "duplicate content handler for {kind:?}"
        );
        assert!(
            self.transaction.insert(kind, transaction).is_none(),
            "duplicate transaction handler for {kind:?}"
        );
    }

    /// Kinds with a registered handler pair.
    #[must_use]
    pub fn registered_kinds(&self) -> Vec<PayloadKind> {
        self.content.keys().copied().collect()
    }

    /// Run a canonical transaction through `validate -> apply`.
    ///
    /// Replays of an already-applied transaction id succeed as no-ops. A
    /// validation reject is terminal. A transient apply failure is retried
    /// once; the handler's unit-of-work makes the retry safe.
    pub async fn execute(&self, tx: &SignedTransaction<FeedPayload>) -> Result<(), FeedError> {
        let kind = tx.payload.kind();
        let content = self
            .content
            .get(&kind)
            .ok_or_else(|| FeedError::InvalidArgument(format!("unrecognized kind {kind:?}")))?;
        let transaction = self
            .transaction
            .get(&kind)
            .ok_or_else(|| FeedError::InvalidArgument(format!("unrecognized kind {kind:?}")))?;

        let reader = self.deps.storage.create_read_only();
        if reader
            .is_transaction_applied(tx.id)
            .map_err(FeedError::from)?
        {
            debug!(tx_id = %tx.id, "Transaction already applied; replay is a no-op");
            return Ok(());
        }

        let validated = {
            let ctx = ValidationContext {
                reader: &reader,
                now: tx.block_index,
                credentials: self.credentials.as_ref(),
                config: &self.deps.config,
            };
            content.validate_and_sign(tx, &ctx)?
        };
        drop(reader);

        match transaction.handle(&validated).await {
            Err(err) if err.is_retriable() => {
                warn!(tx_id = %tx.id, %err, "Apply failed transiently; retrying once");
                transaction.handle(&validated).await
            }
            result => result,
        }
    }
}
