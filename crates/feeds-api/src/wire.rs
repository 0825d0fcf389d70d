//! # Wire Types
//!
//! Request/response shapes of the feeds API. Field names are normative;
//! identifiers travel as strings and are validated at the boundary.

use serde::{Deserialize, Serialize};

/// Feed-type wire codes: 1 = Personal, 2 = Chat, 3 = Group.
pub type FeedTypeCode = u32;

/// Request: list a profile's feeds with activity since a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFeedForAddressRequest {
    /// The profile's public signing key.
    pub profile_public_key: String,
    /// Only feeds touched at or after this block are returned.
    pub block_index: u64,
}

/// One feed in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSummary {
    /// Feed identity.
    pub feed_id: String,
    /// 1 = Personal, 2 = Chat, 3 = Group.
    pub feed_type: FeedTypeCode,
    /// Display title rendered for the requesting profile.
    pub feed_title: String,
    /// Overlaid `last_block_index` (maximum of durable and cache).
    pub block_index: u64,
    /// The profile's read bookmark (0 when missing).
    pub last_read_block_index: u64,
}

/// Response: the profile's feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFeedForAddressResponse {
    /// Feeds where the profile participates actively.
    pub feeds: Vec<FeedSummary>,
}

/// Request: one message by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessageByIdRequest {
    /// The feed the message is expected in.
    pub feed_id: String,
    /// The message.
    pub message_id: String,
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// Message identity.
    pub feed_message_id: String,
    /// The feed it lives in.
    pub feed_id: String,
    /// Opaque encrypted body.
    pub message_content: Vec<u8>,
    /// Display alias of the sender.
    pub issuer_name: String,
    /// Sender-declared timestamp (milliseconds).
    pub timestamp: u64,
    /// Inclusion block.
    pub block_index: u64,
    /// Key generation the body was encrypted under.
    pub key_generation: u32,
    /// Message being replied to, if any.
    pub reply_to_message_id: Option<String>,
}

/// Response: one message, or a not-found marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessageByIdResponse {
    /// Whether the message was found in the requested feed.
    pub success: bool,
    /// The message, when found.
    pub message: Option<MessageView>,
    /// Error description, when not found.
    pub error: Option<String>,
}

impl GetMessageByIdResponse {
    /// A found message.
    #[must_use]
    pub fn found(message: MessageView) -> Self {
        Self {
            success: true,
            message: Some(message),
            error: None,
        }
    }

    /// The uniform not-found shape (malformed id, absent row, or
    /// cross-feed mismatch all look identical to the caller).
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            success: false,
            message: None,
            error: Some("message not found".into()),
        }
    }
}

/// Request: paginated messages of a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFeedMessagesByIdRequest {
    /// The feed.
    pub feed_id: String,
    /// The requesting user; must be an active participant.
    pub user_address: String,
    /// Page boundary: messages strictly before this block. Absent means
    /// the latest window.
    pub before_block_index: Option<u64>,
    /// Page size; capped by configuration.
    pub limit: Option<u32>,
}

/// Response: one page of messages, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFeedMessagesByIdResponse {
    /// The page, newest first.
    pub messages: Vec<MessageView>,
    /// Whether older messages exist beyond this page.
    pub has_more_messages: bool,
    /// Lowest block in the page (0 when empty).
    pub oldest_block_index: u64,
    /// Highest block in the page (0 when empty).
    pub newest_block_index: u64,
}

/// Request: admin adds a member to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberToGroupFeedRequest {
    /// The group.
    pub feed_id: String,
    /// The requesting admin.
    pub admin_public_address: String,
    /// The member to add.
    pub new_member_public_address: String,
    /// The member's public encryption key as declared by the admin.
    pub new_member_public_encrypt_key: String,
}

/// Uniform mutation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    /// Whether the mutation committed.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

impl MutationResponse {
    /// A committed mutation.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed mutation with no visible effect.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Request: stream an attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadAttachmentRequest {
    /// The attachment.
    pub attachment_id: String,
    /// The feed the requester claims it belongs to.
    pub feed_id: String,
    /// The requesting user; must be an active participant of the feed.
    pub requester_user_address: String,
    /// Stream the thumbnail instead of the original.
    pub thumbnail_only: bool,
}

/// One chunk of an attachment stream.
///
/// Only the first chunk (`chunk_index == 0`) carries non-zero totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentChunk {
    /// Zero-based position in the stream.
    pub chunk_index: u32,
    /// Total chunk count; zero except on the first chunk.
    pub total_chunks: u32,
    /// Total byte size; zero except on the first chunk.
    pub total_size: u64,
    /// The chunk payload.
    pub data: Vec<u8>,
}

/// Request: the key generations a user can decrypt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetKeyGenerationsRequest {
    /// The group.
    pub feed_id: String,
    /// The requesting user.
    pub user_public_address: String,
}

/// One wrapped key on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyGenerationEntry {
    /// The generation version.
    pub key_generation: u32,
    /// The group key encrypted for the requesting user.
    pub encrypted_key: Vec<u8>,
}

/// Response: the user's wrapped keys, ascending by version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetKeyGenerationsResponse {
    /// Only generations for which the user holds a wrapped key.
    pub key_generations: Vec<KeyGenerationEntry>,
}
