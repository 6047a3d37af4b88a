use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    AttachmentId, AttachmentUrl, ChannelId, Message, MessageId, Reaction, ReactionId, UserId,
    UserRef,
};

/// Events pushed by the backend on a channel subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LiveEvent {
    /// A message was posted
    #[serde(rename = "message")]
    MessageCreated(MessagePayload),

    /// A message was deleted
    #[serde(rename = "message_deleted")]
    MessageDeleted { message_id: MessageId },

    /// A reaction was added to a message
    #[serde(rename = "reaction")]
    ReactionAdded {
        message_id: MessageId,
        id: ReactionId,
        reaction: AddedReaction,
    },

    /// A reaction was removed from a message
    #[serde(rename = "reaction_delete")]
    ReactionRemoved {
        message_id: MessageId,
        reaction: RemovedReaction,
    },

    /// The backend refused an action or hit an error
    #[serde(rename = "error")]
    Error { message: String },

    /// The transport lost the subscription. Raised locally, never on the wire.
    #[serde(skip)]
    Disconnected { reason: String },
}

impl LiveEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageCreated(_) => "message",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::ReactionAdded { .. } => "reaction",
            Self::ReactionRemoved { .. } => "reaction_delete",
            Self::Error { .. } => "error",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedReaction {
    pub emoji: String,
    pub username: String,
}

/// Identifies the reaction(s) to drop. Older backends omit the emoji, in
/// which case every reaction from `username` on the message goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedReaction {
    #[serde(default)]
    pub id: Option<ReactionId>,
    pub username: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

/// Full attachment metadata; some payloads carry this instead of `attachment_urls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub id: AttachmentId,
    pub filename: String,
    pub content_type: String,
    pub byte_size: u64,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: MessageId,
    pub content: String,
    pub user_id: UserId,
    pub server_id: ChannelId,
    #[serde(default)]
    pub parent_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub user: UserRef,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub attachment_urls: Vec<AttachmentUrl>,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
}

impl From<MessagePayload> for Message {
    fn from(p: MessagePayload) -> Self {
        let attachments = if p.attachment_urls.is_empty() {
            p.attachments
                .into_iter()
                .map(|a| AttachmentUrl {
                    id: a.id,
                    url: a.url,
                    thumbnail_url: a.thumbnail_url,
                })
                .collect()
        } else {
            p.attachment_urls
        };

        Message {
            id: p.id,
            content: p.content,
            user_id: p.user_id,
            channel_id: p.server_id,
            parent_message_id: p.parent_message_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
            user: p.user,
            reactions: p.reactions,
            attachments,
        }
    }
}

/// Actions sent FROM client TO backend on an active subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction {
    CreateMessage {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<MessageId>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachment_ids: Vec<AttachmentId>,
    },
    CreateReaction { message_id: MessageId, emoji: String },
    DeleteReaction { message_id: MessageId, emoji: String },
}

impl OutboundAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateMessage { .. } => "create_message",
            Self::CreateReaction { .. } => "create_reaction",
            Self::DeleteReaction { .. } => "delete_reaction",
        }
    }
}
