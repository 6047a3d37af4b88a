use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = u64;
pub type ChannelId = u64;
pub type UserId = u64;
pub type ReactionId = u64;
pub type AttachmentId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Author reference embedded in messages and reactions. The backend only
/// guarantees the username; live payloads also carry the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    pub username: String,
}

impl UserRef {
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub emoji: String,
    pub user: UserRef,
}

impl Reaction {
    pub fn new(id: ReactionId, emoji: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id,
            emoji: emoji.into(),
            user: UserRef::named(username),
        }
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentUrl {
    pub id: AttachmentId,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// A chat message as the client holds it.
///
/// The wire format names the channel `server_id` and the attachment list
/// `attachment_urls`; both are renamed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub user_id: UserId,
    #[serde(rename = "server_id")]
    pub channel_id: ChannelId,
    #[serde(default)]
    pub parent_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub user: UserRef,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default, rename = "attachment_urls")]
    pub attachments: Vec<AttachmentUrl>,
}

impl Message {
    pub fn author_id(&self) -> UserId {
        self.user_id
    }

    pub fn author_username(&self) -> &str {
        &self.user.username
    }

    /// True if `username` has reacted to this message with `emoji`.
    pub fn has_reaction(&self, username: &str, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| r.user.username == username && r.emoji == emoji)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadState {
    pub last_read_at: DateTime<Utc>,
    pub unread_count: u32,
}

/// A chat channel. The backend calls these "servers".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latest_message: Option<Message>,
    #[serde(default)]
    pub read_state: Option<ReadState>,
}

/// Channel detail as returned by `GET /servers/{id}`: the channel plus its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDetail {
    #[serde(flatten)]
    pub channel: Channel,
    #[serde(default)]
    pub users: Vec<User>,
}
