use chrono::{DateTime, TimeZone, Utc};

use murmur_types::models::{Message, MessageId, UserId, UserRef};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn message(id: MessageId, user_id: UserId, secs: i64) -> Message {
    Message {
        id,
        content: format!("message {id}"),
        user_id,
        channel_id: 1,
        parent_message_id: None,
        created_at: at(secs),
        updated_at: None,
        user: UserRef {
            id: Some(user_id),
            username: format!("user{user_id}"),
        },
        reactions: Vec::new(),
        attachments: Vec::new(),
    }
}

pub fn ids(messages: &[Message]) -> Vec<MessageId> {
    messages.iter().map(|m| m.id).collect()
}
