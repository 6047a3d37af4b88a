//! Display helpers over the store's ascending message list. Pure functions.

use murmur_types::models::{Message, MessageId, UserId};

/// A maximal run of consecutive messages by one author.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageGroup<'a> {
    pub author_id: UserId,
    pub messages: &'a [Message],
}

impl<'a> MessageGroup<'a> {
    pub fn username(&self) -> &'a str {
        self.messages
            .first()
            .map(|m| m.author_username())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

pub fn group_messages(messages: &[Message]) -> Vec<MessageGroup<'_>> {
    messages
        .chunk_by(|a, b| a.author_id() == b.author_id())
        .map(|run| MessageGroup {
            author_id: run[0].author_id(),
            messages: run,
        })
        .collect()
}

/// Resolve a reply parent from what is loaded. Never fetches.
pub fn parent_message(messages: &[Message], parent_id: Option<MessageId>) -> Option<&Message> {
    let parent_id = parent_id?;
    messages.iter().find(|m| m.id == parent_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: usize,
    pub usernames: Vec<String>,
    pub reacted_by_me: bool,
}

/// Reactions on `message` grouped by emoji, in order of first appearance.
/// Reactions with no emoji or no username are not counted.
pub fn summarize_reactions(message: &Message, current_username: &str) -> Vec<ReactionSummary> {
    let mut summaries: Vec<ReactionSummary> = Vec::new();
    for reaction in &message.reactions {
        let username = reaction.username();
        if reaction.emoji.is_empty() || username.is_empty() {
            continue;
        }
        let idx = match summaries.iter().position(|s| s.emoji == reaction.emoji) {
            Some(idx) => idx,
            None => {
                summaries.push(ReactionSummary {
                    emoji: reaction.emoji.clone(),
                    count: 0,
                    usernames: Vec::new(),
                    reacted_by_me: false,
                });
                summaries.len() - 1
            }
        };
        let summary = &mut summaries[idx];
        summary.count += 1;
        summary.usernames.push(username.to_string());
        summary.reacted_by_me |= username == current_username;
    }
    summaries
}
