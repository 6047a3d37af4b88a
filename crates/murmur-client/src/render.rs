//! Plain-text rendering of the chat view.

use std::fmt::Write;

use murmur_sync::grouping::{self, MessageGroup, ReactionSummary};
use murmur_types::models::{Channel, Message, User};

const PREVIEW_CHARS: usize = 40;

pub fn channel_header(channel: &Channel, has_more: bool) -> String {
    let mut out = format!("== #{} {} ==", channel.id, channel.name);
    if let Some(description) = channel.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(out, "\n   {description}");
    }
    if has_more {
        out.push_str("\n   (older messages available, /more)");
    }
    out
}

/// Every group with its author header, then one line per message.
pub fn groups(groups: &[MessageGroup<'_>], all: &[Message], me: &str) -> String {
    let mut out = String::new();
    for group in groups {
        let first = &group.messages[0];
        let _ = writeln!(
            out,
            "{} {}",
            group.username(),
            first.created_at.format("%Y-%m-%d %H:%M")
        );
        for message in group.messages {
            out.push_str(&message_line(message, all, me));
            out.push('\n');
        }
    }
    out
}

/// One message: id, reply context, content, attachments and reactions.
pub fn message_line(message: &Message, all: &[Message], me: &str) -> String {
    let mut out = format!("  [{}] ", message.id);
    if let Some(parent_id) = message.parent_message_id {
        match grouping::parent_message(all, Some(parent_id)) {
            Some(parent) => {
                let _ = write!(
                    out,
                    "(re {}: \"{}\") ",
                    parent.author_username(),
                    preview(&parent.content)
                );
            }
            None => {
                let _ = write!(out, "(re #{parent_id}) ");
            }
        }
    }
    out.push_str(&message.content);
    if message.updated_at.is_some_and(|u| u > message.created_at) {
        out.push_str(" (edited)");
    }
    for attachment in &message.attachments {
        let _ = write!(out, "\n      📎 {}", attachment.url);
    }

    let reactions = grouping::summarize_reactions(message, me);
    if !reactions.is_empty() {
        out.push_str("\n      ");
        out.push_str(&reaction_line(&reactions));
    }
    out
}

fn reaction_line(reactions: &[ReactionSummary]) -> String {
    reactions
        .iter()
        .map(|r| {
            let mark = if r.reacted_by_me { "*" } else { "" };
            format!("{}{} {}", mark, r.emoji, r.count)
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn members(members: &[User]) -> String {
    let names: Vec<&str> = members.iter().map(|u| u.username.as_str()).collect();
    format!("{} members: {}", names.len(), names.join(", "))
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
