use std::collections::HashSet;

use murmur_types::models::{Message, MessageId, Reaction};

/// Messages of the active channel, kept ascending by creation time.
///
/// All mutation goes through here so uniqueness by id and ordering hold in
/// one place. Arrival order is never trusted: every structural mutation
/// re-sorts, since history pages and live events interleave.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    /// Replace the contents with `batch`. The first copy of a duplicated id wins.
    pub fn seed(&mut self, batch: Vec<Message>) -> usize {
        self.reset();
        for message in batch {
            if self.ids.insert(message.id) {
                self.messages.push(message);
            }
        }
        self.sort();
        self.messages.len()
    }

    /// Add an older page. Ids already present are skipped. Returns how many were added.
    pub fn prepend(&mut self, older: Vec<Message>) -> usize {
        let before = self.messages.len();
        for message in older {
            if self.ids.insert(message.id) {
                self.messages.push(message);
            }
        }
        let added = self.messages.len() - before;
        if added > 0 {
            self.sort();
        }
        added
    }

    /// Insert a live message. Returns false if the id is already present.
    pub fn append_live(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        self.sort();
        true
    }

    pub fn remove_by_id(&mut self, id: MessageId) -> bool {
        if !self.ids.remove(&id) {
            return false;
        }
        self.messages.retain(|m| m.id != id);
        true
    }

    /// Attach `reaction`, replacing any reaction by the same user with the same emoji.
    /// Redelivery of an identical reaction changes nothing.
    pub fn upsert_reaction(&mut self, message_id: MessageId, reaction: Reaction) -> bool {
        let Some(message) = self.get_mut(message_id) else {
            return false;
        };
        if message.reactions.contains(&reaction) {
            return false;
        }
        message
            .reactions
            .retain(|r| !(r.user.username == reaction.user.username && r.emoji == reaction.emoji));
        message.reactions.push(reaction);
        true
    }

    /// Drop reactions by `username`, narrowed to `emoji` when given.
    pub fn remove_reaction(
        &mut self,
        message_id: MessageId,
        username: &str,
        emoji: Option<&str>,
    ) -> bool {
        let Some(message) = self.get_mut(message_id) else {
            return false;
        };
        let before = message.reactions.len();
        message.reactions.retain(|r| {
            let same_user = r.user.username == username;
            let same_emoji = emoji.is_none_or(|e| r.emoji == e);
            !(same_user && same_emoji)
        });
        message.reactions.len() != before
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.messages.iter_mut().find(|m| m.id == id)
    }

    // Equal timestamps fall back to id so the order is total.
    fn sort(&mut self) {
        self.messages
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
}
