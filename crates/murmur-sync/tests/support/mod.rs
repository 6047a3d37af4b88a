//! In-memory collaborators for driving `ChatSession` without a network.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use murmur_sync::{ChannelHandle, EventSink, FetchError, HistorySource, LiveChannel, LiveError};
use murmur_types::api::{MessagesResponse, Pagination};
use murmur_types::events::{LiveEvent, MessagePayload, OutboundAction};
use murmur_types::models::{Channel, ChannelDetail, ChannelId, Message, MessageId, User, UserId, UserRef};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn user(id: UserId, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: None,
    }
}

pub fn message(channel_id: ChannelId, id: MessageId, user_id: UserId, secs: i64) -> Message {
    Message {
        id,
        content: format!("message {id}"),
        user_id,
        channel_id,
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

pub fn created(channel_id: ChannelId, id: MessageId, user_id: UserId, secs: i64) -> LiveEvent {
    let m = message(channel_id, id, user_id, secs);
    LiveEvent::MessageCreated(MessagePayload {
        id: m.id,
        content: m.content,
        user_id: m.user_id,
        server_id: m.channel_id,
        parent_message_id: None,
        created_at: m.created_at,
        updated_at: None,
        user: m.user,
        reactions: vec![],
        attachment_urls: vec![],
        attachments: vec![],
    })
}

pub fn ids(messages: &[Message]) -> Vec<MessageId> {
    messages.iter().map(|m| m.id).collect()
}

// -- History --

#[derive(Default)]
struct HistoryState {
    pages: HashMap<(ChannelId, u32), Result<MessagesResponse, FetchError>>,
    channels: HashMap<ChannelId, ChannelDetail>,
    requests: Vec<(ChannelId, u32)>,
    holds: HashMap<(ChannelId, u32), Arc<Notify>>,
}

#[derive(Clone, Default)]
pub struct FakeHistory {
    state: Arc<Mutex<HistoryState>>,
}

impl FakeHistory {
    pub fn page(&self, channel_id: ChannelId, page: u32, messages: Vec<Message>, next_page: Option<u32>) {
        let response = MessagesResponse {
            messages,
            pagination: Pagination {
                current_page: page,
                next_page,
                ..Default::default()
            },
        };
        self.state
            .lock()
            .unwrap()
            .pages
            .insert((channel_id, page), Ok(response));
    }

    pub fn fail(&self, channel_id: ChannelId, page: u32, err: FetchError) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert((channel_id, page), Err(err));
    }

    pub fn channel(&self, channel_id: ChannelId, members: Vec<User>) {
        let detail = ChannelDetail {
            channel: Channel {
                id: channel_id,
                name: format!("channel-{channel_id}"),
                description: None,
                owner_id: 1,
                created_at: at(0),
                updated_at: None,
                latest_message: None,
                read_state: None,
            },
            users: members,
        };
        self.state.lock().unwrap().channels.insert(channel_id, detail);
    }

    /// Keep requests for this page waiting until [`Self::release`].
    pub fn hold(&self, channel_id: ChannelId, page: u32) {
        self.state
            .lock()
            .unwrap()
            .holds
            .insert((channel_id, page), Arc::new(Notify::new()));
    }

    pub fn release(&self, channel_id: ChannelId, page: u32) {
        if let Some(hold) = self.state.lock().unwrap().holds.remove(&(channel_id, page)) {
            hold.notify_one();
        }
    }

    pub fn requests(&self) -> Vec<(ChannelId, u32)> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl HistorySource for FakeHistory {
    async fn get_messages(&self, channel_id: ChannelId, page: u32) -> Result<MessagesResponse, FetchError> {
        let hold = {
            let mut state = self.state.lock().unwrap();
            state.requests.push((channel_id, page));
            state.holds.get(&(channel_id, page)).cloned()
        };
        if let Some(hold) = hold {
            hold.notified().await;
        }

        let state = self.state.lock().unwrap();
        state
            .pages
            .get(&(channel_id, page))
            .cloned()
            .unwrap_or_else(|| {
                Ok(MessagesResponse {
                    messages: vec![],
                    pagination: Pagination {
                        current_page: page,
                        ..Default::default()
                    },
                })
            })
    }

    async fn get_channel(&self, channel_id: ChannelId) -> Result<ChannelDetail, FetchError> {
        self.state
            .lock()
            .unwrap()
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or(FetchError::Http(404))
    }
}

// -- Live --

#[derive(Default)]
struct LiveState {
    calls: Vec<String>,
    sinks: HashMap<ChannelId, EventSink>,
    sent: Vec<(ChannelId, OutboundAction)>,
    reject: HashSet<ChannelId>,
}

#[derive(Clone, Default)]
pub struct FakeLive {
    state: Arc<Mutex<LiveState>>,
}

impl FakeLive {
    pub fn reject(&self, channel_id: ChannelId) {
        self.state.lock().unwrap().reject.insert(channel_id);
    }

    /// Deliver `event` on the most recent sink registered for `channel_id`,
    /// even if that subscription has since been closed.
    pub fn push(&self, channel_id: ChannelId, event: LiveEvent) -> bool {
        let state = self.state.lock().unwrap();
        state
            .sinks
            .get(&channel_id)
            .map(|sink| sink.deliver(event))
            .unwrap_or(false)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn sent(&self) -> Vec<(ChannelId, OutboundAction)> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl LiveChannel for FakeLive {
    async fn subscribe(&self, channel_id: ChannelId, sink: EventSink) -> Result<ChannelHandle, LiveError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("subscribe {channel_id}"));
        if state.reject.contains(&channel_id) {
            return Err(LiveError::Rejected(channel_id));
        }
        let handle = ChannelHandle::for_sink(&sink);
        state.sinks.insert(channel_id, sink);
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: &ChannelHandle) -> Result<(), LiveError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("unsubscribe {}", handle.channel_id));
        Ok(())
    }

    async fn send(&self, handle: &ChannelHandle, action: OutboundAction) -> Result<(), LiveError> {
        self.state.lock().unwrap().sent.push((handle.channel_id, action));
        Ok(())
    }
}
