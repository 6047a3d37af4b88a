//! Collaborator seams: the REST history source and the live channel.
//!
//! Both are injected into [`crate::ChatSession`]; production adapters live in
//! `murmur-api` and `murmur-gateway`, tests use in-memory fakes.

use std::future::Future;

use tokio::sync::mpsc;
use uuid::Uuid;

use murmur_types::api::MessagesResponse;
use murmur_types::events::{LiveEvent, OutboundAction};
use murmur_types::models::{ChannelDetail, ChannelId};

use crate::error::{FetchError, LiveError};

pub type SubscriptionId = Uuid;

/// Paged message history.
pub trait HistorySource {
    /// Fetch one page; page 1 is the most recent.
    fn get_messages(
        &self,
        channel_id: ChannelId,
        page: u32,
    ) -> impl Future<Output = Result<MessagesResponse, FetchError>> + Send;

    fn get_channel(
        &self,
        channel_id: ChannelId,
    ) -> impl Future<Output = Result<ChannelDetail, FetchError>> + Send;
}

/// Pub/sub transport scoped per channel.
pub trait LiveChannel {
    /// Subscribe and wait for the handshake. Events for this subscription are
    /// delivered to `sink` until it is unsubscribed.
    fn subscribe(
        &self,
        channel_id: ChannelId,
        sink: EventSink,
    ) -> impl Future<Output = Result<ChannelHandle, LiveError>> + Send;

    fn unsubscribe(
        &self,
        handle: &ChannelHandle,
    ) -> impl Future<Output = Result<(), LiveError>> + Send;

    fn send(
        &self,
        handle: &ChannelHandle,
        action: OutboundAction,
    ) -> impl Future<Output = Result<(), LiveError>> + Send;
}

/// An open subscription as returned by [`LiveChannel::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: SubscriptionId,
    pub channel_id: ChannelId,
}

impl ChannelHandle {
    pub fn for_sink(sink: &EventSink) -> Self {
        Self {
            id: sink.subscription(),
            channel_id: sink.channel_id(),
        }
    }
}

/// A live event tagged with the subscription it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEnvelope {
    pub subscription: SubscriptionId,
    pub channel_id: ChannelId,
    pub event: LiveEvent,
}

pub type EventReceiver = mpsc::UnboundedReceiver<LiveEnvelope>;

/// Typed sink owned by one subscription. Every event it delivers is stamped
/// with that subscription's id so the reconciler can drop leftovers from a
/// channel it has already left.
#[derive(Debug, Clone)]
pub struct EventSink {
    subscription: SubscriptionId,
    channel_id: ChannelId,
    tx: mpsc::UnboundedSender<LiveEnvelope>,
}

impl EventSink {
    pub fn new(channel_id: ChannelId, tx: mpsc::UnboundedSender<LiveEnvelope>) -> Self {
        Self {
            subscription: Uuid::new_v4(),
            channel_id,
            tx,
        }
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Returns false once the receiving side is gone.
    pub fn deliver(&self, event: LiveEvent) -> bool {
        self.tx
            .send(LiveEnvelope {
                subscription: self.subscription,
                channel_id: self.channel_id,
                event,
            })
            .is_ok()
    }
}
