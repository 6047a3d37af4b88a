use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use murmur_types::events::LiveEvent;
use murmur_types::models::{ChannelId, Message, MessageId, Reaction, UserRef};

use crate::collab::{EventSink, LiveEnvelope, SubscriptionId};
use crate::store::MessageStore;

/// What applying one live event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The store changed.
    Applied {
        kind: &'static str,
        message_id: MessageId,
    },
    /// Duplicate or stale event; the store was already in the target state.
    NoOp {
        kind: &'static str,
        message_id: MessageId,
    },
    /// An error event for the host UI. The store is never touched.
    Surfaced(String),
    /// The subscription is gone. The store is kept as it was.
    Disconnected(String),
    /// The event came from a subscription that is no longer bound.
    Ignored,
}

impl Reconciled {
    pub fn changed(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Turns inbound live events into [`MessageStore`] mutations.
///
/// The reconciler hands out one [`EventSink`] per subscription and only
/// applies envelopes stamped by the sink it is currently bound to.
#[derive(Debug)]
pub struct LiveReconciler {
    tx: mpsc::UnboundedSender<LiveEnvelope>,
    bound: Option<SubscriptionId>,
}

impl LiveReconciler {
    pub fn new(tx: mpsc::UnboundedSender<LiveEnvelope>) -> Self {
        Self { tx, bound: None }
    }

    /// A fresh sink for a subscription to `channel_id`. Not bound until [`Self::bind`].
    pub fn sink_for(&self, channel_id: ChannelId) -> EventSink {
        EventSink::new(channel_id, self.tx.clone())
    }

    pub fn bind(&mut self, subscription: SubscriptionId) {
        self.bound = Some(subscription);
    }

    pub fn unbind(&mut self) {
        self.bound = None;
    }

    pub fn bound(&self) -> Option<SubscriptionId> {
        self.bound
    }

    pub fn apply(&self, store: &mut MessageStore, envelope: LiveEnvelope) -> Reconciled {
        if self.bound != Some(envelope.subscription) {
            trace!(
                "Ignoring {} event from unbound subscription on channel {}",
                envelope.event.kind(),
                envelope.channel_id
            );
            return Reconciled::Ignored;
        }
        apply_event(store, envelope.event)
    }
}

/// Apply one event to the store.
pub fn apply_event(store: &mut MessageStore, event: LiveEvent) -> Reconciled {
    let kind = event.kind();
    match event {
        LiveEvent::MessageCreated(payload) => {
            let message = Message::from(payload);
            let message_id = message.id;
            outcome(kind, message_id, store.append_live(message))
        }

        LiveEvent::MessageDeleted { message_id } => {
            outcome(kind, message_id, store.remove_by_id(message_id))
        }

        LiveEvent::ReactionAdded {
            message_id,
            id,
            reaction,
        } => {
            let reaction = Reaction {
                id,
                emoji: reaction.emoji,
                user: UserRef::named(reaction.username),
            };
            outcome(kind, message_id, store.upsert_reaction(message_id, reaction))
        }

        LiveEvent::ReactionRemoved {
            message_id,
            reaction,
        } => {
            let removed =
                store.remove_reaction(message_id, &reaction.username, reaction.emoji.as_deref());
            outcome(kind, message_id, removed)
        }

        LiveEvent::Error { message } => {
            warn!("Live channel error: {}", message);
            Reconciled::Surfaced(message)
        }

        LiveEvent::Disconnected { reason } => {
            warn!("Live channel lost: {}", reason);
            Reconciled::Disconnected(reason)
        }
    }
}

fn outcome(kind: &'static str, message_id: MessageId, changed: bool) -> Reconciled {
    if changed {
        Reconciled::Applied { kind, message_id }
    } else {
        debug!("{} event for message {} changed nothing", kind, message_id);
        Reconciled::NoOp { kind, message_id }
    }
}
