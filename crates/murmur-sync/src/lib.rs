//! Client-side reconciliation of paged message history with a live channel
//! event stream.
//!
//! [`session::ChatSession`] is the composition point: it owns one
//! [`store::MessageStore`] for the selected channel and drives the
//! [`history::HistoryLoader`], [`subscription::SubscriptionManager`] and
//! [`reconciler::LiveReconciler`] against injected collaborators. REST
//! fetches run as background tasks and come back as [`session::Completion`]s.

pub mod collab;
pub mod error;
pub mod grouping;
pub mod history;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod subscription;

#[cfg(test)]
mod testing;

pub use collab::{ChannelHandle, EventReceiver, EventSink, HistorySource, LiveChannel, LiveEnvelope};
pub use error::{FetchError, LiveError, SessionError};
pub use session::{ChatSession, Completion, Loaded, SessionEvent, SessionEvents};
