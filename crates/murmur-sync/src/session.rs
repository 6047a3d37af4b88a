use std::future::Future;

use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use murmur_types::api::MessagesResponse;
use murmur_types::events::OutboundAction;
use murmur_types::models::{AttachmentId, Channel, ChannelDetail, ChannelId, Message, MessageId, User};

use crate::collab::{EventReceiver, HistorySource, LiveChannel, LiveEnvelope};
use crate::error::{FetchError, SessionError};
use crate::grouping::{self, MessageGroup, ReactionSummary};
use crate::history::{HistoryLoader, PageOutcome, PageTicket};
use crate::reconciler::{LiveReconciler, Reconciled};
use crate::store::MessageStore;
use crate::subscription::SubscriptionManager;

/// A finished background fetch. Hand it to [`ChatSession::complete`].
#[derive(Debug)]
pub enum Completion {
    Page {
        ticket: PageTicket,
        result: Result<MessagesResponse, FetchError>,
    },
    Detail {
        ticket: PageTicket,
        result: Result<ChannelDetail, FetchError>,
    },
    /// The task ended without a result (aborted or panicked).
    Abandoned { ticket: PageTicket },
}

impl Completion {
    fn ticket(&self) -> &PageTicket {
        match self {
            Self::Page { ticket, .. } | Self::Detail { ticket, .. } | Self::Abandoned { ticket } => {
                ticket
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Page { .. } => "page",
            Self::Detail { .. } => "channel detail",
            Self::Abandoned { .. } => "abandoned fetch",
        }
    }
}

/// What [`ChatSession::complete`] did with a [`Completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded {
    Page(PageOutcome),
    Detail,
    /// Belonged to a view the user already left, or never produced a result.
    Dropped,
}

/// Input a host loop must feed back into the session.
#[derive(Debug)]
pub enum SessionEvent {
    Live(LiveEnvelope),
    Task(Completion),
}

/// Receiving half of a session: live envelopes and finished fetches.
#[derive(Debug)]
pub struct SessionEvents {
    live: EventReceiver,
    tasks: mpsc::UnboundedReceiver<Completion>,
}

impl SessionEvents {
    /// Next event. Finished fetches are handed out before live envelopes.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            biased;
            Some(done) = self.tasks.recv() => Some(SessionEvent::Task(done)),
            Some(envelope) = self.live.recv() => Some(SessionEvent::Live(envelope)),
            else => None,
        }
    }

    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        if let Ok(done) = self.tasks.try_recv() {
            return Some(SessionEvent::Task(done));
        }
        self.live.try_recv().ok().map(SessionEvent::Live)
    }
}

/// Reports a fetch task that ends without sending its result.
struct TaskGuard {
    tx: mpsc::UnboundedSender<Completion>,
    ticket: Option<PageTicket>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let _ = self.tx.send(Completion::Abandoned { ticket });
        }
    }
}

/// Controller for the chat view of one user.
///
/// Owns the view state (store, cursor, subscription, members, last error) and
/// the injected collaborators. REST fetches run as background tasks whose
/// results come back through [`SessionEvents`], so the host loop never waits
/// on the network and a channel switch can overtake a pending page.
/// Every state change bumps a revision on a `watch` channel; a UI layer
/// re-renders when it sees a new revision.
pub struct ChatSession<R, L> {
    rest: R,
    live: L,
    me: User,
    store: MessageStore,
    history: HistoryLoader,
    subscriptions: SubscriptionManager,
    reconciler: LiveReconciler,
    channel: Option<ChannelDetail>,
    selected: Option<ChannelId>,
    notice: Option<String>,
    revision: watch::Sender<u64>,
    tasks: mpsc::UnboundedSender<Completion>,
    running: Vec<AbortHandle>,
    pending: usize,
}

impl<R, L> ChatSession<R, L>
where
    R: HistorySource + Clone + Send + Sync + 'static,
    L: LiveChannel,
{
    /// Build a session for `me`. Everything arriving on the returned
    /// [`SessionEvents`] must be fed back through [`Self::handle_live`] or
    /// [`Self::complete`].
    pub fn new(rest: R, live: L, me: User) -> (Self, SessionEvents) {
        let (live_tx, live_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (revision, _) = watch::channel(0);
        let session = Self {
            rest,
            live,
            me,
            store: MessageStore::new(),
            history: HistoryLoader::new(),
            subscriptions: SubscriptionManager::new(),
            reconciler: LiveReconciler::new(live_tx),
            channel: None,
            selected: None,
            notice: None,
            revision,
            tasks: task_tx,
            running: Vec::new(),
            pending: 0,
        };
        let events = SessionEvents {
            live: live_rx,
            tasks: task_rx,
        };
        (session, events)
    }

    /// Select `channel_id`: drop the previous channel's state and start
    /// loading the newest page. Members are fetched and the live subscription
    /// is bound once that page lands in [`Self::complete`].
    pub async fn open_channel(&mut self, channel_id: ChannelId) {
        if self.selected == Some(channel_id) && (self.is_live() || self.is_busy()) {
            return;
        }
        info!("Opening channel {}", channel_id);

        self.cancel_running();
        // Unbinding also drops events still queued for the old subscription.
        if let Some(previous) = self
            .subscriptions
            .teardown(&self.live, &mut self.reconciler)
            .await
        {
            info!("Left channel {}", previous);
        }
        self.store.reset();
        self.channel = None;
        self.notice = None;
        self.selected = Some(channel_id);

        let ticket = self.history.begin_first_page(channel_id);
        self.fetch_page(ticket);
        self.notify();
    }

    /// Start loading the next older page. Returns false when nothing was
    /// started: a load is already running or history is exhausted.
    pub fn load_older(&mut self) -> Result<bool, SessionError> {
        let channel_id = self.selected.ok_or(SessionError::NoChannel)?;
        let Some(ticket) = self.history.begin_next_page(channel_id) else {
            return Ok(false);
        };
        self.fetch_page(ticket);
        self.notify();
        Ok(true)
    }

    /// Apply a finished fetch. Results for a channel the user already left
    /// are dropped without touching the view.
    pub async fn complete(&mut self, done: Completion) -> Result<Loaded, SessionError> {
        if !self.history.is_current(done.ticket()) {
            debug!(
                "Dropping stale {} for channel {}",
                done.kind(),
                done.ticket().channel_id
            );
            return Ok(Loaded::Dropped);
        }
        self.pending = self.pending.saturating_sub(1);

        match done {
            Completion::Page { ticket, result } => {
                let channel_id = ticket.channel_id;
                let first = ticket.page == 1;
                let detail = ticket.clone();
                match self.history.finish(ticket, result, &mut self.store) {
                    Ok(PageOutcome::Stale) => Ok(Loaded::Dropped),
                    Ok(outcome) => {
                        self.notify();
                        if first {
                            self.fetch_detail(detail);
                            self.go_live(channel_id).await?;
                        }
                        Ok(Loaded::Page(outcome))
                    }
                    Err(e) => Err(self.fail(e.user_message(), e.into())),
                }
            }
            Completion::Detail { result, .. } => match result {
                Ok(detail) => {
                    self.channel = Some(detail);
                    self.notify();
                    Ok(Loaded::Detail)
                }
                Err(e) => Err(self.fail(e.user_message(), e.into())),
            },
            Completion::Abandoned { ticket } => {
                warn!(
                    "Fetch for channel {} ended without a result",
                    ticket.channel_id
                );
                self.history.abandon(&ticket);
                self.notify();
                Ok(Loaded::Dropped)
            }
        }
    }

    /// Apply one live event. Error events become the current notice. A lost
    /// subscription is forgotten so the channel can be opened again.
    pub fn handle_live(&mut self, envelope: LiveEnvelope) -> Reconciled {
        let result = self.reconciler.apply(&mut self.store, envelope);
        match &result {
            Reconciled::Applied { .. } => self.notify(),
            Reconciled::Surfaced(message) => {
                self.notice = Some(message.clone());
                self.notify();
            }
            Reconciled::Disconnected(reason) => {
                if let Some(channel_id) = self.subscriptions.forget(&mut self.reconciler) {
                    warn!("Live updates for channel {} stopped: {}", channel_id, reason);
                }
                self.notice = Some(reason.clone());
                self.notify();
            }
            Reconciled::NoOp { .. } | Reconciled::Ignored => {}
        }
        result
    }

    /// Post a message, optionally as a reply. The message appears once the
    /// backend echoes it on the live channel.
    pub async fn send_message(
        &mut self,
        content: &str,
        parent_message_id: Option<MessageId>,
        attachment_ids: Vec<AttachmentId>,
    ) -> Result<(), SessionError> {
        let content = content.trim();
        if content.is_empty() && attachment_ids.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let action = OutboundAction::CreateMessage {
            content: content.to_string(),
            parent_message_id,
            attachment_ids,
        };
        self.send(action, "Failed to send message").await
    }

    /// Add `emoji` to a message, or remove it if this user already reacted
    /// with it. Returns true when a reaction was requested.
    pub async fn toggle_reaction(
        &mut self,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<bool, SessionError> {
        let message = self
            .store
            .get(message_id)
            .ok_or(SessionError::UnknownMessage(message_id))?;
        let adding = !message.has_reaction(&self.me.username, emoji);
        let action = if adding {
            OutboundAction::CreateReaction {
                message_id,
                emoji: emoji.to_string(),
            }
        } else {
            OutboundAction::DeleteReaction {
                message_id,
                emoji: emoji.to_string(),
            }
        };
        self.send(action, "Failed to update reaction").await?;
        Ok(adding)
    }

    /// Leave the current channel and close its subscription.
    pub async fn close(&mut self) {
        self.cancel_running();
        if let Some(channel_id) = self
            .subscriptions
            .teardown(&self.live, &mut self.reconciler)
            .await
        {
            info!("Closed channel {}", channel_id);
        }
        self.history.reset();
        self.store.reset();
        self.channel = None;
        self.selected = None;
        self.notify();
    }

    async fn send(&mut self, action: OutboundAction, failure: &str) -> Result<(), SessionError> {
        let Some(channel_id) = self.selected else {
            return Err(self.fail(failure.to_string(), SessionError::NoChannel));
        };
        let name = action.name();
        match self.subscriptions.send(&self.live, channel_id, action).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("{} on channel {} failed: {}", name, channel_id, e);
                Err(self.fail(failure.to_string(), e.into()))
            }
        }
    }

    async fn go_live(&mut self, channel_id: ChannelId) -> Result<(), SessionError> {
        match self
            .subscriptions
            .switch_to(&self.live, &mut self.reconciler, channel_id)
            .await
        {
            Ok(_) => {
                self.notify();
                Ok(())
            }
            Err(e) => Err(self.fail(format!("Could not join live updates: {e}"), e.into())),
        }
    }

    fn fetch_page(&mut self, ticket: PageTicket) {
        let rest = self.rest.clone();
        let task = ticket.clone();
        self.spawn(ticket, async move {
            let result = rest.get_messages(task.channel_id, task.page).await;
            Completion::Page { ticket: task, result }
        });
    }

    fn fetch_detail(&mut self, ticket: PageTicket) {
        let rest = self.rest.clone();
        let task = ticket.clone();
        self.spawn(ticket, async move {
            let result = rest.get_channel(task.channel_id).await;
            Completion::Detail { ticket: task, result }
        });
    }

    fn spawn<F>(&mut self, ticket: PageTicket, work: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let mut guard = TaskGuard {
            tx: self.tasks.clone(),
            ticket: Some(ticket),
        };
        let handle = tokio::spawn(async move {
            let done = work.await;
            guard.ticket = None;
            let _ = guard.tx.send(done);
        });
        self.running.retain(|h| !h.is_finished());
        self.running.push(handle.abort_handle());
        self.pending += 1;
    }

    /// Abort fetches for the view being left. Their completions go stale.
    fn cancel_running(&mut self) {
        for handle in self.running.drain(..) {
            handle.abort();
        }
        self.pending = 0;
    }
}

impl<R, L> ChatSession<R, L> {
    /// Receiver that observes a new revision after every state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // -- View state --

    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn selected_channel(&self) -> Option<ChannelId> {
        self.selected
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref().map(|d| &d.channel)
    }

    pub fn members(&self) -> &[User] {
        self.channel.as_ref().map(|d| d.users.as_slice()).unwrap_or_default()
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn groups(&self) -> Vec<MessageGroup<'_>> {
        grouping::group_messages(self.store.messages())
    }

    pub fn parent_of(&self, message: &Message) -> Option<&Message> {
        grouping::parent_message(self.store.messages(), message.parent_message_id)
    }

    pub fn reactions_of(&self, message: &Message) -> Vec<ReactionSummary> {
        grouping::summarize_reactions(message, &self.me.username)
    }

    pub fn has_more(&self) -> bool {
        self.history.has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.history.is_loading()
    }

    /// Whether fetches started by the session are still outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending > 0
    }

    pub fn is_live(&self) -> bool {
        self.selected.is_some() && self.subscriptions.active_channel() == self.selected
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn clear_notice(&mut self) {
        if self.notice.take().is_some() {
            self.notify();
        }
    }

    fn fail(&mut self, notice: String, err: SessionError) -> SessionError {
        self.notice = Some(notice);
        self.notify();
        err
    }

    fn notify(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}
