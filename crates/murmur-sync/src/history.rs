use tracing::{debug, info, warn};

use murmur_types::api::MessagesResponse;
use murmur_types::models::ChannelId;

use crate::collab::HistorySource;
use crate::error::FetchError;
use crate::store::MessageStore;

/// A page request in flight. Results are only applied while the ticket's
/// generation is still the loader's current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub channel_id: ChannelId,
    pub page: u32,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page 1 replaced the store contents.
    Seeded { count: usize },
    /// An older page was merged in front.
    Prepended { added: usize },
    /// The server returned an empty page; history is exhausted.
    Exhausted,
    /// A load was already running, there is nothing left, or the channel is not current.
    Skipped,
    /// The channel changed while the request was out; the result was dropped.
    Stale,
}

/// Pagination cursor for the active channel.
#[derive(Debug, Default)]
pub struct HistoryLoader {
    channel_id: Option<ChannelId>,
    generation: u64,
    current_page: u32,
    has_more: bool,
    in_flight: Option<PageTicket>,
}

impl HistoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the cursor and invalidate every outstanding ticket.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.channel_id = None;
        self.current_page = 0;
        self.has_more = false;
        self.in_flight = None;
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start loading page 1 of `channel_id`. Always starts a new generation,
    /// so anything still out for the previous view goes stale.
    pub fn begin_first_page(&mut self, channel_id: ChannelId) -> PageTicket {
        self.reset();
        self.channel_id = Some(channel_id);
        let ticket = PageTicket {
            channel_id,
            page: 1,
            generation: self.generation,
        };
        self.in_flight = Some(ticket.clone());
        ticket
    }

    /// Start loading the next older page, or `None` when a load is already
    /// running, history is exhausted, or `channel_id` is not the loaded channel.
    pub fn begin_next_page(&mut self, channel_id: ChannelId) -> Option<PageTicket> {
        if self.in_flight.is_some() || !self.has_more || self.channel_id != Some(channel_id) {
            return None;
        }
        let ticket = PageTicket {
            channel_id,
            page: self.current_page + 1,
            generation: self.generation,
        };
        self.in_flight = Some(ticket.clone());
        Some(ticket)
    }

    /// Whether `ticket` still belongs to the current view.
    pub fn is_current(&self, ticket: &PageTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Give up on `ticket` without a result. The cursor and `has_more` stay
    /// as they were, so the same page can be requested again.
    pub fn abandon(&mut self, ticket: &PageTicket) {
        if self.in_flight.as_ref() == Some(ticket) {
            debug!(
                "Abandoned page {} of channel {}",
                ticket.page, ticket.channel_id
            );
            self.in_flight = None;
        }
    }

    /// Apply the result for `ticket`. Stale results never reach the store,
    /// errors included.
    pub fn finish(
        &mut self,
        ticket: PageTicket,
        result: Result<MessagesResponse, FetchError>,
        store: &mut MessageStore,
    ) -> Result<PageOutcome, FetchError> {
        if ticket.generation != self.generation {
            debug!(
                "Discarding stale page {} for channel {}",
                ticket.page, ticket.channel_id
            );
            return Ok(PageOutcome::Stale);
        }
        self.in_flight = None;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Failed to load page {} of channel {}: {}",
                    ticket.page, ticket.channel_id, e
                );
                return Err(e);
            }
        };

        if ticket.page == 1 {
            let count = store.seed(response.messages);
            self.current_page = 1;
            self.has_more = response.pagination.next_page.is_some();
            info!(
                "Loaded {} messages for channel {} (more: {})",
                count, ticket.channel_id, self.has_more
            );
            return Ok(PageOutcome::Seeded { count });
        }

        // An empty page ends history even if the server still advertises a next page.
        if response.messages.is_empty() {
            self.has_more = false;
            debug!("Channel {} history exhausted at page {}", ticket.channel_id, ticket.page);
            return Ok(PageOutcome::Exhausted);
        }

        let added = store.prepend(response.messages);
        self.current_page = ticket.page;
        self.has_more = response.pagination.next_page.is_some();
        debug!(
            "Prepended {} messages from page {} of channel {}",
            added, ticket.page, ticket.channel_id
        );
        Ok(PageOutcome::Prepended { added })
    }

    pub async fn load_first_page<S: HistorySource>(
        &mut self,
        source: &S,
        store: &mut MessageStore,
        channel_id: ChannelId,
    ) -> Result<PageOutcome, FetchError> {
        let ticket = self.begin_first_page(channel_id);
        let page = ticket.page;
        let in_flight = InFlight::new(self, ticket);
        let result = source.get_messages(channel_id, page).await;
        in_flight.finish(result, store)
    }

    pub async fn load_next_page<S: HistorySource>(
        &mut self,
        source: &S,
        store: &mut MessageStore,
        channel_id: ChannelId,
    ) -> Result<PageOutcome, FetchError> {
        let Some(ticket) = self.begin_next_page(channel_id) else {
            return Ok(PageOutcome::Skipped);
        };
        let page = ticket.page;
        let in_flight = InFlight::new(self, ticket);
        let result = source.get_messages(channel_id, page).await;
        in_flight.finish(result, store)
    }
}

/// Holds a ticket across the fetch. If the fetch future is dropped before it
/// finishes, the ticket is abandoned so later loads are not blocked.
struct InFlight<'a> {
    loader: &'a mut HistoryLoader,
    ticket: Option<PageTicket>,
}

impl<'a> InFlight<'a> {
    fn new(loader: &'a mut HistoryLoader, ticket: PageTicket) -> Self {
        Self {
            loader,
            ticket: Some(ticket),
        }
    }

    fn finish(
        mut self,
        result: Result<MessagesResponse, FetchError>,
        store: &mut MessageStore,
    ) -> Result<PageOutcome, FetchError> {
        match self.ticket.take() {
            Some(ticket) => self.loader.finish(ticket, result, store),
            None => Ok(PageOutcome::Stale),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.loader.abandon(&ticket);
        }
    }
}
