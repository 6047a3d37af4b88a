use tracing::{info, warn};

use murmur_types::events::OutboundAction;
use murmur_types::models::ChannelId;

use crate::collab::{ChannelHandle, LiveChannel};
use crate::error::LiveError;
use crate::reconciler::LiveReconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    AlreadyActive,
    Switched { previous: Option<ChannelId> },
}

/// Owns the single live subscription. Never more than one is open.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    active: Option<ChannelHandle>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ChannelHandle> {
        self.active.as_ref()
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        self.active.as_ref().map(|h| h.channel_id)
    }

    /// Bind the live subscription to `channel_id`, closing any other one first.
    /// The reconciler's sink is registered for the new subscription and the
    /// reconciler is bound to it once the handshake succeeds.
    pub async fn switch_to<L: LiveChannel>(
        &mut self,
        live: &L,
        reconciler: &mut LiveReconciler,
        channel_id: ChannelId,
    ) -> Result<SwitchOutcome, LiveError> {
        if self.active_channel() == Some(channel_id) {
            return Ok(SwitchOutcome::AlreadyActive);
        }

        let previous = self.close(live, reconciler).await;

        let sink = reconciler.sink_for(channel_id);
        let handle = live.subscribe(channel_id, sink).await?;
        info!("Subscribed to channel {}", channel_id);
        reconciler.bind(handle.id);
        self.active = Some(handle);

        Ok(SwitchOutcome::Switched { previous })
    }

    /// Close the active subscription, if any. Returns its channel.
    pub async fn teardown<L: LiveChannel>(
        &mut self,
        live: &L,
        reconciler: &mut LiveReconciler,
    ) -> Option<ChannelId> {
        self.close(live, reconciler).await
    }

    /// Drop the active handle without unsubscribing. Used once the transport
    /// has already lost the subscription.
    pub fn forget(&mut self, reconciler: &mut LiveReconciler) -> Option<ChannelId> {
        reconciler.unbind();
        let handle = self.active.take()?;
        info!("Forgot lost subscription to channel {}", handle.channel_id);
        Some(handle.channel_id)
    }

    /// Send an action on the subscription for `channel_id`. Nothing is queued:
    /// without a matching subscription the action fails.
    pub async fn send<L: LiveChannel>(
        &self,
        live: &L,
        channel_id: ChannelId,
        action: OutboundAction,
    ) -> Result<(), LiveError> {
        match &self.active {
            Some(handle) if handle.channel_id == channel_id => live.send(handle, action).await,
            _ => Err(LiveError::NotSubscribed(channel_id)),
        }
    }

    async fn close<L: LiveChannel>(
        &mut self,
        live: &L,
        reconciler: &mut LiveReconciler,
    ) -> Option<ChannelId> {
        reconciler.unbind();
        let handle = self.active.take()?;
        // The handle is gone either way; a failed unsubscribe only leaves the
        // server-side subscription to expire with the connection.
        if let Err(e) = live.unsubscribe(&handle).await {
            warn!("Failed to unsubscribe from channel {}: {}", handle.channel_id, e);
        } else {
            info!("Unsubscribed from channel {}", handle.channel_id);
        }
        Some(handle.channel_id)
    }
}
