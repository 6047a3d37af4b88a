use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{RwLock, oneshot};
use tracing::{debug, warn};

use murmur_sync::EventSink;
use murmur_sync::collab::SubscriptionId;
use murmur_types::events::LiveEvent;

/// One subscription's route: its sink, plus the handshake waiter until the
/// server confirms or rejects it.
struct Route {
    sink: EventSink,
    pending: Option<oneshot::Sender<bool>>,
}

/// Routes inbound broadcasts to subscription sinks by identifier.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<RouterInner>,
}

#[derive(Default)]
struct RouterInner {
    /// identifier -> route
    routes: RwLock<HashMap<String, Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` under `identifier`, replacing any older route. The
    /// returned receiver resolves to the server's confirm (true) or reject (false).
    pub async fn register(&self, identifier: String, sink: EventSink) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let route = Route {
            sink,
            pending: Some(tx),
        };
        self.inner.routes.write().await.insert(identifier, route);
        rx
    }

    /// Remove the route for `identifier`, but only if it still belongs to `subscription`.
    pub async fn unregister(&self, identifier: &str, subscription: SubscriptionId) -> bool {
        let mut routes = self.inner.routes.write().await;
        match routes.get(identifier) {
            Some(route) if route.sink.subscription() == subscription => {
                routes.remove(identifier);
                true
            }
            _ => false,
        }
    }

    /// True if `subscription` is the confirmed owner of `identifier`.
    pub async fn is_open(&self, identifier: &str, subscription: SubscriptionId) -> bool {
        self.inner
            .routes
            .read()
            .await
            .get(identifier)
            .is_some_and(|r| r.pending.is_none() && r.sink.subscription() == subscription)
    }

    pub async fn confirm(&self, identifier: &str) {
        let mut routes = self.inner.routes.write().await;
        if let Some(tx) = routes.get_mut(identifier).and_then(|r| r.pending.take()) {
            let _ = tx.send(true);
        }
    }

    pub async fn reject(&self, identifier: &str) {
        let route = self.inner.routes.write().await.remove(identifier);
        if let Some(tx) = route.and_then(|r| r.pending) {
            let _ = tx.send(false);
        }
    }

    /// Decode a broadcast and hand it to the route's sink.
    pub async fn dispatch(&self, identifier: &str, message: Value) {
        let routes = self.inner.routes.read().await;
        let Some(route) = routes.get(identifier) else {
            debug!("Dropping broadcast for unknown subscription {}", identifier);
            return;
        };
        match serde_json::from_value::<LiveEvent>(message) {
            Ok(event) => {
                if !route.sink.deliver(event) {
                    debug!("Sink for {} is closed", identifier);
                }
            }
            Err(e) => warn!("Unknown live event on {}: {}", identifier, e),
        }
    }

    /// Tell every open subscription the connection is gone and forget them all.
    pub async fn fail_all(&self, reason: &str) {
        let routes: Vec<Route> = self.inner.routes.write().await.drain().map(|(_, r)| r).collect();
        for route in routes {
            // Dropping a pending waiter resolves its handshake as closed.
            if route.pending.is_none() {
                route.sink.deliver(LiveEvent::Disconnected {
                    reason: reason.to_string(),
                });
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.routes.read().await.len()
    }
}
