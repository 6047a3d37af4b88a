use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{COOKIE, ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use murmur_sync::{ChannelHandle, EventSink, LiveChannel, LiveError};
use murmur_types::events::OutboundAction;
use murmur_types::models::ChannelId;

use crate::protocol::{self, ServerFrame};
use crate::router::Router;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The server pings every 3 seconds. Two silent intervals mean the socket is stale.
const PING_INTERVAL: Duration = Duration::from_secs(3);
const MAX_MISSED_PINGS: u8 = 2;

const WELCOME_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECTION_LOST: &str = "Connection to chat server lost";

#[derive(Debug, Clone)]
pub struct CableConfig {
    /// `ws://` or `wss://` endpoint, usually ending in `/cable`.
    pub url: String,
    pub origin: Option<String>,
    /// Session cookie forwarded on the upgrade request.
    pub cookie: Option<String>,
    pub subscribe_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] tungstenite::http::header::InvalidHeaderValue),

    #[error("server did not send a welcome")]
    NoWelcome,

    #[error("server refused the connection: {0}")]
    Refused(String),
}

/// One ActionCable connection shared by every channel subscription.
///
/// Cloning is cheap; all clones feed the same socket.
#[derive(Clone)]
pub struct CableClient {
    commands: mpsc::UnboundedSender<String>,
    router: Router,
    subscribe_timeout: Duration,
}

impl CableClient {
    /// Open the socket, wait for the server's welcome and start the
    /// background connection loop.
    pub async fn connect(config: CableConfig) -> Result<Self, ConnectError> {
        let mut request = config.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(protocol::SUBPROTOCOL));
        if let Some(origin) = &config.origin {
            headers.insert(ORIGIN, HeaderValue::from_str(origin)?);
        }
        if let Some(cookie) = &config.cookie {
            headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
        }

        let (socket, _) = tokio_tungstenite::connect_async(request).await?;
        let (sender, mut receiver) = socket.split();

        wait_for_welcome(&mut receiver).await?;
        info!("Connected to {}", config.url);

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let router = Router::new();
        tokio::spawn(run_connection_loop(sender, receiver, commands_rx, router.clone()));

        Ok(Self {
            commands,
            router,
            subscribe_timeout: config.subscribe_timeout,
        })
    }

    /// False once the connection loop has exited.
    pub fn is_connected(&self) -> bool {
        !self.commands.is_closed()
    }

    fn push(&self, frame: String) -> Result<(), LiveError> {
        self.commands.send(frame).map_err(|_| LiveError::Closed)
    }
}

impl LiveChannel for CableClient {
    async fn subscribe(&self, channel_id: ChannelId, sink: EventSink) -> Result<ChannelHandle, LiveError> {
        let identifier = protocol::channel_identifier(channel_id);
        let handle = ChannelHandle::for_sink(&sink);

        let confirmed = self.router.register(identifier.clone(), sink).await;
        if let Err(e) = self.push(protocol::subscribe_command(&identifier)) {
            self.router.unregister(&identifier, handle.id).await;
            return Err(e);
        }

        match tokio::time::timeout(self.subscribe_timeout, confirmed).await {
            Ok(Ok(true)) => {
                info!("Subscribed to channel {}", channel_id);
                Ok(handle)
            }
            Ok(Ok(false)) => {
                warn!("Subscription to channel {} rejected", channel_id);
                Err(LiveError::Rejected(channel_id))
            }
            Ok(Err(_)) => Err(LiveError::Closed),
            Err(_) => {
                warn!("Subscription to channel {} timed out", channel_id);
                if self.router.unregister(&identifier, handle.id).await {
                    let _ = self.push(protocol::unsubscribe_command(&identifier));
                }
                Err(LiveError::Timeout(channel_id))
            }
        }
    }

    async fn unsubscribe(&self, handle: &ChannelHandle) -> Result<(), LiveError> {
        let identifier = protocol::channel_identifier(handle.channel_id);
        if !self.router.unregister(&identifier, handle.id).await {
            debug!("Channel {} was already unsubscribed", handle.channel_id);
            return Ok(());
        }
        info!("Unsubscribed from channel {}", handle.channel_id);
        self.push(protocol::unsubscribe_command(&identifier))
    }

    async fn send(&self, handle: &ChannelHandle, action: OutboundAction) -> Result<(), LiveError> {
        let identifier = protocol::channel_identifier(handle.channel_id);
        if !self.router.is_open(&identifier, handle.id).await {
            return Err(LiveError::NotSubscribed(handle.channel_id));
        }
        let frame = protocol::perform_command(&identifier, handle.channel_id, &action)
            .map_err(|e| LiveError::Encode(e.to_string()))?;
        debug!("Performing {} on channel {}", action.name(), handle.channel_id);
        self.push(frame)
    }
}

async fn wait_for_welcome(receiver: &mut SplitStream<Socket>) -> Result<(), ConnectError> {
    let welcome = tokio::time::timeout(WELCOME_TIMEOUT, async {
        while let Some(msg) = receiver.next().await {
            let Message::Text(text) = msg? else {
                continue;
            };
            match protocol::parse_frame(text.as_str()) {
                Ok(ServerFrame::Welcome) => return Ok(()),
                Ok(ServerFrame::Disconnect { reason, .. }) => {
                    return Err(ConnectError::Refused(reason.unwrap_or_default()));
                }
                Ok(_) => {}
                Err(e) => warn!("Ignoring frame before welcome: {}", e),
            }
        }
        Err(ConnectError::NoWelcome)
    });

    welcome.await.unwrap_or(Err(ConnectError::NoWelcome))
}

async fn run_connection_loop(
    mut sender: SplitSink<Socket, Message>,
    mut receiver: SplitStream<Socket>,
    mut commands: mpsc::UnboundedReceiver<String>,
    router: Router,
) {
    let mut watchdog = tokio::time::interval(PING_INTERVAL);
    watchdog.tick().await;
    let mut ping_seen = true;
    let mut missed_pings: u8 = 0;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(frame) = command else {
                    break;
                };
                trace!("-> {}", frame);
                if sender.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => {
                let text = match inbound {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                };
                match protocol::parse_frame(text.as_str()) {
                    Ok(ServerFrame::Ping) => ping_seen = true,
                    Ok(ServerFrame::Welcome) => {}
                    Ok(ServerFrame::Confirm { identifier }) => router.confirm(&identifier).await,
                    Ok(ServerFrame::Reject { identifier }) => router.reject(&identifier).await,
                    Ok(ServerFrame::Broadcast { identifier, message }) => {
                        router.dispatch(&identifier, message).await;
                    }
                    Ok(ServerFrame::Disconnect { reason, reconnect }) => {
                        warn!(
                            "Server closed the connection (reason: {}, reconnect: {})",
                            reason.as_deref().unwrap_or("none"),
                            reconnect
                        );
                        break;
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            _ = watchdog.tick() => {
                if std::mem::replace(&mut ping_seen, false) {
                    missed_pings = 0;
                } else {
                    missed_pings += 1;
                    if missed_pings >= MAX_MISSED_PINGS {
                        warn!("No ping for {} intervals, dropping connection", missed_pings);
                        break;
                    }
                }
            }
        }
    }

    // Stop accepting commands before subscribers hear about the loss.
    commands.close();
    let _ = sender.close().await;
    router.fail_all(CONNECTION_LOST).await;
    info!("Disconnected from chat server");
}
