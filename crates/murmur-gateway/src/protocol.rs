use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use murmur_types::events::OutboundAction;
use murmur_types::models::ChannelId;

/// Server-side channel class every chat subscription targets.
pub const MESSAGE_CHANNEL: &str = "MessageChannel";

/// Sub-protocol offered during the WebSocket handshake.
pub const SUBPROTOCOL: &str = "actioncable-v1-json";

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Welcome,
    Ping,
    Confirm { identifier: String },
    Reject { identifier: String },
    Disconnect { reason: Option<String>, reconnect: bool },
    Broadcast { identifier: String, message: Value },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    reconnect: Option<bool>,
}

#[derive(Debug, PartialEq, Error)]
pub enum FrameError {
    #[error("invalid frame: {0}")]
    Json(String),

    #[error("unrecognized frame: {0}")]
    Unrecognized(String),
}

pub fn parse_frame(text: &str) -> Result<ServerFrame, FrameError> {
    let raw: RawFrame = serde_json::from_str(text).map_err(|e| FrameError::Json(e.to_string()))?;

    let frame = match (raw.kind.as_deref(), raw.identifier, raw.message) {
        (Some("welcome"), _, _) => ServerFrame::Welcome,
        (Some("ping"), _, _) => ServerFrame::Ping,
        (Some("confirm_subscription"), Some(identifier), _) => ServerFrame::Confirm { identifier },
        (Some("reject_subscription"), Some(identifier), _) => ServerFrame::Reject { identifier },
        (Some("disconnect"), _, _) => ServerFrame::Disconnect {
            reason: raw.reason,
            reconnect: raw.reconnect.unwrap_or(false),
        },
        (None, Some(identifier), Some(message)) => ServerFrame::Broadcast { identifier, message },
        _ => return Err(FrameError::Unrecognized(text.chars().take(200).collect())),
    };
    Ok(frame)
}

/// Identifier naming one channel's subscription. The server echoes it back
/// verbatim, so it doubles as the routing key.
pub fn channel_identifier(channel_id: ChannelId) -> String {
    serde_json::json!({ "channel": MESSAGE_CHANNEL, "server_id": channel_id }).to_string()
}

#[derive(Debug, Serialize)]
struct ClientCommand<'a> {
    command: &'static str,
    identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

pub fn subscribe_command(identifier: &str) -> String {
    command("subscribe", identifier, None)
}

pub fn unsubscribe_command(identifier: &str) -> String {
    command("unsubscribe", identifier, None)
}

/// A `message` command performing `action` on the channel. The payload is a
/// JSON string whose `action` key selects the server-side handler.
pub fn perform_command(
    identifier: &str,
    channel_id: ChannelId,
    action: &OutboundAction,
) -> Result<String, serde_json::Error> {
    let mut data = serde_json::to_value(action)?;
    if let Value::Object(map) = &mut data {
        map.insert("server_id".to_string(), Value::from(channel_id));
    }
    Ok(command("message", identifier, Some(data.to_string())))
}

fn command(name: &'static str, identifier: &str, data: Option<String>) -> String {
    // Serializing a struct of strings cannot fail.
    serde_json::to_string(&ClientCommand {
        command: name,
        identifier,
        data,
    })
    .unwrap_or_default()
}
