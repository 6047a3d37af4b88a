use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;

use murmur_gateway::protocol::{SUBPROTOCOL, channel_identifier};
use murmur_gateway::{CableClient, CableConfig};
use murmur_sync::{EventSink, LiveChannel, LiveError};
use murmur_types::events::{LiveEvent, OutboundAction};

/// A minimal cable server: welcomes the client, confirms every subscription
/// except channel 13, and reports each `message` command's data on `performed`.
async fn spawn_server(performed: mpsc::UnboundedSender<Value>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |_: &Request, mut response: Response| {
            response
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
            Ok::<_, ErrorResponse>(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();
        ws.send(Message::text(json!({ "type": "welcome" }).to_string()))
            .await
            .unwrap();

        let mut pings = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                inbound = ws.next() => {
                    let Some(Ok(Message::Text(text))) = inbound else {
                        break;
                    };
                    let command: Value = serde_json::from_str(text.as_str()).unwrap();
                    let identifier = command["identifier"].as_str().unwrap().to_string();
                    match command["command"].as_str().unwrap() {
                        "subscribe" => {
                            let kind = if identifier == channel_identifier(13) {
                                "reject_subscription"
                            } else {
                                "confirm_subscription"
                            };
                            let reply = json!({ "type": kind, "identifier": &identifier });
                            ws.send(Message::text(reply.to_string())).await.unwrap();
                            if kind == "confirm_subscription" {
                                let broadcast = json!({
                                    "identifier": &identifier,
                                    "message": { "type": "message_deleted", "message_id": 42 }
                                });
                                ws.send(Message::text(broadcast.to_string())).await.unwrap();
                            }
                        }
                        "message" => {
                            let data: Value = serde_json::from_str(command["data"].as_str().unwrap()).unwrap();
                            let _ = performed.send(data);
                        }
                        _ => {}
                    }
                }
                _ = pings.tick() => {
                    let ping = json!({ "type": "ping", "message": 0 });
                    if ws.send(Message::text(ping.to_string())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    format!("ws://{}/cable", addr)
}

fn config(url: String) -> CableConfig {
    CableConfig {
        url,
        origin: Some("http://localhost:3000".into()),
        cookie: Some("_session=abc".into()),
        subscribe_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn subscribe_receive_and_perform() {
    let (performed_tx, mut performed) = mpsc::unbounded_channel();
    let url = spawn_server(performed_tx).await;
    let client = CableClient::connect(config(url)).await.unwrap();
    assert!(client.is_connected());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = EventSink::new(7, tx);
    let subscription = sink.subscription();
    let handle = client.subscribe(7, sink).await.unwrap();
    assert_eq!(handle.channel_id, 7);
    assert_eq!(handle.id, subscription);

    let envelope = rx.recv().await.unwrap();
    assert_eq!(envelope.subscription, subscription);
    assert_eq!(envelope.event, LiveEvent::MessageDeleted { message_id: 42 });

    let action = OutboundAction::CreateReaction {
        message_id: 42,
        emoji: "🎉".into(),
    };
    client.send(&handle, action).await.unwrap();
    let data = performed.recv().await.unwrap();
    assert_eq!(data["action"], "create_reaction");
    assert_eq!(data["server_id"], 7);

    client.unsubscribe(&handle).await.unwrap();
    let action = OutboundAction::DeleteReaction {
        message_id: 42,
        emoji: "🎉".into(),
    };
    assert!(matches!(
        client.send(&handle, action).await,
        Err(LiveError::NotSubscribed(7))
    ));
}

#[tokio::test]
async fn rejected_subscription() {
    let (performed_tx, _performed) = mpsc::unbounded_channel();
    let url = spawn_server(performed_tx).await;
    let client = CableClient::connect(config(url)).await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = client.subscribe(13, EventSink::new(13, tx)).await;
    assert!(matches!(result, Err(LiveError::Rejected(13))));
}

#[tokio::test]
async fn connect_fails_without_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(CableClient::connect(config(format!("ws://{}/cable", addr))).await.is_err());
}
