//! WebSocket pump for streaming subscribers.
//!
//! Each connection registers with the broadcaster and runs two
//! halves: a forward task draining the subscriber's frame queue into
//! the socket, and an inbound loop answering pings. Either half
//! failing tears the subscriber down.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tracing::debug;

use pulsemon_broadcast::{Broadcaster, Frame};

use crate::ApiState;

/// GET /ws
pub async fn ws_handler(
    State(state): State<ApiState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.broadcaster.clone()))
}

async fn handle_socket(socket: WebSocket, broadcaster: Broadcaster) {
    let (id, mut frames) = broadcaster.register();
    let (mut sink, mut stream) = socket.split();

    let forward = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                match value.get("type").and_then(Value::as_str) {
                    Some("ping") => broadcaster.send_to(id, Frame::pong()),
                    // Accepted; the core does not filter per-client.
                    Some("subscribe") => {}
                    other => {
                        debug!(subscriber = id, kind = ?other, "ignoring inbound message");
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    broadcaster.unregister(id);
    forward.abort();
}
