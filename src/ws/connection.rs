//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single user's connection: lifecycle
//! events queued by the dispatcher are forwarded to the socket, and the
//! few client commands are answered inline.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::messages::{WsCommand, WsMessage};
use crate::domain::{ConnectionRegistry, MatchEvent, UserId};

/// Runs the read/write loop for `user_id` until either side closes.
///
/// The connection is registered on entry and unregistered on exit; a
/// newer connection for the same user replaces this one, which ends the
/// loop once its channel closes.
pub async fn run_connection(socket: WebSocket, user_id: UserId, registry: Arc<ConnectionRegistry>) {
    let (connection_id, mut events) = registry.connect(user_id);
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text);
                        if let Some(json) = reply
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%user_id, error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Event from the dispatcher
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!(%user_id, %connection_id, "connection replaced");
                    break;
                };
                let Some(json) = encode_event(&event) else {
                    continue;
                };
                if ws_tx.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
        }
    }

    registry.disconnect(user_id, connection_id);
    tracing::debug!(%user_id, %connection_id, "ws connection closed");
}

/// Encodes an event envelope. Events that fail to encode are logged and
/// skipped rather than sent as empty frames.
fn encode_event(event: &MatchEvent) -> Option<String> {
    match WsMessage::event(event).and_then(|msg| serde_json::to_string(&msg)) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(
                user_id = %event.user_id(),
                match_id = %event.match_id(),
                error = %e,
                "event encoding failed, skipped"
            );
            None
        }
    }
}

/// Handles a text message from the client, returning an optional JSON reply.
fn handle_text_message(text: &str) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };

    let reply = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(WsCommand::Ping) => WsMessage::response(msg.id, serde_json::json!({ "pong": true })),
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    };
    serde_json::to_string(&reply).ok()
}
