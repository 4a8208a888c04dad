//! WebSocket message types: envelope and client commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::MatchEvent;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client lifecycle event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Keep-alive; answered with `pong`.
    Ping,
}

impl WsMessage {
    /// Wraps a lifecycle event for delivery.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the event cannot be encoded.
    pub fn event(event: &MatchEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Event,
            timestamp: Utc::now(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// Response to the command with `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Response,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Error reply with an HTTP-like `code`.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({ "code": code, "message": message }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MatchId, MatchStatus, UserId};

    #[test]
    fn event_envelope_carries_tagged_payload() {
        let event = MatchEvent::MatchStatusChanged {
            user_id: UserId::new(),
            match_id: MatchId::new(),
            status: MatchStatus::Expired,
            timestamp: Utc::now(),
        };
        let Ok(msg) = WsMessage::event(&event) else {
            panic!("event should encode");
        };
        assert_eq!(msg.msg_type, WsMessageType::Event);
        assert_eq!(
            msg.payload.get("event_type").and_then(|v| v.as_str()),
            Some("match_status_changed")
        );

        let json = serde_json::to_string(&msg).unwrap_or_default();
        assert!(json.contains("\"type\":\"event\""));
    }

    #[test]
    fn ping_command_parses() {
        let payload = serde_json::json!({ "command": "ping" });
        assert!(matches!(
            serde_json::from_value::<WsCommand>(payload),
            Ok(WsCommand::Ping)
        ));
    }
}
