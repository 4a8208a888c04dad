//! Best-effort delivery of [`MatchEvent`]s to connected users.
//!
//! [`NotificationDispatcher`] never blocks and never fails its caller: the
//! state an event describes is already persisted, so a missed event only
//! costs real-time freshness. Events are not queued for offline users.

use std::sync::Arc;

use super::connection_registry::{ConnectionRegistry, PushOutcome};
use super::{MatchEvent, UserId};

/// Pushes events through an injected [`ConnectionRegistry`].
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the registry connections are tracked in.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Delivers `event` to `target` if they currently have a connection.
    ///
    /// Returns `true` if the event was handed to the connection.
    pub fn notify(&self, target: UserId, event: MatchEvent) -> bool {
        let event_type = event.event_type_str();
        let Some(connection_id) = self.registry.lookup(target) else {
            tracing::debug!(user_id = %target, event_type, "user not connected, event not delivered");
            return false;
        };

        match self.registry.push(target, connection_id, event) {
            PushOutcome::Delivered => {
                tracing::debug!(user_id = %target, %connection_id, event_type, "event delivered");
                true
            }
            PushOutcome::Saturated => {
                tracing::warn!(user_id = %target, %connection_id, event_type, "connection buffer full, event dropped");
                false
            }
            PushOutcome::NotConnected => {
                tracing::debug!(user_id = %target, event_type, "connection closed before delivery");
                false
            }
        }
    }
}
