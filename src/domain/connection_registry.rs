//! Registry of live push connections, keyed by user.
//!
//! [`ConnectionRegistry`] maps each connected user to the sending half of a
//! bounded channel drained by that user's WebSocket task. The map sits
//! behind a `parking_lot::RwLock` so lookups and pushes never suspend.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::{ConnectionId, MatchEvent, UserId};

/// Sending half of one user's live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Identifier of the connection.
    pub id: ConnectionId,
    sender: mpsc::Sender<MatchEvent>,
}

/// Outcome of a push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The event was queued on the connection.
    Delivered,
    /// The connection is gone or was replaced.
    NotConnected,
    /// The connection's buffer is full; the event was dropped.
    Saturated,
}

/// Concurrent `user -> connection` map.
///
/// # Concurrency
///
/// - Any number of pushes and lookups run concurrently.
/// - Connect and disconnect take the write lock briefly.
/// - A user has at most one mapping; connecting again replaces it, which
///   closes the previous connection's channel.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, ConnectionHandle>>,
    buffer: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry whose connections buffer up to `buffer`
    /// undelivered events each.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Registers a new connection for `user_id`, replacing any previous one.
    ///
    /// Returns the connection identifier and the receiver the connection
    /// task drains.
    pub fn connect(&self, user_id: UserId) -> (ConnectionId, mpsc::Receiver<MatchEvent>) {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = ConnectionId::new();
        let previous = self
            .connections
            .write()
            .insert(user_id, ConnectionHandle { id, sender });
        if let Some(previous) = previous {
            tracing::debug!(%user_id, replaced = %previous.id, "connection replaced");
        }
        tracing::info!(%user_id, connection_id = %id, "user connected");
        (id, receiver)
    }

    /// Removes the mapping for `user_id` if it still belongs to
    /// `connection_id`. Returns `true` if a mapping was removed.
    pub fn disconnect(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        let mut map = self.connections.write();
        let owned = map.get(&user_id).is_some_and(|h| h.id == connection_id);
        if owned {
            map.remove(&user_id);
            tracing::info!(%user_id, %connection_id, "user disconnected");
        }
        owned
    }

    /// Returns the current connection of `user_id`, if any.
    #[must_use]
    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionId> {
        self.connections.read().get(&user_id).map(|h| h.id)
    }

    /// Queues `event` on `connection_id` without waiting.
    pub fn push(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        event: MatchEvent,
    ) -> PushOutcome {
        let map = self.connections.read();
        let Some(handle) = map.get(&user_id).filter(|h| h.id == connection_id) else {
            return PushOutcome::NotConnected;
        };
        match handle.sender.try_send(event) {
            Ok(()) => PushOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => PushOutcome::Saturated,
            Err(mpsc::error::TrySendError::Closed(_)) => PushOutcome::NotConnected,
        }
    }

    /// Returns the number of connected users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` if nobody is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{MatchId, MatchStatus};

    fn event(user_id: UserId) -> MatchEvent {
        MatchEvent::MatchStatusChanged {
            user_id,
            match_id: MatchId::new(),
            status: MatchStatus::Pending,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn connect_push_receive() {
        let registry = ConnectionRegistry::new(8);
        let user = UserId::new();
        let (conn, mut rx) = registry.connect(user);

        assert_eq!(registry.lookup(user), Some(conn));
        assert_eq!(registry.push(user, conn, event(user)), PushOutcome::Delivered);

        let Some(received) = rx.recv().await else {
            panic!("expected event");
        };
        assert_eq!(received.user_id(), user);
    }

    #[test]
    fn reconnect_replaces_and_stale_disconnect_is_ignored() {
        let registry = ConnectionRegistry::new(8);
        let user = UserId::new();
        let (first, _rx1) = registry.connect(user);
        let (second, _rx2) = registry.connect(user);

        assert_eq!(registry.len(), 1);
        assert!(!registry.disconnect(user, first));
        assert_eq!(registry.lookup(user), Some(second));
        assert_eq!(
            registry.push(user, first, event(user)),
            PushOutcome::NotConnected
        );

        assert!(registry.disconnect(user, second));
        assert!(registry.is_empty());
    }

    #[test]
    fn full_buffer_drops_event() {
        let registry = ConnectionRegistry::new(1);
        let user = UserId::new();
        let (conn, _rx) = registry.connect(user);

        assert_eq!(registry.push(user, conn, event(user)), PushOutcome::Delivered);
        assert_eq!(registry.push(user, conn, event(user)), PushOutcome::Saturated);
    }

    #[test]
    fn dropped_receiver_reports_not_connected() {
        let registry = ConnectionRegistry::new(4);
        let user = UserId::new();
        let (conn, rx) = registry.connect(user);
        drop(rx);
        assert_eq!(
            registry.push(user, conn, event(user)),
            PushOutcome::NotConnected
        );
    }
}
