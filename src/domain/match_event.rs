//! Lifecycle events pushed to connected users.
//!
//! Every event is emitted after the state change it describes has been
//! persisted; delivery is best-effort and at-most-once.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{MatchId, MatchStatus, MatchSummary, RelationshipId, UserId};

/// Event delivered to a single user's live connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// A new match was created with the recipient as a party.
    NewMatchAvailable {
        /// Recipient.
        user_id: UserId,
        /// Row anchored in the recipient's session.
        match_id: MatchId,
        /// Display data for the match.
        match_data: Box<MatchSummary>,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The match moved to a new status or the other party accepted.
    MatchStatusChanged {
        /// Recipient.
        user_id: UserId,
        /// Match concerned.
        match_id: MatchId,
        /// Status after the change.
        status: MatchStatus,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Both parties accepted.
    MatchConfirmed {
        /// Recipient.
        user_id: UserId,
        /// Match concerned.
        match_id: MatchId,
        /// Relationship joining the two users.
        relationship_id: RelationshipId,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl MatchEvent {
    /// Returns the match ID associated with this event.
    #[must_use]
    pub fn match_id(&self) -> MatchId {
        match self {
            Self::NewMatchAvailable { match_id, .. }
            | Self::MatchStatusChanged { match_id, .. }
            | Self::MatchConfirmed { match_id, .. } => *match_id,
        }
    }

    /// Returns the recipient of this event.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        match self {
            Self::NewMatchAvailable { user_id, .. }
            | Self::MatchStatusChanged { user_id, .. }
            | Self::MatchConfirmed { user_id, .. } => *user_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::NewMatchAvailable { .. } => "new_match_available",
            Self::MatchStatusChanged { .. } => "match_status_changed",
            Self::MatchConfirmed { .. } => "match_confirmed",
        }
    }
}
