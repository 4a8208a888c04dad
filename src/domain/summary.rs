//! Caller-perspective view of a match.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{MatchId, MatchStatus, RelationshipId, UserProfile};

/// A match as seen by one of its parties.
///
/// Acceptance flags are re-oriented so that `user_accepted` always refers
/// to the viewer, whichever side of the row they are on.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    /// Row identifier the viewer acts on.
    pub id: MatchId,
    /// Question of the prompt the row is anchored to.
    pub question: String,
    /// Theme name of that prompt.
    pub category: String,
    /// Display name of the other party.
    pub user: String,
    /// Profile of the other party.
    pub user_profile: UserProfile,
    /// Current status.
    pub status: MatchStatus,
    /// The viewer has accepted.
    pub user_accepted: bool,
    /// The other party has accepted.
    pub other_user_accepted: bool,
    /// Relationship created on confirmation.
    pub relationship_id: Option<RelationshipId>,
    /// Compatibility score.
    pub compatibility_score: f64,
    /// When the anchoring prompt was deployed.
    pub deployed_at: DateTime<Utc>,
    /// When the match stops (or stopped) being offered.
    pub expires_at: DateTime<Utc>,
}
