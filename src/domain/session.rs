//! Matching sessions: the per-(user, prompt) anchor of match results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{PromptId, SessionId, UserId};

/// Anchor for the match results discovered for one user's prompt.
///
/// Created lazily and reused: there is at most one session per
/// `(user_id, prompt_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchingSession {
    /// Session identifier.
    pub id: SessionId,
    /// Owning user ("side A" of every match anchored here).
    pub user_id: UserId,
    /// Prompt the session was opened for.
    pub prompt_id: PromptId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MatchingSession {
    /// Creates a new session for the given user and prompt.
    #[must_use]
    pub fn new(user_id: UserId, prompt_id: PromptId) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            prompt_id,
            created_at: Utc::now(),
        }
    }
}
