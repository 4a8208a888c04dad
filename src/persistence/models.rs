//! Database row models and their conversion into domain types.
//!
//! Rows carry raw column values (`Uuid`, `String` status columns). The
//! `TryFrom` conversions parse status strings and fail with
//! [`MatchError::Internal`] on values the schema should have rejected.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    DeployedPrompt, MatchFlags, MatchResult, MatchStatus, MatchingSession, PromptStatus,
    RelationLevel, Relationship, UserProfile,
};
use crate::error::MatchError;

/// Columns selected for every match row: `match_results` joined with the
/// anchoring `matching_sessions` row.
pub const MATCH_COLUMNS: &str = "m.id, m.pair_id, m.session_id, s.user_id AS owner_id, \
     s.prompt_id, m.matched_user_id, m.compatibility_score, m.theme_match, m.question_match, \
     m.personality_match, m.location_match, m.status, m.side_a_accepted, m.side_b_accepted, \
     m.expires_at, m.confirmed_at, m.created_at";

/// A `match_results` row joined with its session.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MatchRow {
    /// Row ID.
    pub id: Uuid,
    /// Pair the row belongs to.
    pub pair_id: Uuid,
    /// Anchoring session.
    pub session_id: Uuid,
    /// Owner of the anchoring session.
    pub owner_id: Uuid,
    /// Prompt of the anchoring session.
    pub prompt_id: Uuid,
    /// Other party.
    pub matched_user_id: Uuid,
    /// Compatibility score.
    pub compatibility_score: f64,
    /// Theme flag.
    pub theme_match: bool,
    /// Question flag.
    pub question_match: bool,
    /// Personality flag.
    pub personality_match: bool,
    /// Location flag.
    pub location_match: bool,
    /// Status string.
    pub status: String,
    /// Side A flag.
    pub side_a_accepted: bool,
    /// Side B flag.
    pub side_b_accepted: bool,
    /// Expiration.
    pub expires_at: DateTime<Utc>,
    /// Confirmation timestamp.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for MatchResult {
    type Error = MatchError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<MatchStatus>()
            .map_err(MatchError::Internal)?;
        Ok(Self {
            id: row.id.into(),
            pair_id: row.pair_id.into(),
            session_id: row.session_id.into(),
            owner_id: row.owner_id.into(),
            prompt_id: row.prompt_id.into(),
            matched_user_id: row.matched_user_id.into(),
            compatibility_score: row.compatibility_score,
            flags: MatchFlags {
                theme_match: row.theme_match,
                question_match: row.question_match,
                personality_match: row.personality_match,
                location_match: row.location_match,
            },
            status,
            side_a_accepted: row.side_a_accepted,
            side_b_accepted: row.side_b_accepted,
            expires_at: row.expires_at,
            confirmed_at: row.confirmed_at,
            created_at: row.created_at,
        })
    }
}

/// A `matching_sessions` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    /// Session ID.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Prompt.
    pub prompt_id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<SessionRow> for MatchingSession {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            prompt_id: row.prompt_id.into(),
            created_at: row.created_at,
        }
    }
}

/// A `deployed_prompts` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromptRow {
    /// Prompt ID.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Theme.
    pub theme_id: Uuid,
    /// Theme display name.
    pub theme_name: String,
    /// Question text.
    pub question: String,
    /// Status string.
    pub status: String,
    /// Deployment timestamp.
    pub deployed_at: DateTime<Utc>,
    /// Expiration.
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<PromptRow> for DeployedPrompt {
    type Error = MatchError;

    fn try_from(row: PromptRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<PromptStatus>()
            .map_err(MatchError::Internal)?;
        Ok(Self {
            id: row.id.into(),
            owner_id: row.user_id.into(),
            theme_id: row.theme_id.into(),
            theme_name: row.theme_name,
            question: row.question,
            status,
            deployed_at: row.deployed_at,
            expires_at: row.expires_at,
        })
    }
}

/// A `users` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// User ID.
    pub id: Uuid,
    /// Full name.
    pub name: Option<String>,
    /// Handle.
    pub username: Option<String>,
    /// Avatar location.
    pub profile_picture_url: Option<String>,
    /// Personality blurb.
    pub personality_summary: Option<String>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            username: row.username,
            profile_picture_url: row.profile_picture_url,
            personality_summary: row.personality_summary,
        }
    }
}

/// A `relationships` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RelationshipRow {
    /// Relationship ID.
    pub id: Uuid,
    /// Edge source.
    pub relating_user_id: Uuid,
    /// Edge target.
    pub related_user_id: Uuid,
    /// Level string.
    pub relation_level: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RelationshipRow> for Relationship {
    type Error = MatchError;

    fn try_from(row: RelationshipRow) -> Result<Self, Self::Error> {
        let level = row
            .relation_level
            .parse::<RelationLevel>()
            .map_err(MatchError::Internal)?;
        Ok(Self {
            id: row.id.into(),
            relating_user_id: row.relating_user_id.into(),
            related_user_id: row.related_user_id.into(),
            level,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn match_row(status: &str) -> MatchRow {
        let now = Utc::now();
        MatchRow {
            id: Uuid::new_v4(),
            pair_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            prompt_id: Uuid::new_v4(),
            matched_user_id: Uuid::new_v4(),
            compatibility_score: 0.9,
            theme_match: false,
            question_match: true,
            personality_match: false,
            location_match: false,
            status: status.to_string(),
            side_a_accepted: true,
            side_b_accepted: false,
            expires_at: now,
            confirmed_at: None,
            created_at: now,
        }
    }

    #[test]
    fn match_row_converts() {
        let row = match_row("PENDING");
        let owner = row.owner_id;
        let Ok(result) = MatchResult::try_from(row) else {
            panic!("conversion failed");
        };
        assert_eq!(result.status, MatchStatus::Pending);
        assert_eq!(*result.owner_id.as_uuid(), owner);
        assert!(result.flags.question_match);
        assert!(result.side_a_accepted);
    }

    #[test]
    fn unknown_status_is_internal_error() {
        let err = MatchResult::try_from(match_row("MAYBE"));
        assert!(matches!(err, Err(MatchError::Internal(_))));
    }
}
