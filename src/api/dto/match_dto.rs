//! Match DTOs: summaries, acceptance, confirmation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{MatchSummary, UserProfile};
use crate::service::AcceptanceOutcome;

/// Public profile of the other party.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfileDto {
    /// User identifier.
    pub id: Uuid,
    /// Full name.
    pub name: Option<String>,
    /// Handle.
    pub username: Option<String>,
    /// Avatar URL.
    pub profile_picture_url: Option<String>,
    /// Short personality blurb.
    pub personality_summary: Option<String>,
}

impl From<UserProfile> for UserProfileDto {
    fn from(p: UserProfile) -> Self {
        Self {
            id: p.id.into(),
            name: p.name,
            username: p.username,
            profile_picture_url: p.profile_picture_url,
            personality_summary: p.personality_summary,
        }
    }
}

/// A match as seen by the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummaryDto {
    /// Row the caller acts on.
    pub id: Uuid,
    /// Prompt question.
    pub question: String,
    /// Theme name.
    pub category: String,
    /// Display name of the other party.
    pub user: String,
    /// Profile of the other party.
    pub user_profile: UserProfileDto,
    /// `PENDING`, `CONFIRMED` or `EXPIRED`.
    #[schema(example = "PENDING")]
    pub status: String,
    /// The caller has accepted.
    pub user_accepted: bool,
    /// The other party has accepted.
    pub other_user_accepted: bool,
    /// Relationship created on confirmation.
    pub relationship_id: Option<Uuid>,
    /// Compatibility score in `[0, 1]`.
    pub compatibility_score: f64,
    /// When the anchoring prompt was deployed.
    pub deployed_at: DateTime<Utc>,
    /// When the match stops being offered.
    pub expires_at: DateTime<Utc>,
}

impl From<MatchSummary> for MatchSummaryDto {
    fn from(s: MatchSummary) -> Self {
        Self {
            id: s.id.into(),
            question: s.question,
            category: s.category,
            user: s.user,
            user_profile: s.user_profile.into(),
            status: s.status.as_str().to_string(),
            user_accepted: s.user_accepted,
            other_user_accepted: s.other_user_accepted,
            relationship_id: s.relationship_id.map(Into::into),
            compatibility_score: s.compatibility_score,
            deployed_at: s.deployed_at,
            expires_at: s.expires_at,
        }
    }
}

/// Response body for `POST /matches/{id}/accept`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptMatchResponse {
    /// Status after the call.
    #[schema(example = "CONFIRMED")]
    pub status: String,
    /// Relationship joining the two users, once confirmed.
    pub relationship_id: Option<Uuid>,
    /// User-facing message.
    pub message: String,
}

impl From<AcceptanceOutcome> for AcceptMatchResponse {
    fn from(o: AcceptanceOutcome) -> Self {
        Self {
            status: o.status.as_str().to_string(),
            relationship_id: o.relationship_id.map(Into::into),
            message: o.message,
        }
    }
}

/// Response body for `GET /matches/{id}/confirmation`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmationResponse {
    /// Match queried.
    pub match_id: Uuid,
    /// Both parties have accepted.
    pub confirmed: bool,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{MatchId, MatchStatus, RelationshipId, UserId};

    #[test]
    fn summary_dto_uses_wire_status() {
        let profile = UserProfile {
            id: UserId::new(),
            name: None,
            username: Some("sam".to_string()),
            profile_picture_url: None,
            personality_summary: None,
        };
        let relationship = RelationshipId::new();
        let dto = MatchSummaryDto::from(MatchSummary {
            id: MatchId::new(),
            question: "Q1".to_string(),
            category: "Travel".to_string(),
            user: "sam".to_string(),
            user_profile: profile,
            status: MatchStatus::Confirmed,
            user_accepted: true,
            other_user_accepted: true,
            relationship_id: Some(relationship),
            compatibility_score: 1.0,
            deployed_at: Utc::now(),
            expires_at: Utc::now(),
        });
        assert_eq!(dto.status, "CONFIRMED");
        assert_eq!(dto.relationship_id, Some(Uuid::from(relationship)));
        assert_eq!(dto.user_profile.username.as_deref(), Some("sam"));
    }
}
