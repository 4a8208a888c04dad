//! Match results: one directional half of a match between two users.
//!
//! Every logical match between `U1` and `U2` is stored as two rows sharing
//! a [`PairId`]: one anchored in `U1`'s session pointing at `U2`, and the
//! mirror row anchored in `U2`'s session pointing at `U1`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MatchId, PairId, PromptId, SessionId, UserId};

/// Status of a match result.
///
/// ```text
/// PENDING ──accept(both)──► CONFIRMED
///    │                          │
///    ├──decline / date sweep──► EXPIRED ◄── no conversation after grace
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// Waiting on one or both acceptances.
    Pending,
    /// Both sides accepted.
    Confirmed,
    /// Retired by decline, date sweep, prompt retirement or abandonment.
    Expired,
    /// Legacy terminal state. Declines are recorded as [`Self::Expired`];
    /// rows in this state are only ever read.
    Declined,
}

impl MatchStatus {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Expired => "EXPIRED",
            Self::Declined => "DECLINED",
        }
    }

    /// Returns `true` for states that can never transition again.
    #[must_use]
    pub const fn is_retired(&self) -> bool {
        matches!(self, Self::Expired | Self::Declined)
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "EXPIRED" => Ok(Self::Expired),
            "DECLINED" => Ok(Self::Declined),
            other => Err(format!("unknown match status {other}")),
        }
    }
}

/// Which side of a match row a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Owner of the session the row is anchored in.
    A,
    /// The row's matched user.
    B,
}

impl Side {
    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Criteria that contributed to a compatibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MatchFlags {
    /// Both prompts share a theme.
    pub theme_match: bool,
    /// Both prompts ask the identical question.
    pub question_match: bool,
    /// Personality compatibility (not scored yet, always `false`).
    pub personality_match: bool,
    /// Location compatibility (not scored yet, always `false`).
    pub location_match: bool,
}

/// One directional half of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Row identifier.
    pub id: MatchId,
    /// Identifier shared with the mirror row.
    pub pair_id: PairId,
    /// Session the row is anchored in.
    pub session_id: SessionId,
    /// Owner of `session_id` ("side A").
    pub owner_id: UserId,
    /// Prompt of `session_id`.
    pub prompt_id: PromptId,
    /// The other party ("side B").
    pub matched_user_id: UserId,
    /// Compatibility in `0.0..=1.0`, equal on both rows of a pair.
    pub compatibility_score: f64,
    /// Score breakdown.
    pub flags: MatchFlags,
    /// Current status.
    pub status: MatchStatus,
    /// Side A has accepted.
    pub side_a_accepted: bool,
    /// Side B has accepted.
    pub side_b_accepted: bool,
    /// When the match stops being offered.
    pub expires_at: DateTime<Utc>,
    /// Set exactly when the pair transitions to `CONFIRMED`.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MatchResult {
    /// Returns the side `user_id` is on, or `None` if the user is not a
    /// party to this match.
    #[must_use]
    pub fn side_of(&self, user_id: UserId) -> Option<Side> {
        if self.owner_id == user_id {
            Some(Side::A)
        } else if self.matched_user_id == user_id {
            Some(Side::B)
        } else {
            None
        }
    }

    /// Returns the other party from `user_id`'s point of view.
    #[must_use]
    pub fn counterpart_of(&self, user_id: UserId) -> Option<UserId> {
        match self.side_of(user_id)? {
            Side::A => Some(self.matched_user_id),
            Side::B => Some(self.owner_id),
        }
    }

    /// Whether the given side has accepted.
    #[must_use]
    pub const fn accepted_by(&self, side: Side) -> bool {
        match side {
            Side::A => self.side_a_accepted,
            Side::B => self.side_b_accepted,
        }
    }

    /// Whether both sides have accepted.
    #[must_use]
    pub const fn both_accepted(&self) -> bool {
        self.side_a_accepted && self.side_b_accepted
    }

    /// A row pointing back at its own session owner is corrupt.
    #[must_use]
    pub fn is_self_match(&self) -> bool {
        self.owner_id == self.matched_user_id
    }

    /// Still offered at `now`: pending or confirmed, and not past expiry.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, MatchStatus::Pending | MatchStatus::Confirmed)
            && self.expires_at > now
    }

    /// Retired or past its expiration at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_retired() || self.expires_at < now
    }
}
