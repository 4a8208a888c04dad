//! Relationships and the per-pair match history.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{RelationshipId, UserId};

/// Visibility level of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationLevel {
    /// Visible to others; the level created by match confirmation.
    Public,
    /// Visible only to the two parties.
    Private,
}

impl RelationLevel {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
        }
    }
}

impl FromStr for RelationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(Self::Public),
            "PRIVATE" => Ok(Self::Private),
            other => Err(format!("unknown relation level {other}")),
        }
    }
}

/// A directed edge between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    /// Relationship identifier.
    pub id: RelationshipId,
    /// User the edge starts from.
    pub relating_user_id: UserId,
    /// User the edge points to.
    pub related_user_id: UserId,
    /// Visibility level.
    pub level: RelationLevel,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Returns `true` if the edge joins `a` and `b` in either direction.
    #[must_use]
    pub fn connects(&self, a: UserId, b: UserId) -> bool {
        (self.relating_user_id == a && self.related_user_id == b)
            || (self.relating_user_id == b && self.related_user_id == a)
    }
}

/// Decision recorded in the match history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// The pair was mutually accepted.
    Accepted,
    /// One side declined.
    Declined,
}

impl MatchType {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
        }
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPTED" => Ok(Self::Accepted),
            "DECLINED" => Ok(Self::Declined),
            other => Err(format!("unknown match type {other}")),
        }
    }
}

/// History row, unique on `(user_id, matched_user_id)`, last write wins.
///
/// Any row in either direction permanently excludes the pair from
/// discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMatchHistory {
    /// User who made (or shared) the decision.
    pub user_id: UserId,
    /// The other party.
    pub matched_user_id: UserId,
    /// Latest decision.
    pub match_type: MatchType,
    /// When the row was last written.
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connects_is_direction_agnostic() {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let rel = Relationship {
            id: RelationshipId::new(),
            relating_user_id: a,
            related_user_id: b,
            level: RelationLevel::Public,
            created_at: Utc::now(),
        };
        assert!(rel.connects(a, b));
        assert!(rel.connects(b, a));
        assert!(!rel.connects(a, c));
    }
}
