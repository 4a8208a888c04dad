//! Deployed prompts as read from the prompt catalog.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{PromptId, ThemeId, UserId};

/// Lifecycle status of a deployed prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptStatus {
    /// Eligible for matching.
    Active,
    /// Passed its expiration or was superseded by a newer prompt.
    Expired,
    /// Withdrawn by its owner.
    Cancelled,
}

impl PromptStatus {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for PromptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "EXPIRED" => Ok(Self::Expired),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown prompt status {other}")),
        }
    }
}

/// A user's question and theme pairing, as deployed for matching.
///
/// The engine never writes prompts; they are owned by the route layer.
#[derive(Debug, Clone, Serialize)]
pub struct DeployedPrompt {
    /// Prompt identifier.
    pub id: PromptId,
    /// Owning user.
    pub owner_id: UserId,
    /// Theme the question belongs to.
    pub theme_id: ThemeId,
    /// Display name of the theme, shown as the match category.
    pub theme_name: String,
    /// Question text, compared verbatim during discovery.
    pub question: String,
    /// Current lifecycle status.
    pub status: PromptStatus,
    /// When the prompt was deployed.
    pub deployed_at: DateTime<Utc>,
    /// When the prompt stops being eligible (deployment + 3 days).
    pub expires_at: DateTime<Utc>,
}

impl DeployedPrompt {
    /// Returns `true` if the prompt is `ACTIVE` and not yet past its
    /// expiration at `now`.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PromptStatus::Active && self.expires_at > now
    }
}
