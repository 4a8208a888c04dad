//! Public user profile as exposed by the user directory.

use serde::Serialize;

use super::UserId;

/// Profile fields shown to the other party of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Full name, if set.
    pub name: Option<String>,
    /// Handle, if set.
    pub username: Option<String>,
    /// Avatar location.
    pub profile_picture_url: Option<String>,
    /// Generated personality blurb.
    pub personality_summary: Option<String>,
}

impl UserProfile {
    /// Profile with only an identifier; used when the directory has no
    /// record for a counterpart.
    #[must_use]
    pub fn anonymous(id: UserId) -> Self {
        Self {
            id,
            name: None,
            username: None,
            profile_picture_url: None,
            personality_summary: None,
        }
    }

    /// Name to display: full name, then username, then `"Anonymous"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.username.as_deref().filter(|u| !u.is_empty()))
            .unwrap_or("Anonymous")
    }
}
