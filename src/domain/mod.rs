//! Domain layer: core types, lifecycle events, and the push channel.
//!
//! This module contains the match model (sessions, directional match
//! results, relationships, history), the compatibility score, the events
//! emitted on lifecycle transitions, and the connection registry with the
//! dispatcher that pushes those events to connected users.

pub mod compatibility;
pub mod connection_registry;
pub mod ids;
pub mod match_event;
pub mod match_result;
pub mod notifier;
pub mod prompt;
pub mod relationship;
pub mod session;
pub mod summary;
pub mod user;

pub use connection_registry::ConnectionRegistry;
pub use ids::{
    ConnectionId, MatchId, PairId, PromptId, RelationshipId, SessionId, ThemeId, UserId,
};
pub use match_event::MatchEvent;
pub use match_result::{MatchFlags, MatchResult, MatchStatus, Side};
pub use notifier::NotificationDispatcher;
pub use prompt::{DeployedPrompt, PromptStatus};
pub use relationship::{MatchType, RelationLevel, Relationship, UserMatchHistory};
pub use session::MatchingSession;
pub use summary::MatchSummary;
pub use user::UserProfile;
