//! Persistence layer: store seams for the match engine and its
//! collaborators.
//!
//! The engine owns sessions, match results and match history
//! ([`MatchStore`]). Users, prompts, relationships and messages belong to
//! other parts of the system and are reached through narrow read/write
//! traits. Two backends implement every trait:
//!
//! - [`postgres::PostgresStore`]: `sqlx::PgPool`, transactions and row locks.
//! - [`memory::MemoryStore`]: a single `RwLock` over in-process maps, used
//!   when persistence is disabled and as the test fixture.

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::compatibility::Compatibility;
use crate::domain::{
    DeployedPrompt, MatchId, MatchResult, MatchType, MatchingSession, PairId, PromptId,
    RelationLevel, Relationship, SessionId, ThemeId, UserId, UserProfile,
};
use crate::error::MatchError;

/// Everything needed to create both rows of a match in one unit of work.
#[derive(Debug, Clone)]
pub struct NewMatchPair {
    /// Session of the user who ran discovery (row A is anchored here).
    pub initiator_session_id: SessionId,
    /// User who ran discovery.
    pub initiator_id: UserId,
    /// Counterpart found by discovery.
    pub counterpart_id: UserId,
    /// Counterpart's active prompt; row B is anchored in the counterpart's
    /// session for this prompt, created if missing.
    pub counterpart_prompt_id: PromptId,
    /// Score and flags shared by both rows.
    pub compatibility: Compatibility,
    /// Expiration shared by both rows.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp shared by both rows.
    pub created_at: DateTime<Utc>,
}

/// The two rows of a freshly created match.
#[derive(Debug, Clone)]
pub struct MatchPair {
    /// Row anchored in the initiator's session, pointing at the counterpart.
    pub initiator: MatchResult,
    /// Mirror row anchored in the counterpart's session.
    pub counterpart: MatchResult,
}

/// Filter for candidate discovery.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    /// User whose prompts are never returned.
    pub excluding_user: UserId,
    /// Prompts asking exactly this question match.
    pub question: String,
    /// Prompts under this theme match.
    pub theme_id: ThemeId,
    /// Prompts must still be live at this instant.
    pub now: DateTime<Utc>,
    /// Maximum number of prompts returned.
    pub limit: usize,
}

/// What [`MatchStore::accept_pair`] did to a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairAcceptance {
    /// The flag is set and the pair still waits on the other party.
    Waiting,
    /// This call set the last flag and moved the pair to `CONFIRMED`.
    Confirmed,
    /// The pair was no longer pending. Nothing was written.
    NotPending,
}

/// Engine-owned storage: sessions, match results and history.
///
/// Implementations must make [`Self::create_match_pair`] all-or-nothing and
/// [`Self::accept_pair`] linearizable per pair.
#[async_trait]
pub trait MatchStore: Send + Sync + fmt::Debug {
    /// Returns the session for `(user_id, prompt_id)`, creating it if none
    /// exists. Never creates a duplicate.
    async fn find_or_create_session(
        &self,
        user_id: UserId,
        prompt_id: PromptId,
    ) -> Result<MatchingSession, MatchError>;

    /// Candidates already matched with `user_id`: rows in `session_id`
    /// pointing at a candidate, or rows anchored in a candidate's session
    /// pointing at `user_id`.
    async fn matched_counterparts(
        &self,
        user_id: UserId,
        session_id: SessionId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError>;

    /// Candidates with a history row involving `user_id`, in either
    /// direction.
    async fn history_counterparts(
        &self,
        user_id: UserId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError>;

    /// Atomically creates both rows of a match, locating or creating the
    /// counterpart's session on the way.
    ///
    /// Returns `Ok(None)` without writing anything if the two users already
    /// share a pending or confirmed match.
    async fn create_match_pair(&self, pair: &NewMatchPair)
    -> Result<Option<MatchPair>, MatchError>;

    /// Loads one match row.
    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchResult>, MatchError>;

    /// Both rows of a pair.
    async fn get_pair(&self, pair_id: PairId) -> Result<Vec<MatchResult>, MatchError>;

    /// All rows where `user_id` is either side, newest first.
    async fn matches_for_user(&self, user_id: UserId) -> Result<Vec<MatchResult>, MatchError>;

    /// Sets `user_id`'s accepted flag on both rows of a pending pair and,
    /// in the same write, moves the pair to `CONFIRMED` stamped with `at`
    /// once both flags are set.
    ///
    /// A pending pair never holds both flags. Exactly one caller sees
    /// [`PairAcceptance::Confirmed`] for a pair.
    async fn accept_pair(
        &self,
        pair_id: PairId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<PairAcceptance, MatchError>;

    /// Expires the pending rows of a pair and stamps their expiration with
    /// `at`. Returns the number of rows changed.
    async fn expire_pair(&self, pair_id: PairId, at: DateTime<Utc>) -> Result<u64, MatchError>;

    /// Expires every pending row whose expiration is before `now`.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, MatchError>;

    /// Confirmed rows created before `cutoff`.
    async fn confirmed_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, MatchError>;

    /// Expires one confirmed row, stamping its expiration with `at`.
    /// Returns `false` if the row was no longer confirmed.
    async fn expire_confirmed(&self, match_id: MatchId, at: DateTime<Utc>)
    -> Result<bool, MatchError>;

    /// Expires the pending pairs that have a row anchored in a session for
    /// `prompt_id`, stamping their expiration with `at`. Returns the number
    /// of rows changed.
    async fn expire_pending_for_prompt(
        &self,
        prompt_id: PromptId,
        at: DateTime<Utc>,
    ) -> Result<u64, MatchError>;

    /// Inserts or overwrites the history row for `(user_id, matched_user_id)`.
    async fn upsert_history(
        &self,
        user_id: UserId,
        matched_user_id: UserId,
        match_type: MatchType,
        at: DateTime<Utc>,
    ) -> Result<(), MatchError>;
}

/// Read access to user profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync + fmt::Debug {
    /// Loads a user's public profile.
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserProfile>, MatchError>;
}

/// Read access to deployed prompts.
#[async_trait]
pub trait PromptCatalog: Send + Sync + fmt::Debug {
    /// Loads one deployed prompt.
    async fn get_deployed_prompt(
        &self,
        prompt_id: PromptId,
    ) -> Result<Option<DeployedPrompt>, MatchError>;

    /// Live prompts of other users sharing the question or the theme,
    /// newest first, at most `query.limit`.
    async fn list_active_prompts(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<DeployedPrompt>, MatchError>;
}

/// Relationship edges between users.
#[async_trait]
pub trait RelationshipStore: Send + Sync + fmt::Debug {
    /// Finds an edge joining `a` and `b` in either direction.
    async fn find_relationship(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<Relationship>, MatchError>;

    /// Creates an edge stamped with `created_at`. If the pair is already
    /// joined in either direction the existing edge is returned instead.
    async fn create_relationship(
        &self,
        relating: UserId,
        related: UserId,
        level: RelationLevel,
        created_at: DateTime<Utc>,
    ) -> Result<Relationship, MatchError>;
}

/// Message counts between users.
#[async_trait]
pub trait ConversationStore: Send + Sync + fmt::Debug {
    /// Number of messages exchanged between `a` and `b`, both directions.
    async fn count_messages_between(&self, a: UserId, b: UserId) -> Result<u64, MatchError>;
}

/// The set of stores the engine runs against.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Sessions, matches and history.
    pub matches: Arc<dyn MatchStore>,
    /// User profiles.
    pub users: Arc<dyn UserDirectory>,
    /// Deployed prompts.
    pub prompts: Arc<dyn PromptCatalog>,
    /// Relationship edges.
    pub relationships: Arc<dyn RelationshipStore>,
    /// Messages.
    pub conversations: Arc<dyn ConversationStore>,
}

impl Stores {
    /// Uses one backend for every store.
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: MatchStore
            + UserDirectory
            + PromptCatalog
            + RelationshipStore
            + ConversationStore
            + 'static,
    {
        Self {
            matches: Arc::clone(&backend) as Arc<dyn MatchStore>,
            users: Arc::clone(&backend) as Arc<dyn UserDirectory>,
            prompts: Arc::clone(&backend) as Arc<dyn PromptCatalog>,
            relationships: Arc::clone(&backend) as Arc<dyn RelationshipStore>,
            conversations: backend as Arc<dyn ConversationStore>,
        }
    }
}
