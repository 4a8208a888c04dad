//! In-process implementation of every store trait.
//!
//! [`MemoryStore`] keeps all state behind a single [`tokio::sync::RwLock`].
//! Every mutating operation runs inside one write-lock critical section,
//! which gives the same atomicity the Postgres backend gets from
//! transactions and row locks.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    CandidateQuery, ConversationStore, MatchPair, MatchStore, NewMatchPair, PairAcceptance,
    PromptCatalog, RelationshipStore, UserDirectory,
};
use crate::domain::{
    DeployedPrompt, MatchId, MatchResult, MatchStatus, MatchType, MatchingSession, PairId,
    PromptId, PromptStatus, RelationLevel, Relationship, RelationshipId, SessionId, UserId,
    UserMatchHistory, UserProfile,
};
use crate::error::{EntityKind, MatchError};

#[derive(Debug, Clone, Copy)]
struct StoredMessage {
    sender: UserId,
    receiver: UserId,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, UserProfile>,
    prompts: HashMap<PromptId, DeployedPrompt>,
    sessions: HashMap<SessionId, MatchingSession>,
    matches: HashMap<MatchId, MatchResult>,
    history: HashMap<(UserId, UserId), UserMatchHistory>,
    relationships: Vec<Relationship>,
    messages: Vec<StoredMessage>,
}

impl MemoryState {
    fn session_for(&mut self, user_id: UserId, prompt_id: PromptId) -> MatchingSession {
        if let Some(existing) = self
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.prompt_id == prompt_id)
        {
            return existing.clone();
        }
        let session = MatchingSession::new(user_id, prompt_id);
        self.sessions.insert(session.id, session.clone());
        session
    }

    fn open_pair_exists(&self, a: UserId, b: UserId) -> bool {
        self.matches.values().any(|m| {
            matches!(m.status, MatchStatus::Pending | MatchStatus::Confirmed)
                && ((m.owner_id == a && m.matched_user_id == b)
                    || (m.owner_id == b && m.matched_user_id == a))
        })
    }

    fn pair_rows_mut(&mut self, pair_id: PairId) -> impl Iterator<Item = &mut MatchResult> {
        self.matches.values_mut().filter(move |m| m.pair_id == pair_id)
    }
}

/// In-memory backend for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user profile.
    pub async fn insert_user(&self, profile: UserProfile) {
        self.state.write().await.users.insert(profile.id, profile);
    }

    /// Adds or replaces a deployed prompt.
    pub async fn insert_prompt(&self, prompt: DeployedPrompt) {
        self.state.write().await.prompts.insert(prompt.id, prompt);
    }

    /// Changes a prompt's status.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NotFound`] if the prompt does not exist.
    pub async fn set_prompt_status(
        &self,
        prompt_id: PromptId,
        status: PromptStatus,
    ) -> Result<(), MatchError> {
        let mut state = self.state.write().await;
        let prompt = state
            .prompts
            .get_mut(&prompt_id)
            .ok_or_else(|| MatchError::not_found(EntityKind::Prompt, prompt_id))?;
        prompt.status = status;
        Ok(())
    }

    /// Records a message from `sender` to `receiver`.
    pub async fn record_message(&self, sender: UserId, receiver: UserId) {
        self.state
            .write()
            .await
            .messages
            .push(StoredMessage { sender, receiver });
    }

    /// Returns the history row for `(user_id, matched_user_id)`.
    pub async fn history(
        &self,
        user_id: UserId,
        matched_user_id: UserId,
    ) -> Option<UserMatchHistory> {
        self.state
            .read()
            .await
            .history
            .get(&(user_id, matched_user_id))
            .cloned()
    }

    /// Returns every relationship edge.
    pub async fn relationships(&self) -> Vec<Relationship> {
        self.state.read().await.relationships.clone()
    }

    /// Returns every match row, oldest first.
    pub async fn all_matches(&self) -> Vec<MatchResult> {
        let state = self.state.read().await;
        let mut rows: Vec<MatchResult> = state.matches.values().cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rows
    }

    /// Returns every session.
    pub async fn sessions(&self) -> Vec<MatchingSession> {
        self.state.read().await.sessions.values().cloned().collect()
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn find_or_create_session(
        &self,
        user_id: UserId,
        prompt_id: PromptId,
    ) -> Result<MatchingSession, MatchError> {
        Ok(self.state.write().await.session_for(user_id, prompt_id))
    }

    async fn matched_counterparts(
        &self,
        user_id: UserId,
        session_id: SessionId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError> {
        let state = self.state.read().await;
        let wanted: HashSet<UserId> = candidates.iter().copied().collect();
        let mut found = HashSet::new();
        for m in state.matches.values() {
            if m.session_id == session_id && wanted.contains(&m.matched_user_id) {
                found.insert(m.matched_user_id);
            }
            if m.matched_user_id == user_id && wanted.contains(&m.owner_id) {
                found.insert(m.owner_id);
            }
        }
        Ok(found)
    }

    async fn history_counterparts(
        &self,
        user_id: UserId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError> {
        let state = self.state.read().await;
        Ok(candidates
            .iter()
            .copied()
            .filter(|c| {
                state.history.contains_key(&(user_id, *c))
                    || state.history.contains_key(&(*c, user_id))
            })
            .collect())
    }

    async fn create_match_pair(
        &self,
        pair: &NewMatchPair,
    ) -> Result<Option<MatchPair>, MatchError> {
        let mut state = self.state.write().await;

        let initiator_session = state
            .sessions
            .get(&pair.initiator_session_id)
            .cloned()
            .ok_or_else(|| MatchError::not_found(EntityKind::Session, pair.initiator_session_id))?;
        if initiator_session.user_id != pair.initiator_id {
            return Err(MatchError::InvalidState(format!(
                "session {} does not belong to user {}",
                initiator_session.id, pair.initiator_id
            )));
        }
        if state.open_pair_exists(pair.initiator_id, pair.counterpart_id) {
            return Ok(None);
        }

        let counterpart_session = state.session_for(pair.counterpart_id, pair.counterpart_prompt_id);
        let pair_id = PairId::new();
        let row = |session: &MatchingSession, matched_user_id: UserId| MatchResult {
            id: MatchId::new(),
            pair_id,
            session_id: session.id,
            owner_id: session.user_id,
            prompt_id: session.prompt_id,
            matched_user_id,
            compatibility_score: pair.compatibility.score,
            flags: pair.compatibility.flags,
            status: MatchStatus::Pending,
            side_a_accepted: false,
            side_b_accepted: false,
            expires_at: pair.expires_at,
            confirmed_at: None,
            created_at: pair.created_at,
        };

        let initiator = row(&initiator_session, pair.counterpart_id);
        let counterpart = row(&counterpart_session, pair.initiator_id);
        state.matches.insert(initiator.id, initiator.clone());
        state.matches.insert(counterpart.id, counterpart.clone());

        Ok(Some(MatchPair {
            initiator,
            counterpart,
        }))
    }

    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchResult>, MatchError> {
        Ok(self.state.read().await.matches.get(&match_id).cloned())
    }

    async fn get_pair(&self, pair_id: PairId) -> Result<Vec<MatchResult>, MatchError> {
        let state = self.state.read().await;
        let mut rows: Vec<MatchResult> = state
            .matches
            .values()
            .filter(|m| m.pair_id == pair_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.id);
        Ok(rows)
    }

    async fn matches_for_user(&self, user_id: UserId) -> Result<Vec<MatchResult>, MatchError> {
        let state = self.state.read().await;
        let mut rows: Vec<MatchResult> = state
            .matches
            .values()
            .filter(|m| m.owner_id == user_id || m.matched_user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn accept_pair(
        &self,
        pair_id: PairId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<PairAcceptance, MatchError> {
        let mut state = self.state.write().await;
        let mut outcome = PairAcceptance::NotPending;
        for m in state
            .pair_rows_mut(pair_id)
            .filter(|m| m.status == MatchStatus::Pending)
        {
            if m.owner_id == user_id {
                m.side_a_accepted = true;
            }
            if m.matched_user_id == user_id {
                m.side_b_accepted = true;
            }
            if m.both_accepted() {
                m.status = MatchStatus::Confirmed;
                m.confirmed_at = Some(at);
                outcome = PairAcceptance::Confirmed;
            } else if outcome == PairAcceptance::NotPending {
                outcome = PairAcceptance::Waiting;
            }
        }
        Ok(outcome)
    }

    async fn expire_pair(&self, pair_id: PairId, at: DateTime<Utc>) -> Result<u64, MatchError> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for m in state.pair_rows_mut(pair_id) {
            if m.status == MatchStatus::Pending {
                m.status = MatchStatus::Expired;
                m.expires_at = at;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, MatchError> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for m in state.matches.values_mut() {
            if m.status == MatchStatus::Pending && m.expires_at < now {
                m.status = MatchStatus::Expired;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn confirmed_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let state = self.state.read().await;
        Ok(state
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Confirmed && m.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn expire_confirmed(
        &self,
        match_id: MatchId,
        at: DateTime<Utc>,
    ) -> Result<bool, MatchError> {
        let mut state = self.state.write().await;
        match state.matches.get_mut(&match_id) {
            Some(m) if m.status == MatchStatus::Confirmed => {
                m.status = MatchStatus::Expired;
                m.expires_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_pending_for_prompt(
        &self,
        prompt_id: PromptId,
        at: DateTime<Utc>,
    ) -> Result<u64, MatchError> {
        let mut state = self.state.write().await;
        let pairs: HashSet<PairId> = state
            .matches
            .values()
            .filter(|m| m.prompt_id == prompt_id)
            .map(|m| m.pair_id)
            .collect();
        let mut changed = 0;
        for m in state.matches.values_mut() {
            if pairs.contains(&m.pair_id) && m.status == MatchStatus::Pending {
                m.status = MatchStatus::Expired;
                m.expires_at = at;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn upsert_history(
        &self,
        user_id: UserId,
        matched_user_id: UserId,
        match_type: MatchType,
        at: DateTime<Utc>,
    ) -> Result<(), MatchError> {
        self.state.write().await.history.insert(
            (user_id, matched_user_id),
            UserMatchHistory {
                user_id,
                matched_user_id,
                match_type,
                recorded_at: at,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserProfile>, MatchError> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl PromptCatalog for MemoryStore {
    async fn get_deployed_prompt(
        &self,
        prompt_id: PromptId,
    ) -> Result<Option<DeployedPrompt>, MatchError> {
        Ok(self.state.read().await.prompts.get(&prompt_id).cloned())
    }

    async fn list_active_prompts(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<DeployedPrompt>, MatchError> {
        let state = self.state.read().await;
        let mut prompts: Vec<DeployedPrompt> = state
            .prompts
            .values()
            .filter(|p| {
                p.owner_id != query.excluding_user
                    && p.is_live_at(query.now)
                    && (p.question == query.question || p.theme_id == query.theme_id)
            })
            .cloned()
            .collect();
        prompts.sort_by(|a, b| b.deployed_at.cmp(&a.deployed_at).then(a.id.cmp(&b.id)));
        prompts.truncate(query.limit);
        Ok(prompts)
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn find_relationship(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<Relationship>, MatchError> {
        let state = self.state.read().await;
        Ok(state.relationships.iter().find(|r| r.connects(a, b)).cloned())
    }

    async fn create_relationship(
        &self,
        relating: UserId,
        related: UserId,
        level: RelationLevel,
        created_at: DateTime<Utc>,
    ) -> Result<Relationship, MatchError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .relationships
            .iter()
            .find(|r| r.connects(relating, related))
        {
            return Ok(existing.clone());
        }
        let relationship = Relationship {
            id: RelationshipId::new(),
            relating_user_id: relating,
            related_user_id: related,
            level,
            created_at,
        };
        state.relationships.push(relationship.clone());
        Ok(relationship)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn count_messages_between(&self, a: UserId, b: UserId) -> Result<u64, MatchError> {
        let state = self.state.read().await;
        let count = state
            .messages
            .iter()
            .filter(|m| {
                (m.sender == a && m.receiver == b) || (m.sender == b && m.receiver == a)
            })
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}
