//! Shared fixtures for the service tests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::MatchService;
use super::clock::{Clock, ManualClock};
use crate::config::MatchPolicy;
use crate::domain::{
    ConnectionRegistry, DeployedPrompt, MatchId, MatchResult, MatchSummary, MatchType,
    MatchingSession, NotificationDispatcher, PairId, PromptId, PromptStatus, SessionId, ThemeId,
    UserId, UserProfile,
};
use crate::error::MatchError;
use crate::persistence::memory::MemoryStore;
use crate::persistence::{MatchPair, MatchStore, NewMatchPair, PairAcceptance, Stores};

/// In-memory engine with a manual clock and a live registry.
#[derive(Debug)]
pub(crate) struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<ConnectionRegistry>,
    pub service: MatchService,
    pub theme: ThemeId,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = Arc::new(ConnectionRegistry::new(16));
        let service = MatchService::new(
            Stores::from_backend(Arc::clone(&store)),
            NotificationDispatcher::new(Arc::clone(&registry)),
            MatchPolicy::default(),
        )
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        Self {
            store,
            clock,
            registry,
            service,
            theme: ThemeId::new(),
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Same engine wired to different stores.
    pub fn service_with(&self, stores: Stores) -> MatchService {
        MatchService::new(
            stores,
            NotificationDispatcher::new(Arc::clone(&self.registry)),
            MatchPolicy::default(),
        )
        .with_clock(Arc::clone(&self.clock) as Arc<dyn Clock>)
    }

    pub async fn user(&self, name: &str) -> UserId {
        let id = UserId::new();
        self.store
            .insert_user(UserProfile {
                id,
                name: Some(name.to_string()),
                username: None,
                profile_picture_url: None,
                personality_summary: None,
            })
            .await;
        id
    }

    pub async fn deploy(&self, owner: UserId, question: &str) -> DeployedPrompt {
        self.deploy_with_theme(owner, self.theme, question).await
    }

    pub async fn deploy_with_theme(
        &self,
        owner: UserId,
        theme: ThemeId,
        question: &str,
    ) -> DeployedPrompt {
        let now = self.clock_now();
        let prompt = DeployedPrompt {
            id: PromptId::new(),
            owner_id: owner,
            theme_id: theme,
            theme_name: "Travel".to_string(),
            question: question.to_string(),
            status: PromptStatus::Active,
            deployed_at: now,
            expires_at: now + Duration::days(3),
        };
        self.store.insert_prompt(prompt.clone()).await;
        prompt
    }

    pub async fn retire(&self, prompt_id: PromptId) {
        let _ = self
            .store
            .set_prompt_status(prompt_id, PromptStatus::Cancelled)
            .await;
    }

    /// Cancels every prompt anchoring one of `user`'s sessions.
    pub async fn retire_prompts_of(&self, user: UserId) {
        for session in self.store.sessions().await {
            if session.user_id == user {
                self.retire(session.prompt_id).await;
            }
        }
    }

    /// Two fresh users with identical prompts, matched by discovery run
    /// for the first. Returns both users and the first user's summary.
    pub async fn matched_pair(&self, question: &str) -> (UserId, UserId, MatchSummary) {
        let a = self.user("user-a").await;
        let b = self.user("user-b").await;
        let prompt_a = self.deploy(a, question).await;
        self.deploy(b, question).await;
        let Ok(created) = self.service.find_matches(a, prompt_a.id).await else {
            panic!("discovery failed");
        };
        let Some(summary) = created.into_iter().next() else {
            panic!("expected a match");
        };
        (a, b, summary)
    }

    /// The row anchored in `user`'s session.
    pub async fn row_owned_by(&self, user: UserId) -> Option<MatchResult> {
        self.store
            .all_matches()
            .await
            .into_iter()
            .find(|m| m.owner_id == user)
    }
}

/// Delegates to a [`MemoryStore`] but fails pair creation with one user,
/// and acceptances too once [`Self::failing_accepts`] is set.
#[derive(Debug)]
pub(crate) struct FailingPairStore {
    inner: Arc<MemoryStore>,
    poisoned: UserId,
    fail_accepts: bool,
}

impl FailingPairStore {
    pub fn new(inner: Arc<MemoryStore>, poisoned: UserId) -> Self {
        Self {
            inner,
            poisoned,
            fail_accepts: false,
        }
    }

    pub fn failing_accepts(mut self) -> Self {
        self.fail_accepts = true;
        self
    }
}

#[async_trait]
impl MatchStore for FailingPairStore {
    async fn find_or_create_session(
        &self,
        user_id: UserId,
        prompt_id: PromptId,
    ) -> Result<MatchingSession, MatchError> {
        self.inner.find_or_create_session(user_id, prompt_id).await
    }

    async fn matched_counterparts(
        &self,
        user_id: UserId,
        session_id: SessionId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError> {
        self.inner
            .matched_counterparts(user_id, session_id, candidates)
            .await
    }

    async fn history_counterparts(
        &self,
        user_id: UserId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError> {
        self.inner.history_counterparts(user_id, candidates).await
    }

    async fn create_match_pair(
        &self,
        pair: &NewMatchPair,
    ) -> Result<Option<MatchPair>, MatchError> {
        if pair.counterpart_id == self.poisoned {
            return Err(MatchError::TransientStoreFailure(
                "connection reset".to_string(),
            ));
        }
        self.inner.create_match_pair(pair).await
    }

    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchResult>, MatchError> {
        self.inner.get_match(match_id).await
    }

    async fn get_pair(&self, pair_id: PairId) -> Result<Vec<MatchResult>, MatchError> {
        self.inner.get_pair(pair_id).await
    }

    async fn matches_for_user(&self, user_id: UserId) -> Result<Vec<MatchResult>, MatchError> {
        self.inner.matches_for_user(user_id).await
    }

    async fn accept_pair(
        &self,
        pair_id: PairId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<PairAcceptance, MatchError> {
        if self.fail_accepts {
            return Err(MatchError::TransientStoreFailure(
                "connection reset".to_string(),
            ));
        }
        self.inner.accept_pair(pair_id, user_id, at).await
    }

    async fn expire_pair(&self, pair_id: PairId, at: DateTime<Utc>) -> Result<u64, MatchError> {
        self.inner.expire_pair(pair_id, at).await
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, MatchError> {
        self.inner.expire_overdue(now).await
    }

    async fn confirmed_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        self.inner.confirmed_created_before(cutoff).await
    }

    async fn expire_confirmed(
        &self,
        match_id: MatchId,
        at: DateTime<Utc>,
    ) -> Result<bool, MatchError> {
        self.inner.expire_confirmed(match_id, at).await
    }

    async fn expire_pending_for_prompt(
        &self,
        prompt_id: PromptId,
        at: DateTime<Utc>,
    ) -> Result<u64, MatchError> {
        self.inner.expire_pending_for_prompt(prompt_id, at).await
    }

    async fn upsert_history(
        &self,
        user_id: UserId,
        matched_user_id: UserId,
        match_type: MatchType,
        at: DateTime<Utc>,
    ) -> Result<(), MatchError> {
        self.inner
            .upsert_history(user_id, matched_user_id, match_type, at)
            .await
    }
}
