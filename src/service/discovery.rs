//! Candidate discovery, exclusion, and bidirectional match creation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::MatchService;
use super::match_service::summary_of;
use crate::domain::compatibility;
use crate::domain::{
    DeployedPrompt, MatchEvent, MatchSummary, MatchingSession, PromptId, UserId,
};
use crate::error::{EntityKind, MatchError};
use crate::persistence::{CandidateQuery, MatchPair, NewMatchPair};

impl MatchService {
    /// Runs cleanup, then discovers candidates for `prompt_id` and creates
    /// a linked pair of match rows for each one that survives exclusion.
    ///
    /// Each candidate is handled independently: a failure is logged and
    /// the batch moves on. Returns summaries of the rows created on the
    /// caller's side.
    ///
    /// # Errors
    ///
    /// - [`MatchError::NotFound`] if the prompt does not exist.
    /// - [`MatchError::InvalidState`] if the prompt belongs to another user.
    /// - [`MatchError::TransientStoreFailure`] if discovery itself fails.
    pub async fn find_matches(
        &self,
        user_id: UserId,
        prompt_id: PromptId,
    ) -> Result<Vec<MatchSummary>, MatchError> {
        let prompt = self
            .stores
            .prompts
            .get_deployed_prompt(prompt_id)
            .await?
            .ok_or_else(|| MatchError::not_found(EntityKind::Prompt, prompt_id))?;
        if prompt.owner_id != user_id {
            return Err(MatchError::InvalidState(format!(
                "prompt {prompt_id} does not belong to user {user_id}"
            )));
        }

        if let Err(e) = self.run_cleanup().await {
            tracing::warn!(error = %e, "cleanup before discovery failed");
        }

        let now = self.now();
        if !prompt.is_live_at(now) {
            tracing::debug!(%user_id, %prompt_id, "prompt no longer active, skipping discovery");
            return Ok(Vec::new());
        }

        let session = self
            .stores
            .matches
            .find_or_create_session(user_id, prompt_id)
            .await?;
        let candidates = self.discover_candidates(&prompt, now).await?;
        let candidates = self.exclude_known(user_id, &session, candidates).await?;

        let mut created = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            match self.create_pair(&prompt, &session, candidate, now).await {
                Ok(Some(pair)) => {
                    tracing::info!(
                        %user_id,
                        matched_user_id = %candidate.owner_id,
                        pair_id = %pair.initiator.pair_id,
                        score = pair.initiator.compatibility_score,
                        "match created"
                    );
                    if let Some(summary) = self.announce(&pair, &prompt, candidate).await {
                        created.push(summary);
                    }
                }
                Ok(None) => {
                    tracing::debug!(
                        %user_id,
                        matched_user_id = %candidate.owner_id,
                        "pair already open, candidate skipped"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        %user_id,
                        matched_user_id = %candidate.owner_id,
                        error = %e,
                        "failed to create match, candidate skipped"
                    );
                }
            }
        }

        tracing::info!(%user_id, %prompt_id, created = created.len(), "discovery finished");
        Ok(created)
    }

    /// Live prompts of other users sharing the question or the theme,
    /// capped at the policy's candidate limit, at most one per user.
    async fn discover_candidates(
        &self,
        prompt: &DeployedPrompt,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeployedPrompt>, MatchError> {
        let query = CandidateQuery {
            excluding_user: prompt.owner_id,
            question: prompt.question.clone(),
            theme_id: prompt.theme_id,
            now,
            limit: self.policy.candidate_limit,
        };
        let found = self.stores.prompts.list_active_prompts(&query).await?;

        let mut seen = HashSet::new();
        Ok(found
            .into_iter()
            .filter(|p| p.owner_id != prompt.owner_id && seen.insert(p.owner_id))
            .collect())
    }

    /// Removes candidates already matched with `user_id` in either
    /// direction, or with any history row between them.
    async fn exclude_known(
        &self,
        user_id: UserId,
        session: &MatchingSession,
        candidates: Vec<DeployedPrompt>,
    ) -> Result<Vec<DeployedPrompt>, MatchError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let ids: Vec<UserId> = candidates.iter().map(|c| c.owner_id).collect();
        let matched = self
            .stores
            .matches
            .matched_counterparts(user_id, session.id, &ids)
            .await?;
        let decided = self
            .stores
            .matches
            .history_counterparts(user_id, &ids)
            .await?;

        let before = candidates.len();
        let kept: Vec<DeployedPrompt> = candidates
            .into_iter()
            .filter(|c| !matched.contains(&c.owner_id) && !decided.contains(&c.owner_id))
            .collect();
        tracing::debug!(
            %user_id,
            candidates = before,
            already_matched = matched.len(),
            decided = decided.len(),
            kept = kept.len(),
            "exclusion applied"
        );
        Ok(kept)
    }

    async fn create_pair(
        &self,
        own: &DeployedPrompt,
        session: &MatchingSession,
        candidate: &DeployedPrompt,
        now: DateTime<Utc>,
    ) -> Result<Option<MatchPair>, MatchError> {
        if candidate.owner_id == own.owner_id {
            return Err(MatchError::InvalidState(format!(
                "refusing to match user {} with themselves",
                own.owner_id
            )));
        }
        let pair = NewMatchPair {
            initiator_session_id: session.id,
            initiator_id: own.owner_id,
            counterpart_id: candidate.owner_id,
            counterpart_prompt_id: candidate.id,
            compatibility: compatibility::score(own, candidate),
            expires_at: now + self.policy.match_ttl,
            created_at: now,
        };
        self.stores.matches.create_match_pair(&pair).await
    }

    /// Notifies both users of a new pair, each with their own row. Returns
    /// the initiator's summary.
    async fn announce(
        &self,
        pair: &MatchPair,
        own: &DeployedPrompt,
        candidate: &DeployedPrompt,
    ) -> Option<MatchSummary> {
        let initiator = own.owner_id;
        let counterpart = candidate.owner_id;
        let timestamp = self.now();

        let for_initiator = summary_of(
            &pair.initiator,
            initiator,
            own,
            self.profile_of(counterpart).await,
            None,
        );
        let for_counterpart = summary_of(
            &pair.counterpart,
            counterpart,
            candidate,
            self.profile_of(initiator).await,
            None,
        );

        if let Some(summary) = for_counterpart {
            self.notifier.notify(
                counterpart,
                MatchEvent::NewMatchAvailable {
                    user_id: counterpart,
                    match_id: pair.counterpart.id,
                    match_data: Box::new(summary),
                    timestamp,
                },
            );
        }
        if let Some(summary) = &for_initiator {
            self.notifier.notify(
                initiator,
                MatchEvent::NewMatchAvailable {
                    user_id: initiator,
                    match_id: pair.initiator.id,
                    match_data: Box::new(summary.clone()),
                    timestamp,
                },
            );
        }
        for_initiator
    }
}
