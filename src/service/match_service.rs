//! Match service: the lifecycle engine's entry point and read views.
//!
//! The write paths live next to this file: discovery in
//! [`super::discovery`], acceptance and confirmation in
//! [`super::acceptance`], decline and prompt retirement in
//! [`super::decline`], and the sweep in [`super::cleanup`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::clock::{Clock, SystemClock};
use crate::config::MatchPolicy;
use crate::domain::{
    DeployedPrompt, MatchEvent, MatchId, MatchResult, MatchStatus, MatchSummary, MatchType,
    NotificationDispatcher, PairId, RelationshipId, UserId, UserProfile,
};
use crate::error::{EntityKind, MatchError};
use crate::persistence::Stores;

/// Orchestration layer for the match lifecycle.
///
/// Stateless coordinator: every piece of state lives behind [`Stores`],
/// and every lifecycle transition is persisted before the matching
/// [`MatchEvent`] is handed to the [`NotificationDispatcher`].
#[derive(Debug, Clone)]
pub struct MatchService {
    pub(super) stores: Stores,
    pub(super) notifier: NotificationDispatcher,
    pub(super) policy: MatchPolicy,
    pub(super) clock: Arc<dyn Clock>,
}

impl MatchService {
    /// Creates a service running on the wall clock.
    #[must_use]
    pub fn new(stores: Stores, notifier: NotificationDispatcher, policy: MatchPolicy) -> Self {
        Self {
            stores,
            notifier,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the engine constants.
    #[must_use]
    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Returns the dispatcher events are pushed through.
    #[must_use]
    pub fn notifier(&self) -> &NotificationDispatcher {
        &self.notifier
    }

    /// Returns the stores the service runs against.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A user's current matches: pending or confirmed, not yet expired,
    /// and without a conversation started. One entry per counterpart, the
    /// most recent match winning.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TransientStoreFailure`] if the store fails.
    pub async fn get_user_matches(&self, user_id: UserId) -> Result<Vec<MatchSummary>, MatchError> {
        let now = self.now();
        let rows = self.stores.matches.matches_for_user(user_id).await?;
        let current = latest_per_counterpart(user_id, rows, |m| m.is_open_at(now));

        let mut summaries = Vec::with_capacity(current.len());
        for (counterpart, row) in current {
            let messages = self
                .stores
                .conversations
                .count_messages_between(user_id, counterpart)
                .await?;
            if messages > 0 {
                continue;
            }
            if let Some(summary) = self.summarize(&row, user_id).await? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    /// A user's expired matches, one entry per counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TransientStoreFailure`] if the store fails.
    pub async fn get_user_expired_matches(
        &self,
        user_id: UserId,
    ) -> Result<Vec<MatchSummary>, MatchError> {
        let now = self.now();
        let rows = self.stores.matches.matches_for_user(user_id).await?;
        let expired = latest_per_counterpart(user_id, rows, |m| m.is_expired_at(now));

        let mut summaries = Vec::with_capacity(expired.len());
        for (_, row) in expired {
            if let Some(summary) = self.summarize(&row, user_id).await? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    /// Whether both parties of the match have accepted. An unknown match
    /// reports `false`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TransientStoreFailure`] if the store fails.
    pub async fn check_match_confirmation(&self, match_id: MatchId) -> Result<bool, MatchError> {
        Ok(self
            .stores
            .matches
            .get_match(match_id)
            .await?
            .is_some_and(|m| m.both_accepted()))
    }

    pub(super) async fn load_match(&self, match_id: MatchId) -> Result<MatchResult, MatchError> {
        self.stores
            .matches
            .get_match(match_id)
            .await?
            .ok_or_else(|| MatchError::not_found(EntityKind::Match, match_id))
    }

    /// Counterpart profile, or an anonymous one if the directory has no
    /// record or cannot be reached.
    pub(super) async fn profile_of(&self, user_id: UserId) -> UserProfile {
        match self.stores.users.get_user(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => UserProfile::anonymous(user_id),
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "profile lookup failed");
                UserProfile::anonymous(user_id)
            }
        }
    }

    /// Builds `viewer`'s summary of `row`, loading the anchoring prompt,
    /// the counterpart profile and, for confirmed rows, the relationship.
    ///
    /// Rows the viewer is not a party to, and rows whose prompt has
    /// vanished, yield `None`.
    pub(super) async fn summarize(
        &self,
        row: &MatchResult,
        viewer: UserId,
    ) -> Result<Option<MatchSummary>, MatchError> {
        let Some(counterpart) = row.counterpart_of(viewer) else {
            return Ok(None);
        };
        let Some(prompt) = self.stores.prompts.get_deployed_prompt(row.prompt_id).await? else {
            tracing::error!(match_id = %row.id, prompt_id = %row.prompt_id, "match row references a missing prompt");
            return Ok(None);
        };
        let relationship_id = if row.status == MatchStatus::Confirmed {
            self.stores
                .relationships
                .find_relationship(viewer, counterpart)
                .await?
                .map(|r| r.id)
        } else {
            None
        };
        let profile = self.profile_of(counterpart).await;
        Ok(summary_of(row, viewer, &prompt, profile, relationship_id))
    }

    /// Writes a history row, logging instead of failing.
    pub(super) async fn record_history(
        &self,
        user_id: UserId,
        matched_user_id: UserId,
        match_type: MatchType,
        at: DateTime<Utc>,
    ) {
        if let Err(e) = self
            .stores
            .matches
            .upsert_history(user_id, matched_user_id, match_type, at)
            .await
        {
            tracing::warn!(
                %user_id,
                %matched_user_id,
                match_type = match_type.as_str(),
                error = %e,
                "failed to record match history"
            );
        }
    }

    /// Sends one event per party of the pair, each carrying the ID of the
    /// recipient's own row. `build` receives the recipient and that ID.
    pub(super) async fn notify_pair<F>(&self, row: &MatchResult, build: F)
    where
        F: Fn(UserId, MatchId) -> MatchEvent,
    {
        let own_rows = self.own_rows(row.pair_id, row).await;
        for recipient in [row.owner_id, row.matched_user_id] {
            let match_id = own_rows.get(&recipient).copied().unwrap_or(row.id);
            self.notifier.notify(recipient, build(recipient, match_id));
        }
    }

    /// Sends an event to a single party, using their own row ID.
    pub(super) async fn notify_party<F>(&self, row: &MatchResult, recipient: UserId, build: F)
    where
        F: Fn(UserId, MatchId) -> MatchEvent,
    {
        let own_rows = self.own_rows(row.pair_id, row).await;
        let match_id = own_rows.get(&recipient).copied().unwrap_or(row.id);
        self.notifier.notify(recipient, build(recipient, match_id));
    }

    async fn own_rows(&self, pair_id: PairId, known: &MatchResult) -> HashMap<UserId, MatchId> {
        let rows = match self.stores.matches.get_pair(pair_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(%pair_id, error = %e, "pair lookup failed, using known row");
                vec![known.clone()]
            }
        };
        rows.into_iter().map(|m| (m.owner_id, m.id)).collect()
    }
}

/// Keeps, per counterpart, the newest row passing `keep`. On a tie the
/// row anchored in `user_id`'s own session wins. Self-match rows are
/// dropped and logged. Output is newest first.
fn latest_per_counterpart<F>(
    user_id: UserId,
    rows: Vec<MatchResult>,
    keep: F,
) -> Vec<(UserId, MatchResult)>
where
    F: Fn(&MatchResult) -> bool,
{
    let mut latest: HashMap<UserId, MatchResult> = HashMap::new();
    for row in rows {
        if row.is_self_match() {
            tracing::error!(match_id = %row.id, %user_id, "self-match row filtered out");
            continue;
        }
        if !keep(&row) {
            continue;
        }
        let Some(counterpart) = row.counterpart_of(user_id) else {
            continue;
        };
        match latest.entry(counterpart) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                let newer = row.created_at > current.created_at;
                let own_on_tie =
                    row.created_at == current.created_at && row.owner_id == user_id;
                if newer || own_on_tie {
                    slot.insert(row);
                }
            }
        }
    }

    let mut out: Vec<(UserId, MatchResult)> = latest.into_iter().collect();
    out.sort_by(|(_, a), (_, b)| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    out
}

/// Assembles `viewer`'s summary from already-loaded parts.
pub(super) fn summary_of(
    row: &MatchResult,
    viewer: UserId,
    prompt: &DeployedPrompt,
    profile: UserProfile,
    relationship_id: Option<RelationshipId>,
) -> Option<MatchSummary> {
    let side = row.side_of(viewer)?;
    Some(MatchSummary {
        id: row.id,
        question: prompt.question.clone(),
        category: prompt.theme_name.clone(),
        user: profile.display_name().to_string(),
        user_profile: profile,
        status: row.status,
        user_accepted: row.accepted_by(side),
        other_user_accepted: row.accepted_by(side.opposite()),
        relationship_id,
        compatibility_score: row.compatibility_score,
        deployed_at: prompt.deployed_at,
        expires_at: row.expires_at,
    })
}
