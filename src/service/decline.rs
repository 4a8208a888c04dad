//! Decline handling and prompt retirement.

use super::MatchService;
use crate::domain::{MatchEvent, MatchId, MatchStatus, MatchType, PromptId, UserId};
use crate::error::MatchError;

impl MatchService {
    /// Declines a pending match on behalf of `user_id`.
    ///
    /// Both rows of the pair become `EXPIRED` with their expiration set to
    /// now, a `DECLINED` history row is written for the decliner against
    /// the other party, and both parties are notified. Declining a match
    /// that is already retired is a no-op.
    ///
    /// # Errors
    ///
    /// - [`MatchError::NotFound`] if the match does not exist.
    /// - [`MatchError::NotAuthorized`] if `user_id` is not a party.
    /// - [`MatchError::InvalidState`] if the match is already confirmed.
    /// - [`MatchError::TransientStoreFailure`] if the store fails.
    pub async fn decline_match(&self, user_id: UserId, match_id: MatchId) -> Result<(), MatchError> {
        let row = self.load_match(match_id).await?;
        let Some(counterpart) = row.counterpart_of(user_id) else {
            return Err(MatchError::NotAuthorized {
                user_id: user_id.into(),
                match_id: match_id.into(),
            });
        };

        match row.status {
            MatchStatus::Pending => {}
            MatchStatus::Confirmed => return Err(confirmed(match_id)),
            MatchStatus::Expired | MatchStatus::Declined => {
                tracing::debug!(%user_id, %match_id, "match already retired, decline ignored");
                return Ok(());
            }
        }

        let now = self.now();
        let changed = self.stores.matches.expire_pair(row.pair_id, now).await?;
        if changed == 0 {
            let current = self.load_match(match_id).await?;
            if current.status == MatchStatus::Confirmed {
                return Err(confirmed(match_id));
            }
            tracing::debug!(%user_id, %match_id, "match retired concurrently, decline ignored");
            return Ok(());
        }

        tracing::info!(%user_id, %match_id, pair_id = %row.pair_id, "match declined");
        self.record_history(user_id, counterpart, MatchType::Declined, now)
            .await;
        self.notify_pair(&row, |recipient, match_id| MatchEvent::MatchStatusChanged {
            user_id: recipient,
            match_id,
            status: MatchStatus::Expired,
            timestamp: now,
        })
        .await;
        Ok(())
    }

    /// Expires the pending matches discovered for, or against, a prompt
    /// that was cancelled, superseded or expired. Returns the number of
    /// rows retired.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TransientStoreFailure`] if the store fails.
    pub async fn expire_matches_for_prompt(&self, prompt_id: PromptId) -> Result<u64, MatchError> {
        let expired = self
            .stores
            .matches
            .expire_pending_for_prompt(prompt_id, self.now())
            .await?;
        tracing::info!(%prompt_id, expired, "pending matches expired for retired prompt");
        Ok(expired)
    }
}

fn confirmed(match_id: MatchId) -> MatchError {
    MatchError::InvalidState(format!(
        "match {match_id} is confirmed and can no longer be declined"
    ))
}
