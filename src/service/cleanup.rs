//! Cleanup sweep: date-based expiry and abandoned confirmations.

use serde::Serialize;

use super::MatchService;
use crate::error::MatchError;

/// Rows retired by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Pending rows past their expiration.
    pub expired_by_date: u64,
    /// Confirmed rows older than the grace window with no messages
    /// between the parties.
    pub abandoned_confirmations: u64,
}

impl CleanupReport {
    /// Total rows retired.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.expired_by_date + self.abandoned_confirmations
    }
}

impl MatchService {
    /// Runs both cleanup passes. Idempotent; no notifications are sent.
    ///
    /// A message count that cannot be read skips that row until the next
    /// sweep.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TransientStoreFailure`] if either pass cannot
    /// read or write the match store.
    pub async fn run_cleanup(&self) -> Result<CleanupReport, MatchError> {
        let now = self.now();
        let expired_by_date = self.stores.matches.expire_overdue(now).await?;

        let cutoff = now - self.policy.confirmation_grace;
        let stale = self
            .stores
            .matches
            .confirmed_created_before(cutoff)
            .await?;

        let mut abandoned_confirmations = 0;
        for row in stale {
            let messages = match self
                .stores
                .conversations
                .count_messages_between(row.owner_id, row.matched_user_id)
                .await
            {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(match_id = %row.id, error = %e, "message count failed, row skipped");
                    continue;
                }
            };
            if messages > 0 {
                continue;
            }
            if self.stores.matches.expire_confirmed(row.id, now).await? {
                abandoned_confirmations += 1;
            }
        }

        let report = CleanupReport {
            expired_by_date,
            abandoned_confirmations,
        };
        if report.total() > 0 {
            tracing::info!(expired_by_date, abandoned_confirmations, "cleanup sweep retired matches");
        } else {
            tracing::debug!("cleanup sweep found nothing to retire");
        }
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::MatchStatus;
    use crate::service::testing::Fixture;

    #[tokio::test]
    async fn overdue_pending_match_expires() {
        let fx = Fixture::new().await;
        fx.matched_pair("Q1").await;

        fx.clock.advance(Duration::days(4));
        let Ok(report) = fx.service.run_cleanup().await else {
            panic!("cleanup failed");
        };
        assert_eq!(report.expired_by_date, 2);
        assert_eq!(report.abandoned_confirmations, 0);
        assert!(fx
            .store
            .all_matches()
            .await
            .iter()
            .all(|m| m.status == MatchStatus::Expired));
        assert!(fx.store.relationships().await.is_empty());

        let Ok(again) = fx.service.run_cleanup().await else {
            panic!("cleanup failed");
        };
        assert_eq!(again, CleanupReport::default());
    }

    #[tokio::test]
    async fn silent_confirmation_expires_after_grace() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let _ = fx.service.accept_match(a, summary.id).await;
        let _ = fx.service.accept_match(b, summary.id).await;

        fx.clock.advance(Duration::days(10));
        let Ok(report) = fx.service.run_cleanup().await else {
            panic!("cleanup failed");
        };
        assert_eq!(report.abandoned_confirmations, 2);
        for row in fx.store.all_matches().await {
            assert_eq!(row.status, MatchStatus::Expired);
            assert_eq!(row.expires_at, fx.clock_now());
        }
    }

    #[tokio::test]
    async fn confirmation_with_conversation_survives() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let _ = fx.service.accept_match(a, summary.id).await;
        let _ = fx.service.accept_match(b, summary.id).await;
        fx.store.record_message(a, b).await;

        fx.clock.advance(Duration::days(10));
        let Ok(report) = fx.service.run_cleanup().await else {
            panic!("cleanup failed");
        };
        assert_eq!(report, CleanupReport::default());
        assert!(fx
            .store
            .all_matches()
            .await
            .iter()
            .all(|m| m.status == MatchStatus::Confirmed));
    }

    #[tokio::test]
    async fn confirmation_inside_grace_survives() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let _ = fx.service.accept_match(a, summary.id).await;
        let _ = fx.service.accept_match(b, summary.id).await;

        fx.clock.advance(Duration::days(6));
        let Ok(report) = fx.service.run_cleanup().await else {
            panic!("cleanup failed");
        };
        assert_eq!(report.abandoned_confirmations, 0);
    }
}
