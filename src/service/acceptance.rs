//! Acceptance state machine and match confirmation.
//!
//! ```text
//! accept(user) ──► both users exist? ── no ──► NotFound, nothing written
//!                        │
//!                        ▼
//!        set flag on both rows; CONFIRMED if both set (one write)
//!                        │
//!              Waiting ──┼──► notify other party, PENDING
//!            Confirmed ──┴──► relationship, history, notify both
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::MatchService;
use crate::domain::{
    MatchEvent, MatchId, MatchResult, MatchStatus, MatchType, RelationLevel, Relationship,
    RelationshipId, UserId,
};
use crate::error::{EntityKind, MatchError};
use crate::persistence::PairAcceptance;

/// Message returned while the other party has not accepted yet.
pub const WAITING_MESSAGE: &str = "Match accepted. Waiting for the other user to accept.";
/// Message returned once both parties have accepted.
pub const CONFIRMED_MESSAGE: &str = "Match confirmed! You can now start chatting.";

/// Result of an accept call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptanceOutcome {
    /// Status of the match after the call.
    pub status: MatchStatus,
    /// Relationship joining the two users, once confirmed.
    pub relationship_id: Option<RelationshipId>,
    /// User-facing message.
    pub message: String,
}

impl AcceptanceOutcome {
    fn waiting() -> Self {
        Self {
            status: MatchStatus::Pending,
            relationship_id: None,
            message: WAITING_MESSAGE.to_string(),
        }
    }

    fn confirmed(relationship_id: RelationshipId) -> Self {
        Self {
            status: MatchStatus::Confirmed,
            relationship_id: Some(relationship_id),
            message: CONFIRMED_MESSAGE.to_string(),
        }
    }
}

impl MatchService {
    /// Records `user_id`'s acceptance of the match and confirms it once
    /// both parties have accepted.
    ///
    /// Either party may act on either row of the pair. Accepting again is
    /// a no-op; accepting a confirmed match returns the confirmed outcome.
    /// Both users must exist before anything is written, and the flag that
    /// completes the pair confirms it in the same store write.
    ///
    /// # Errors
    ///
    /// - [`MatchError::NotFound`] if the match or either user does not
    ///   exist.
    /// - [`MatchError::NotAuthorized`] if `user_id` is not a party.
    /// - [`MatchError::InvalidState`] if the match is retired or corrupt.
    /// - [`MatchError::TransientStoreFailure`] if the store fails.
    pub async fn accept_match(
        &self,
        user_id: UserId,
        match_id: MatchId,
    ) -> Result<AcceptanceOutcome, MatchError> {
        let row = self.load_match(match_id).await?;
        if row.is_self_match() {
            tracing::error!(%match_id, "self-match row cannot be accepted");
            return Err(MatchError::InvalidState(format!(
                "match {match_id} points back at its owner"
            )));
        }
        let Some(counterpart) = row.counterpart_of(user_id) else {
            return Err(MatchError::NotAuthorized {
                user_id: user_id.into(),
                match_id: match_id.into(),
            });
        };

        match row.status {
            MatchStatus::Pending => {}
            MatchStatus::Confirmed => return self.already_confirmed(&row).await,
            MatchStatus::Expired | MatchStatus::Declined => {
                return Err(retired(&row));
            }
        }

        for user in [row.owner_id, row.matched_user_id] {
            if self.stores.users.get_user(user).await?.is_none() {
                return Err(MatchError::not_found(EntityKind::User, user));
            }
        }

        let now = self.now();
        let acceptance = self
            .stores
            .matches
            .accept_pair(row.pair_id, user_id, now)
            .await?;
        tracing::info!(%user_id, %match_id, pair_id = %row.pair_id, ?acceptance, "match accepted");

        match acceptance {
            PairAcceptance::Confirmed => self.on_confirmed(&row, now).await,
            PairAcceptance::NotPending => {
                let current = self.load_match(match_id).await?;
                if current.status == MatchStatus::Confirmed {
                    self.already_confirmed(&current).await
                } else {
                    Err(retired(&current))
                }
            }
            PairAcceptance::Waiting => {
                self.notify_party(&row, counterpart, |recipient, match_id| {
                    MatchEvent::MatchStatusChanged {
                        user_id: recipient,
                        match_id,
                        status: MatchStatus::Pending,
                        timestamp: now,
                    }
                })
                .await;
                Ok(AcceptanceOutcome::waiting())
            }
        }
    }

    /// Once-only effects of the acceptance that confirmed the pair.
    async fn on_confirmed(
        &self,
        row: &MatchResult,
        confirmed_at: DateTime<Utc>,
    ) -> Result<AcceptanceOutcome, MatchError> {
        let (a, b) = (row.owner_id, row.matched_user_id);
        let relationship = self.ensure_relationship(a, b).await?;
        tracing::info!(
            match_id = %row.id,
            pair_id = %row.pair_id,
            relationship_id = %relationship.id,
            "match confirmed"
        );
        self.record_history(a, b, MatchType::Accepted, confirmed_at).await;
        self.record_history(b, a, MatchType::Accepted, confirmed_at).await;

        let relationship_id = relationship.id;
        self.notify_pair(row, |recipient, match_id| MatchEvent::MatchConfirmed {
            user_id: recipient,
            match_id,
            relationship_id,
            timestamp: confirmed_at,
        })
        .await;

        Ok(AcceptanceOutcome::confirmed(relationship.id))
    }

    async fn already_confirmed(&self, row: &MatchResult) -> Result<AcceptanceOutcome, MatchError> {
        let relationship = self
            .ensure_relationship(row.owner_id, row.matched_user_id)
            .await?;
        Ok(AcceptanceOutcome::confirmed(relationship.id))
    }

    /// Reuses the relationship between `a` and `b` in either direction,
    /// creating a public one if there is none.
    async fn ensure_relationship(&self, a: UserId, b: UserId) -> Result<Relationship, MatchError> {
        if let Some(existing) = self.stores.relationships.find_relationship(a, b).await? {
            return Ok(existing);
        }
        let created = self
            .stores
            .relationships
            .create_relationship(a, b, RelationLevel::Public, self.now())
            .await?;
        tracing::info!(relationship_id = %created.id, relating = %a, related = %b, "relationship created");
        Ok(created)
    }
}

fn retired(row: &MatchResult) -> MatchError {
    MatchError::InvalidState(format!(
        "match {} is {} and can no longer be accepted",
        row.id,
        row.status.as_str()
    ))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::persistence::{MatchStore, RelationshipStore, Stores};
    use crate::service::testing::{FailingPairStore, Fixture};

    #[tokio::test]
    async fn one_acceptance_stays_pending() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let (_conn, mut rx_b) = fx.registry.connect(b);

        let Ok(outcome) = fx.service.accept_match(a, summary.id).await else {
            panic!("accept failed");
        };
        assert_eq!(outcome.status, MatchStatus::Pending);
        assert_eq!(outcome.message, WAITING_MESSAGE);
        assert!(outcome.relationship_id.is_none());
        assert!(matches!(
            fx.service.check_match_confirmation(summary.id).await,
            Ok(false)
        ));

        let Ok(event) = rx_b.try_recv() else {
            panic!("other party should be told");
        };
        assert_eq!(event.event_type_str(), "match_status_changed");
        let Some(row_b) = fx.row_owned_by(b).await else {
            panic!("b has no row");
        };
        assert_eq!(event.match_id(), row_b.id);
    }

    #[tokio::test]
    async fn mutual_acceptance_confirms() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let (_conn_a, mut rx_a) = fx.registry.connect(a);
        let (_conn_b, mut rx_b) = fx.registry.connect(b);

        let _ = fx.service.accept_match(a, summary.id).await;
        let Ok(outcome) = fx.service.accept_match(b, summary.id).await else {
            panic!("accept failed");
        };
        assert_eq!(outcome.status, MatchStatus::Confirmed);
        assert_eq!(outcome.message, CONFIRMED_MESSAGE);
        assert!(matches!(
            fx.service.check_match_confirmation(summary.id).await,
            Ok(true)
        ));

        let relationships = fx.store.relationships().await;
        assert_eq!(relationships.len(), 1);
        let Some(relationship) = relationships.first() else {
            panic!("expected a relationship");
        };
        assert_eq!(relationship.level, RelationLevel::Public);
        assert_eq!(outcome.relationship_id, Some(relationship.id));

        for row in fx.store.all_matches().await {
            assert_eq!(row.status, MatchStatus::Confirmed);
            assert!(row.confirmed_at.is_some());
        }
        let Some(history) = fx.store.history(a, b).await else {
            panic!("missing history");
        };
        assert_eq!(history.match_type, MatchType::Accepted);
        assert!(fx.store.history(b, a).await.is_some());

        // Only the waiting party hears about the first acceptance.
        let mut a_events = Vec::new();
        while let Ok(event) = rx_a.try_recv() {
            a_events.push(event.event_type_str());
        }
        let mut b_events = Vec::new();
        while let Ok(event) = rx_b.try_recv() {
            b_events.push(event.event_type_str());
        }
        assert_eq!(a_events, vec!["match_confirmed"]);
        assert_eq!(b_events, vec!["match_status_changed", "match_confirmed"]);
    }

    #[tokio::test]
    async fn either_row_can_be_accepted() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let Some(row_b) = fx.row_owned_by(b).await else {
            panic!("b has no row");
        };

        let _ = fx.service.accept_match(a, summary.id).await;
        let Ok(outcome) = fx.service.accept_match(b, row_b.id).await else {
            panic!("accept failed");
        };
        assert_eq!(outcome.status, MatchStatus::Confirmed);
    }

    #[tokio::test]
    async fn re_accepting_changes_nothing() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;

        let _ = fx.service.accept_match(a, summary.id).await;
        let before = fx.store.all_matches().await;
        let Ok(outcome) = fx.service.accept_match(a, summary.id).await else {
            panic!("accept failed");
        };
        assert_eq!(outcome.status, MatchStatus::Pending);
        assert_eq!(fx.store.all_matches().await, before);

        let Ok(first) = fx.service.accept_match(b, summary.id).await else {
            panic!("accept failed");
        };
        let confirmed = fx.store.all_matches().await;
        let Ok(second) = fx.service.accept_match(b, summary.id).await else {
            panic!("accept failed");
        };
        assert_eq!(first, second);
        assert_eq!(fx.store.all_matches().await, confirmed);
        assert_eq!(fx.store.relationships().await.len(), 1);
    }

    #[tokio::test]
    async fn existing_relationship_is_reused() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let Ok(existing) = fx
            .store
            .create_relationship(b, a, RelationLevel::Private, Utc::now())
            .await
        else {
            panic!("seed failed");
        };

        let _ = fx.service.accept_match(a, summary.id).await;
        let Ok(outcome) = fx.service.accept_match(b, summary.id).await else {
            panic!("accept failed");
        };
        assert_eq!(outcome.relationship_id, Some(existing.id));
        assert_eq!(fx.store.relationships().await.len(), 1);
    }

    #[tokio::test]
    async fn stranger_is_not_authorized() {
        let fx = Fixture::new().await;
        let (_, _, summary) = fx.matched_pair("Q1").await;
        let stranger = fx.user("stranger").await;

        let result = fx.service.accept_match(stranger, summary.id).await;
        assert!(matches!(result, Err(MatchError::NotAuthorized { .. })));
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let fx = Fixture::new().await;
        let a = fx.user("a").await;
        let result = fx.service.accept_match(a, MatchId::new()).await;
        assert!(matches!(
            result,
            Err(MatchError::NotFound {
                kind: EntityKind::Match,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn retired_match_cannot_be_accepted() {
        let fx = Fixture::new().await;
        let (a, _, summary) = fx.matched_pair("Q1").await;
        let Some(row) = fx.row_owned_by(a).await else {
            panic!("a has no row");
        };
        let _ = fx.store.expire_pair(row.pair_id, Utc::now()).await;

        let result = fx.service.accept_match(a, summary.id).await;
        assert!(matches!(result, Err(MatchError::InvalidState(_))));
        let Some(after) = fx.row_owned_by(a).await else {
            panic!("a has no row");
        };
        assert!(!after.side_a_accepted);
    }

    #[tokio::test]
    async fn concurrent_acceptances_confirm_exactly_once() {
        for _ in 0..20 {
            let fx = Fixture::new().await;
            let (a, b, summary) = fx.matched_pair("Q1").await;
            let Some(row_b) = fx.row_owned_by(b).await else {
                panic!("b has no row");
            };
            let (_conn_a, mut rx_a) = fx.registry.connect(a);

            let service = Arc::new(fx.service.clone());
            let first = {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.accept_match(a, summary.id).await })
            };
            let second = {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.accept_match(b, row_b.id).await })
            };
            let (Ok(Ok(first)), Ok(Ok(second))) = (first.await, second.await) else {
                panic!("accept failed");
            };

            let statuses = [first.status, second.status];
            assert!(statuses.contains(&MatchStatus::Confirmed));
            assert!(fx
                .store
                .all_matches()
                .await
                .iter()
                .all(|m| m.status == MatchStatus::Confirmed));
            assert_eq!(fx.store.relationships().await.len(), 1);

            let relationship_ids: Vec<Option<RelationshipId>> = [first, second]
                .into_iter()
                .filter(|o| o.status == MatchStatus::Confirmed)
                .map(|o| o.relationship_id)
                .collect();
            assert!(relationship_ids.windows(2).all(|w| w.first() == w.last()));

            let mut confirmations = 0;
            while let Ok(event) = rx_a.try_recv() {
                if event.event_type_str() == "match_confirmed" {
                    confirmations += 1;
                }
            }
            assert_eq!(confirmations, 1);
        }
    }

    #[tokio::test]
    async fn missing_user_blocks_acceptance_without_writing() {
        let fx = Fixture::new().await;
        let a = fx.user("a").await;
        let ghost = UserId::new();
        let prompt_a = fx.deploy(a, "Q1").await;
        fx.deploy(ghost, "Q1").await;
        let Ok(created) = fx.service.find_matches(a, prompt_a.id).await else {
            panic!("discovery failed");
        };
        let Some(summary) = created.first() else {
            panic!("expected a match");
        };

        for caller in [a, ghost] {
            let result = fx.service.accept_match(caller, summary.id).await;
            assert!(matches!(
                result,
                Err(MatchError::NotFound {
                    kind: EntityKind::User,
                    ..
                })
            ));
        }
        for row in fx.store.all_matches().await {
            assert_eq!(row.status, MatchStatus::Pending);
            assert!(!row.side_a_accepted && !row.side_b_accepted);
            assert!(row.confirmed_at.is_none());
        }
        assert!(matches!(
            fx.service.check_match_confirmation(summary.id).await,
            Ok(false)
        ));

        // The sweep retires the pair without ever seeing both flags set.
        fx.clock.advance(chrono::Duration::days(4));
        let _ = fx.service.run_cleanup().await;
        for row in fx.store.all_matches().await {
            assert_eq!(row.status, MatchStatus::Expired);
            assert!(!row.both_accepted());
        }
    }

    #[tokio::test]
    async fn failed_acceptance_leaves_pair_untouched() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        let _ = fx.service.accept_match(a, summary.id).await;
        let before = fx.store.all_matches().await;

        let mut stores = Stores::from_backend(Arc::clone(&fx.store));
        stores.matches = Arc::new(FailingPairStore::new(Arc::clone(&fx.store), b).failing_accepts());
        let flaky = fx.service_with(stores);

        let result = flaky.accept_match(b, summary.id).await;
        assert!(matches!(result, Err(MatchError::TransientStoreFailure(_))));
        assert_eq!(fx.store.all_matches().await, before);
        assert!(fx.store.relationships().await.is_empty());

        let Ok(outcome) = fx.service.accept_match(b, summary.id).await else {
            panic!("retry failed");
        };
        assert_eq!(outcome.status, MatchStatus::Confirmed);
        for row in fx.store.all_matches().await {
            assert!(row.both_accepted());
            assert_eq!(row.confirmed_at, Some(fx.clock_now()));
        }
    }

    #[tokio::test]
    async fn relationship_is_stamped_with_confirmation_time() {
        let fx = Fixture::new().await;
        let (a, b, summary) = fx.matched_pair("Q1").await;
        fx.clock.advance(chrono::Duration::hours(5));

        let _ = fx.service.accept_match(a, summary.id).await;
        let _ = fx.service.accept_match(b, summary.id).await;

        let relationships = fx.store.relationships().await;
        let Some(relationship) = relationships.first() else {
            panic!("expected a relationship");
        };
        assert_eq!(relationship.created_at, fx.clock_now());
    }
}
