//! PostgreSQL implementation of every store trait.
//!
//! Match creation runs in one transaction guarded by a transaction-scoped
//! advisory lock on the unordered user pair, so concurrent discoveries for
//! the same two users serialize and the second one sees the first pair.
//! Acceptance is a single `UPDATE` that sets the flag and confirms the pair
//! together; its row locks make it linearizable per pair.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::models::{MATCH_COLUMNS, MatchRow, PromptRow, RelationshipRow, SessionRow, UserRow};
use super::{
    CandidateQuery, ConversationStore, MatchPair, MatchStore, NewMatchPair, PairAcceptance,
    PromptCatalog, RelationshipStore, UserDirectory,
};
use crate::domain::{
    DeployedPrompt, MatchId, MatchResult, MatchStatus, MatchType, MatchingSession, PairId,
    PromptId, RelationLevel, Relationship, SessionId, UserId, UserProfile,
};
use crate::error::{EntityKind, MatchError};

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TransientStoreFailure`] if the database cannot
    /// be reached.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, MatchError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections.min(max_connections))
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::TransientStoreFailure`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), MatchError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MatchError::TransientStoreFailure(e.to_string()))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Advisory lock key for an unordered pair of users.
fn pair_lock_key(a: UserId, b: UserId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}:{high}")
}

async fn session_for(
    conn: &mut PgConnection,
    user_id: UserId,
    prompt_id: PromptId,
) -> Result<MatchingSession, MatchError> {
    sqlx::query(
        "INSERT INTO matching_sessions (id, user_id, prompt_id) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, prompt_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(*user_id.as_uuid())
    .bind(*prompt_id.as_uuid())
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT id, user_id, prompt_id, created_at FROM matching_sessions \
         WHERE user_id = $1 AND prompt_id = $2",
    )
    .bind(*user_id.as_uuid())
    .bind(*prompt_id.as_uuid())
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

async fn insert_match_row(
    conn: &mut PgConnection,
    row: &MatchResult,
) -> Result<(), MatchError> {
    sqlx::query(
        "INSERT INTO match_results (id, pair_id, session_id, matched_user_id, compatibility_score, \
         theme_match, question_match, personality_match, location_match, status, \
         side_a_accepted, side_b_accepted, expires_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, FALSE, $11, $12)",
    )
    .bind(*row.id.as_uuid())
    .bind(*row.pair_id.as_uuid())
    .bind(*row.session_id.as_uuid())
    .bind(*row.matched_user_id.as_uuid())
    .bind(row.compatibility_score)
    .bind(row.flags.theme_match)
    .bind(row.flags.question_match)
    .bind(row.flags.personality_match)
    .bind(row.flags.location_match)
    .bind(row.status.as_str())
    .bind(row.expires_at)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn to_uuids(ids: &[UserId]) -> Vec<Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}

fn into_matches(rows: Vec<MatchRow>) -> Result<Vec<MatchResult>, MatchError> {
    rows.into_iter().map(MatchResult::try_from).collect()
}

#[async_trait]
impl MatchStore for PostgresStore {
    async fn find_or_create_session(
        &self,
        user_id: UserId,
        prompt_id: PromptId,
    ) -> Result<MatchingSession, MatchError> {
        let mut conn = self.pool.acquire().await?;
        session_for(&mut conn, user_id, prompt_id).await
    }

    async fn matched_counterparts(
        &self,
        user_id: UserId,
        session_id: SessionId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            "SELECT m.matched_user_id FROM match_results m \
             WHERE m.session_id = $1 AND m.matched_user_id = ANY($3) \
             UNION \
             SELECT s.user_id FROM match_results m \
             JOIN matching_sessions s ON s.id = m.session_id \
             WHERE m.matched_user_id = $2 AND s.user_id = ANY($3)",
        )
        .bind(*session_id.as_uuid())
        .bind(*user_id.as_uuid())
        .bind(to_uuids(candidates))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserId::from).collect())
    }

    async fn history_counterparts(
        &self,
        user_id: UserId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, MatchError> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            "SELECT matched_user_id FROM user_match_history \
             WHERE user_id = $1 AND matched_user_id = ANY($2) \
             UNION \
             SELECT user_id FROM user_match_history \
             WHERE matched_user_id = $1 AND user_id = ANY($2)",
        )
        .bind(*user_id.as_uuid())
        .bind(to_uuids(candidates))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserId::from).collect())
    }

    async fn create_match_pair(
        &self,
        pair: &NewMatchPair,
    ) -> Result<Option<MatchPair>, MatchError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(pair_lock_key(pair.initiator_id, pair.counterpart_id))
            .execute(&mut *tx)
            .await?;

        let initiator_session = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, prompt_id, created_at FROM matching_sessions WHERE id = $1",
        )
        .bind(*pair.initiator_session_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .map(MatchingSession::from)
        .ok_or_else(|| MatchError::not_found(EntityKind::Session, pair.initiator_session_id))?;

        if initiator_session.user_id != pair.initiator_id {
            return Err(MatchError::InvalidState(format!(
                "session {} does not belong to user {}",
                initiator_session.id, pair.initiator_id
            )));
        }

        let open = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                 SELECT 1 FROM match_results m \
                 JOIN matching_sessions s ON s.id = m.session_id \
                 WHERE m.status IN ('PENDING', 'CONFIRMED') \
                   AND ((s.user_id = $1 AND m.matched_user_id = $2) \
                     OR (s.user_id = $2 AND m.matched_user_id = $1)))",
        )
        .bind(*pair.initiator_id.as_uuid())
        .bind(*pair.counterpart_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        if open {
            tx.rollback().await?;
            return Ok(None);
        }

        let counterpart_session =
            session_for(&mut tx, pair.counterpart_id, pair.counterpart_prompt_id).await?;

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

        insert_match_row(&mut tx, &initiator).await?;
        insert_match_row(&mut tx, &counterpart).await?;
        tx.commit().await?;

        Ok(Some(MatchPair {
            initiator,
            counterpart,
        }))
    }

    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchResult>, MatchError> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM match_results m \
             JOIN matching_sessions s ON s.id = m.session_id WHERE m.id = $1"
        );
        sqlx::query_as::<_, MatchRow>(&sql)
            .bind(*match_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(MatchResult::try_from)
            .transpose()
    }

    async fn get_pair(&self, pair_id: PairId) -> Result<Vec<MatchResult>, MatchError> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM match_results m \
             JOIN matching_sessions s ON s.id = m.session_id \
             WHERE m.pair_id = $1 ORDER BY m.id"
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(*pair_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        into_matches(rows)
    }

    async fn matches_for_user(&self, user_id: UserId) -> Result<Vec<MatchResult>, MatchError> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM match_results m \
             JOIN matching_sessions s ON s.id = m.session_id \
             WHERE s.user_id = $1 OR m.matched_user_id = $1 \
             ORDER BY m.created_at DESC, m.id"
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(*user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        into_matches(rows)
    }

    async fn accept_pair(
        &self,
        pair_id: PairId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<PairAcceptance, MatchError> {
        // Both rows carry the same flags, so each row reaches CONFIRMED in
        // the same statement that sets its last flag.
        let statuses = sqlx::query_scalar::<_, String>(
            "UPDATE match_results m \
             SET side_a_accepted = m.side_a_accepted OR s.user_id = $2, \
                 side_b_accepted = m.side_b_accepted OR m.matched_user_id = $2, \
                 status = CASE \
                     WHEN (m.side_a_accepted OR s.user_id = $2) \
                      AND (m.side_b_accepted OR m.matched_user_id = $2) \
                     THEN 'CONFIRMED' ELSE m.status END, \
                 confirmed_at = CASE \
                     WHEN (m.side_a_accepted OR s.user_id = $2) \
                      AND (m.side_b_accepted OR m.matched_user_id = $2) \
                     THEN $3 ELSE m.confirmed_at END \
             FROM matching_sessions s \
             WHERE s.id = m.session_id AND m.pair_id = $1 AND m.status = 'PENDING' \
             RETURNING m.status",
        )
        .bind(*pair_id.as_uuid())
        .bind(*user_id.as_uuid())
        .bind(at)
        .fetch_all(&self.pool)
        .await?;

        if statuses.is_empty() {
            Ok(PairAcceptance::NotPending)
        } else if statuses.iter().any(|s| s == MatchStatus::Confirmed.as_str()) {
            Ok(PairAcceptance::Confirmed)
        } else {
            Ok(PairAcceptance::Waiting)
        }
    }

    async fn expire_pair(&self, pair_id: PairId, at: DateTime<Utc>) -> Result<u64, MatchError> {
        let result = sqlx::query(
            "UPDATE match_results SET status = 'EXPIRED', expires_at = $2 \
             WHERE pair_id = $1 AND status = 'PENDING'",
        )
        .bind(*pair_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, MatchError> {
        let result = sqlx::query(
            "UPDATE match_results SET status = 'EXPIRED' \
             WHERE status = 'PENDING' AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn confirmed_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM match_results m \
             JOIN matching_sessions s ON s.id = m.session_id \
             WHERE m.status = 'CONFIRMED' AND m.created_at < $1"
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        into_matches(rows)
    }

    async fn expire_confirmed(
        &self,
        match_id: MatchId,
        at: DateTime<Utc>,
    ) -> Result<bool, MatchError> {
        let result = sqlx::query(
            "UPDATE match_results SET status = 'EXPIRED', expires_at = $2 \
             WHERE id = $1 AND status = 'CONFIRMED'",
        )
        .bind(*match_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_pending_for_prompt(
        &self,
        prompt_id: PromptId,
        at: DateTime<Utc>,
    ) -> Result<u64, MatchError> {
        let result = sqlx::query(
            "UPDATE match_results SET status = 'EXPIRED', expires_at = $2 \
             WHERE status = 'PENDING' AND pair_id IN ( \
                 SELECT m.pair_id FROM match_results m \
                 JOIN matching_sessions s ON s.id = m.session_id \
                 WHERE s.prompt_id = $1)",
        )
        .bind(*prompt_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_history(
        &self,
        user_id: UserId,
        matched_user_id: UserId,
        match_type: MatchType,
        at: DateTime<Utc>,
    ) -> Result<(), MatchError> {
        sqlx::query(
            "INSERT INTO user_match_history (user_id, matched_user_id, match_type, recorded_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, matched_user_id) \
             DO UPDATE SET match_type = EXCLUDED.match_type, recorded_at = EXCLUDED.recorded_at",
        )
        .bind(*user_id.as_uuid())
        .bind(*matched_user_id.as_uuid())
        .bind(match_type.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserProfile>, MatchError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, username, profile_picture_url, personality_summary \
             FROM users WHERE id = $1",
        )
        .bind(*user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserProfile::from))
    }
}

#[async_trait]
impl PromptCatalog for PostgresStore {
    async fn get_deployed_prompt(
        &self,
        prompt_id: PromptId,
    ) -> Result<Option<DeployedPrompt>, MatchError> {
        sqlx::query_as::<_, PromptRow>(
            "SELECT id, user_id, theme_id, theme_name, question, status, deployed_at, expires_at \
             FROM deployed_prompts WHERE id = $1",
        )
        .bind(*prompt_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(DeployedPrompt::try_from)
        .transpose()
    }

    async fn list_active_prompts(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<DeployedPrompt>, MatchError> {
        let rows = sqlx::query_as::<_, PromptRow>(
            "SELECT id, user_id, theme_id, theme_name, question, status, deployed_at, expires_at \
             FROM deployed_prompts \
             WHERE user_id <> $1 AND status = 'ACTIVE' AND expires_at > $2 \
               AND (question = $3 OR theme_id = $4) \
             ORDER BY deployed_at DESC, id \
             LIMIT $5",
        )
        .bind(*query.excluding_user.as_uuid())
        .bind(query.now)
        .bind(&query.question)
        .bind(*query.theme_id.as_uuid())
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeployedPrompt::try_from).collect()
    }
}

#[async_trait]
impl RelationshipStore for PostgresStore {
    async fn find_relationship(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<Relationship>, MatchError> {
        sqlx::query_as::<_, RelationshipRow>(
            "SELECT id, relating_user_id, related_user_id, relation_level, created_at \
             FROM relationships \
             WHERE (relating_user_id = $1 AND related_user_id = $2) \
                OR (relating_user_id = $2 AND related_user_id = $1) \
             ORDER BY created_at LIMIT 1",
        )
        .bind(*a.as_uuid())
        .bind(*b.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Relationship::try_from)
        .transpose()
    }

    async fn create_relationship(
        &self,
        relating: UserId,
        related: UserId,
        level: RelationLevel,
        created_at: DateTime<Utc>,
    ) -> Result<Relationship, MatchError> {
        sqlx::query(
            "INSERT INTO relationships \
                 (id, relating_user_id, related_user_id, relation_level, created_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(*relating.as_uuid())
        .bind(*related.as_uuid())
        .bind(level.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        self.find_relationship(relating, related)
            .await?
            .ok_or_else(|| {
                MatchError::Internal(format!(
                    "relationship between {relating} and {related} missing after insert"
                ))
            })
    }
}

#[async_trait]
impl ConversationStore for PostgresStore {
    async fn count_messages_between(&self, a: UserId, b: UserId) -> Result<u64, MatchError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1)",
        )
        .bind(*a.as_uuid())
        .bind(*b.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_ignores_argument_order() {
        let (a, b) = (UserId::new(), UserId::new());
        assert_eq!(pair_lock_key(a, b), pair_lock_key(b, a));
        assert_ne!(pair_lock_key(a, b), pair_lock_key(a, UserId::new()));
    }
}
