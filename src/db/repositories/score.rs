use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::event::{EventId, HistoryFilters, ScoreEventRow};
use crate::db::models::user::UserId;
use crate::db::repositories::Repository;

/// Read side of the ledger. The single write path lives on [`super::Tx`] so
/// it can only ever run inside a transaction.
#[derive(Debug)]
pub struct ScoreRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for ScoreRepository {
    type Ident = EventId;
    type Output = ScoreEventRow;

    const BASE_FIELDS: &'static str = sql_fragment::EVENT_FIELDS;
    const TABLE_NAME: &'static str = "score_events";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

// Shared predicate for the history queries. Optional filters bind as NULLs so
// one static statement covers every combination.
const HISTORY_PREDICATE: &str = r#"
    deleted_at IS NULL
    AND ($1::bigint IS NULL OR user_id = $1)
    AND ($2::varchar IS NULL OR action_type = $2)
    AND ($3::bigint IS NULL OR points_earned >= $3)
    AND ($4::bigint IS NULL OR points_earned <= $4)
    AND ($5::timestamp IS NULL OR created_at >= $5)
    AND ($6::timestamp IS NULL OR created_at <= $6)
"#;

impl ScoreRepository {
    /// The legacy single-row lookup: most recent non-deleted event for the
    /// user, `None` when the user has never earned points.
    #[instrument(skip(self))]
    pub async fn find_latest_by_user(&self, user_id: UserId) -> SqlxResult<Option<ScoreEventRow>> {
        sqlx::query_as::<_, ScoreEventRow>(&format!(
            r#"
            SELECT {}
            FROM score_events
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            Self::BASE_FIELDS
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await
    }

    /// Filtered page of events, most recent first, plus the full matching
    /// count independent of the page window.
    #[instrument(skip(self, filters))]
    pub async fn history(
        &self,
        filters: &HistoryFilters,
        limit: i64,
        offset: i64,
    ) -> SqlxResult<(Vec<ScoreEventRow>, i64)> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM score_events WHERE {HISTORY_PREDICATE}"
        ))
        .bind(filters.user_id)
        .bind(&filters.action_type)
        .bind(filters.min_points)
        .bind(filters.max_points)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .fetch_one(self.pool)
        .await?;

        let events = sqlx::query_as::<_, ScoreEventRow>(&format!(
            r#"
            SELECT {}
            FROM score_events
            WHERE {}
            ORDER BY created_at DESC
            LIMIT $7 OFFSET $8
            "#,
            Self::BASE_FIELDS,
            HISTORY_PREDICATE
        ))
        .bind(filters.user_id)
        .bind(&filters.action_type)
        .bind(filters.min_points)
        .bind(filters.max_points)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((events, total))
    }
}
