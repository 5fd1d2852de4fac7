use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use crate::db::models::leaderboard::UserTotalRow;

pub struct LeaderboardRepository {
    pool: &'static Pool<Postgres>,
}

impl LeaderboardRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Derived totals over non-deleted events, highest first. Ties break on
    /// ascending user id so recomputation always yields the same order.
    #[instrument(skip(self))]
    pub async fn aggregate_totals(&self, limit: i64) -> SqlxResult<Vec<UserTotalRow>> {
        sqlx::query_as::<_, UserTotalRow>(
            r#"
            SELECT
                user_id,
                SUM(points_earned)::bigint AS total_score,
                MAX(updated_at) AS last_updated
            FROM score_events
            WHERE deleted_at IS NULL
            GROUP BY user_id
            ORDER BY total_score DESC, user_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await
    }
}
