use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use crate::constants::{MAX_LEADERBOARD_LIMIT, MIN_LEADERBOARD_LIMIT};
use crate::db::models::leaderboard::{LeaderboardEntry, LeaderboardSnapshot, UserTotalRow};
use crate::db::models::user::{DisplayFields, UserId};
use crate::db::repositories::leaderboard::LeaderboardRepository;
use crate::score::directory::UserDirectory;
use crate::score::{ScoreError, ScoreResult};

/// Stateless leaderboard computation. Every call recomputes from the ledger;
/// nothing here caches, so the result can never drift from the events.
#[derive(Clone)]
pub struct Aggregator {
    pool: &'static PgPool,
    directory: Arc<dyn UserDirectory>,
}

impl Aggregator {
    pub fn new(pool: &'static PgPool, directory: Arc<dyn UserDirectory>) -> Self {
        Self { pool, directory }
    }

    #[instrument(skip(self))]
    pub async fn leaderboard(&self, limit: i64) -> ScoreResult<LeaderboardSnapshot> {
        validate_limit(limit)?;

        let rows = LeaderboardRepository::new(self.pool)
            .aggregate_totals(limit)
            .await?;

        let ids: Vec<UserId> = rows.iter().map(|row| row.user_id).collect();
        let fields = if ids.is_empty() {
            HashMap::new()
        } else {
            self.directory.display_fields(&ids).await?
        };

        let entries = assign_ranks(rows, &fields);
        let total = entries.len() as i64;

        Ok(LeaderboardSnapshot {
            entries,
            total,
            last_updated: Utc::now().naive_utc(),
        })
    }
}

pub fn validate_limit(limit: i64) -> ScoreResult<()> {
    if !(MIN_LEADERBOARD_LIMIT..=MAX_LEADERBOARD_LIMIT).contains(&limit) {
        return Err(ScoreError::Validation(format!(
            "limit must be between {MIN_LEADERBOARD_LIMIT} and {MAX_LEADERBOARD_LIMIT}"
        )));
    }

    Ok(())
}

/// Positional rank assignment over rows already ordered by the aggregate
/// query (total descending, user id ascending on ties).
///
/// Rows whose user vanished from the directory between the two queries are
/// skipped; the foreign key makes that a deletion race, not a data error.
fn assign_ranks(
    rows: Vec<UserTotalRow>,
    fields: &HashMap<UserId, DisplayFields>,
) -> Vec<LeaderboardEntry> {
    rows.into_iter()
        .filter_map(|row| fields.get(&row.user_id).map(|f| (row, f.clone())))
        .enumerate()
        .map(|(i, (row, f))| LeaderboardEntry {
            rank: i as i64 + 1,
            user_id: row.user_id,
            display_name: f.display_name,
            email: f.email,
            total_score: row.total_score,
            last_updated: row.last_updated,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn total_row(user_id: i64, total_score: i64) -> UserTotalRow {
        UserTotalRow {
            user_id: UserId(user_id),
            total_score,
            last_updated: Utc::now().naive_utc(),
        }
    }

    fn fields_for(ids: &[i64]) -> HashMap<UserId, DisplayFields> {
        ids.iter()
            .map(|id| {
                (
                    UserId(*id),
                    DisplayFields {
                        display_name: format!("user-{id}"),
                        email: format!("user-{id}@example.test"),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_limit_bounds() {
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(101).is_err());
        assert!(validate_limit(-5).is_err());

        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(10).is_ok());
        assert!(validate_limit(100).is_ok());
    }

    #[test]
    fn test_ranks_are_positional_and_one_indexed() {
        let rows = vec![total_row(7, 300), total_row(2, 200), total_row(9, 100)];
        let fields = fields_for(&[7, 2, 9]);

        let entries = assign_ranks(rows, &fields);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[0].user_id, UserId(7));
        assert_eq!(entries[1].rank, 2);
        assert_eq!(entries[1].user_id, UserId(2));
        assert_eq!(entries[2].rank, 3);
        assert_eq!(entries[2].total_score, 100);
    }

    #[test]
    fn test_rows_without_directory_entry_are_skipped() {
        let rows = vec![total_row(1, 500), total_row(2, 400), total_row(3, 300)];
        let fields = fields_for(&[1, 3]);

        let entries = assign_ranks(rows, &fields);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, UserId(1));
        // ranks stay contiguous after the skip
        assert_eq!(entries[1].rank, 2);
        assert_eq!(entries[1].user_id, UserId(3));
    }

    #[test]
    fn test_display_fields_carried_into_entries() {
        let rows = vec![total_row(42, 150)];
        let fields = fields_for(&[42]);

        let entries = assign_ranks(rows, &fields);

        assert_eq!(entries[0].display_name, "user-42");
        assert_eq!(entries[0].email, "user-42@example.test");
    }

    mod live {
        use super::*;
        use crate::db::models::event::NewScoreEvent;
        use crate::db::repositories::Repository;
        use crate::db::repositories::Tx;
        use crate::db::repositories::users::PgUsers;
        use crate::db::test_support;

        async fn seed_award(pool: &'static sqlx::PgPool, user_id: UserId, points: i64) {
            let mut tx = Tx::begin_serializable(pool).await.unwrap();
            tx.append_event(&NewScoreEvent {
                user_id,
                points_earned: points,
                action_description: String::from("seeded award"),
                action_type: None,
                metadata: None,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        fn aggregator(pool: &'static sqlx::PgPool) -> Aggregator {
            Aggregator::new(pool, Arc::new(PgUsers::new(pool)))
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn test_leaderboard_read_is_idempotent() {
            let pool = test_support::pool().await;
            let alice = test_support::reset_user(pool, "idempotent-alice").await;
            let bob = test_support::reset_user(pool, "idempotent-bob").await;
            seed_award(pool, alice, 300).await;
            seed_award(pool, bob, 200).await;

            let aggregator = aggregator(pool);
            let first = aggregator.leaderboard(100).await.unwrap();
            let second = aggregator.leaderboard(100).await.unwrap();

            // compare only the seeded users' totals so concurrently running
            // live tests cannot perturb the assertion
            let ours = |snapshot: &LeaderboardSnapshot| {
                snapshot
                    .entries
                    .iter()
                    .filter(|e| e.user_id == alice || e.user_id == bob)
                    .map(|e| (e.user_id, e.total_score))
                    .collect::<Vec<_>>()
            };

            assert_eq!(ours(&first), ours(&second));
            assert_eq!(ours(&first), vec![(alice, 300), (bob, 200)]);
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn test_ties_break_on_ascending_user_id() {
            let pool = test_support::pool().await;
            let first_user = test_support::reset_user(pool, "tie-first").await;
            let second_user = test_support::reset_user(pool, "tie-second").await;
            seed_award(pool, first_user, 500).await;
            seed_award(pool, second_user, 500).await;

            let snapshot = aggregator(pool).leaderboard(100).await.unwrap();
            let tied: Vec<UserId> = snapshot
                .entries
                .iter()
                .filter(|e| e.user_id == first_user || e.user_id == second_user)
                .map(|e| e.user_id)
                .collect();

            let mut sorted = tied.clone();
            sorted.sort();
            assert_eq!(tied, sorted);
        }
    }
}
