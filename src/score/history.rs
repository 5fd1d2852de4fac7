use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::db::models::event::{HistoryFilters, ScoreEvent};
use crate::db::models::user::UserId;
use crate::db::repositories::Repository;
use crate::db::repositories::score::ScoreRepository;
use crate::score::{ScoreError, ScoreResult};

/// Boundary query for score listings. Accepts both pagination conventions
/// (`limit`/`offset` and `page`/`page_size`); only the canonical window ever
/// reaches the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Option<i64>,
    pub action_type: Option<String>,
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,

    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

impl HistoryQuery {
    /// `page_size` defaults to `limit` defaults to 10; a supplied `page`
    /// wins over a raw `offset`.
    pub fn window(&self) -> ScoreResult<PageWindow> {
        let page_size = self.page_size.or(self.limit).unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ScoreError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let offset = match self.page {
            Some(page) if page >= 1 => (page - 1) * page_size,
            Some(_) => {
                return Err(ScoreError::Validation(String::from("page must be >= 1")));
            }
            None => self.offset.unwrap_or(0),
        };
        if offset < 0 {
            return Err(ScoreError::Validation(String::from(
                "offset must not be negative",
            )));
        }

        Ok(PageWindow {
            limit: page_size,
            offset,
        })
    }

    fn filters(&self) -> ScoreResult<HistoryFilters> {
        let user_id = match self.user_id {
            Some(id) => {
                let user_id = UserId(id);
                if !user_id.is_valid() {
                    return Err(ScoreError::Validation(String::from("invalid user id")));
                }
                Some(user_id)
            }
            None => None,
        };

        Ok(HistoryFilters {
            user_id,
            action_type: self.action_type.clone(),
            min_points: self.min_points,
            max_points: self.max_points,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScorePage {
    pub items: Vec<ScoreEvent>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Thin read path over the store's history query.
#[derive(Clone)]
pub struct HistoryReader {
    pool: &'static PgPool,
}

impl HistoryReader {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, query))]
    pub async fn list(&self, query: &HistoryQuery) -> ScoreResult<ScorePage> {
        let window = query.window()?;
        let filters = query.filters()?;

        let (rows, total) = ScoreRepository::new(self.pool)
            .history(&filters, window.limit, window.offset)
            .await?;

        let page = query.page.unwrap_or(window.offset / window.limit + 1);

        Ok(ScorePage {
            items: rows.into_iter().map(ScoreEvent::from).collect(),
            total,
            page,
            page_size: window.limit,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_window_defaults() {
        let query = HistoryQuery::default();
        let window = query.window().unwrap();

        assert_eq!(window, PageWindow { limit: 10, offset: 0 });
    }

    #[test]
    fn test_page_size_falls_back_to_limit() {
        let query = HistoryQuery {
            limit: Some(25),
            ..Default::default()
        };

        assert_eq!(query.window().unwrap().limit, 25);

        let query = HistoryQuery {
            limit: Some(25),
            page_size: Some(5),
            ..Default::default()
        };

        assert_eq!(query.window().unwrap().limit, 5);
    }

    #[test]
    fn test_page_converts_to_offset() {
        let query = HistoryQuery {
            page: Some(2),
            page_size: Some(10),
            ..Default::default()
        };

        assert_eq!(
            query.window().unwrap(),
            PageWindow {
                limit: 10,
                offset: 10
            }
        );
    }

    #[test]
    fn test_page_wins_over_raw_offset() {
        let query = HistoryQuery {
            page: Some(3),
            page_size: Some(10),
            offset: Some(95),
            ..Default::default()
        };

        assert_eq!(query.window().unwrap().offset, 20);
    }

    #[test]
    fn test_raw_offset_used_without_page() {
        let query = HistoryQuery {
            offset: Some(40),
            limit: Some(20),
            ..Default::default()
        };

        assert_eq!(
            query.window().unwrap(),
            PageWindow {
                limit: 20,
                offset: 40
            }
        );
    }

    #[test]
    fn test_window_rejects_out_of_bound_input() {
        let zero_page = HistoryQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(zero_page.window().is_err());

        let oversized = HistoryQuery {
            page_size: Some(101),
            ..Default::default()
        };
        assert!(oversized.window().is_err());

        let negative_offset = HistoryQuery {
            offset: Some(-1),
            ..Default::default()
        };
        assert!(negative_offset.window().is_err());
    }

    #[test]
    fn test_filters_reject_non_positive_user_id() {
        let query = HistoryQuery {
            user_id: Some(0),
            ..Default::default()
        };

        assert!(query.filters().is_err());
    }

    mod live {
        use super::*;
        use crate::db::models::event::NewScoreEvent;
        use crate::db::repositories::Tx;
        use crate::db::test_support;

        async fn seed_events(pool: &'static sqlx::PgPool, user_id: UserId, count: i64) {
            for i in 0..count {
                let mut tx = Tx::begin_serializable(pool).await.unwrap();
                tx.append_event(&NewScoreEvent {
                    user_id,
                    points_earned: i + 1,
                    action_description: format!("seeded event {i}"),
                    action_type: Some(String::from("seed")),
                    metadata: None,
                })
                .await
                .unwrap();
                tx.commit().await.unwrap();
            }
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn test_second_page_matches_full_ordering() {
            let pool = test_support::pool().await;
            let user_id = test_support::reset_user(pool, "history-pagination").await;
            seed_events(pool, user_id, 25).await;

            let reader = HistoryReader::new(pool);
            let base = HistoryQuery {
                user_id: Some(user_id.0),
                ..Default::default()
            };

            let full = reader
                .list(&HistoryQuery {
                    page_size: Some(25),
                    ..base.clone()
                })
                .await
                .unwrap();
            assert_eq!(full.total, 25);
            assert_eq!(full.items.len(), 25);

            let page_two = reader
                .list(&HistoryQuery {
                    page: Some(2),
                    page_size: Some(10),
                    ..base.clone()
                })
                .await
                .unwrap();

            assert_eq!(page_two.total, 25);
            assert_eq!(page_two.page, 2);
            assert_eq!(page_two.page_size, 10);

            let expected: Vec<_> = full.items[10..20].iter().map(|e| e.id).collect();
            let got: Vec<_> = page_two.items.iter().map(|e| e.id).collect();
            assert_eq!(got, expected);
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn test_point_bound_filters_narrow_the_count() {
            let pool = test_support::pool().await;
            let user_id = test_support::reset_user(pool, "history-filters").await;
            seed_events(pool, user_id, 10).await;

            let reader = HistoryReader::new(pool);
            let filtered = reader
                .list(&HistoryQuery {
                    user_id: Some(user_id.0),
                    min_points: Some(4),
                    max_points: Some(7),
                    ..Default::default()
                })
                .await
                .unwrap();

            assert_eq!(filtered.total, 4);
            assert!(
                filtered
                    .items
                    .iter()
                    .all(|e| (4..=7).contains(&e.points_earned))
            );
        }
    }
}
