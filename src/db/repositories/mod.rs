use core::fmt;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Result as SqlxResult, Transaction};
use tracing::instrument;

use crate::db::models::event::{NewScoreEvent, ScoreEventRow};

pub mod leaderboard;
pub mod score;
pub mod users;

/// Transaction wrapper around the one write path the ledger has.
///
/// Opened at serializable isolation so an award behaves as if it executed
/// alone relative to every other award and aggregate read.
pub struct Tx<'a> {
    inner: Option<Transaction<'a, Postgres>>,
}

impl<'a> Tx<'a> {
    #[instrument(skip(pool))]
    pub async fn begin_serializable(pool: &'static Pool<Postgres>) -> SqlxResult<Self> {
        let mut inner = pool.begin().await?;

        // Must be the first statement of the transaction; Postgres rejects it
        // after any query has run.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *inner)
            .await?;

        Ok(Self { inner: Some(inner) })
    }

    /// Appends one event inside this transaction. Referential and positivity
    /// constraints are enforced by the table itself at this point, never by a
    /// pre-check that could race the insert.
    #[instrument(skip(self, event), fields(user = %event.user_id))]
    pub async fn append_event(&mut self, event: &NewScoreEvent) -> SqlxResult<ScoreEventRow> {
        sqlx::query_as::<_, ScoreEventRow>(
            r#"
            INSERT INTO score_events (
                user_id,
                points_earned,
                action_description,
                action_type,
                metadata,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING
                id,
                user_id,
                points_earned,
                action_description,
                action_type,
                metadata,
                created_at,
                updated_at,
                deleted_at
            "#,
        )
        .bind(event.user_id)
        .bind(event.points_earned)
        .bind(&event.action_description)
        .bind(&event.action_type)
        .bind(&event.metadata)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    #[instrument(skip(self))]
    pub async fn rollback(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    fn inner_mut(&mut self) -> SqlxResult<&mut Transaction<'a, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("Transaction already completed".into()))
    }
}

pub mod sql_fragment {
    pub const EVENT_FIELDS: &str = r#"
        id,
        user_id,
        points_earned,
        action_description,
        action_type,
        metadata,
        created_at,
        updated_at,
        deleted_at
    "#;

    pub const USER_FIELDS: &str = r#"
        id,
        display_name,
        email,
        created_at,
        updated_at
    "#;
}

#[async_trait]
pub trait Repository {
    type Ident: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, <Postgres as sqlx::Database>::Row>
        + Sized
        + Unpin
        + Send
        + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;

    fn new(pool: &'static Pool<Postgres>) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &'static Pool<Postgres>;

    async fn exists(&self, id: &Self::Ident) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            Self::TABLE_NAME
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
    }

    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }
}
