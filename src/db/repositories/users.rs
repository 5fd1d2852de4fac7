use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::user::{DisplayFields, UserId, UserRow};
use crate::db::repositories::Repository;
use crate::score::ScoreResult;
use crate::score::directory::UserDirectory;

/// Postgres-backed view of the externally-owned users table.
#[derive(Debug)]
pub struct PgUsers {
    pool: &'static Pool<Postgres>,
}

#[async_trait]
impl Repository for PgUsers {
    type Ident = UserId;
    type Output = UserRow;

    const BASE_FIELDS: &'static str = sql_fragment::USER_FIELDS;
    const TABLE_NAME: &'static str = "users";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

#[async_trait]
impl UserDirectory for PgUsers {
    #[instrument(skip(self))]
    async fn exists(&self, user_id: UserId) -> ScoreResult<bool> {
        Ok(Repository::exists(self, &user_id).await?)
    }

    #[instrument(skip(self, ids))]
    async fn display_fields(
        &self,
        ids: &[UserId],
    ) -> ScoreResult<HashMap<UserId, DisplayFields>> {
        #[derive(sqlx::FromRow)]
        struct FieldsRow {
            id: i64,
            display_name: String,
            email: String,
        }

        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

        let rows = sqlx::query_as::<_, FieldsRow>(
            r#"
            SELECT id, display_name, email
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    UserId(row.id),
                    DisplayFields {
                        display_name: row.display_name,
                        email: row.email,
                    },
                )
            })
            .collect())
    }
}
