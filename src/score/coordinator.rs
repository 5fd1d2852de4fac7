use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use crate::constants::{
    DEFAULT_LEADERBOARD_LIMIT, MAX_ACTION_TYPE_CHARS, MAX_DESCRIPTION_CHARS, MAX_METADATA_CHARS,
    MAX_POINTS_PER_AWARD,
};
use crate::db::models::event::{NewScoreEvent, ScoreEvent};
use crate::db::models::user::UserId;
use crate::db::repositories::Tx;
use crate::score::aggregator::Aggregator;
use crate::score::notify::NotificationSink;
use crate::score::resolver::ActionResolver;
use crate::score::{ScoreError, ScoreResult};

/// Request body for one award attempt. The point quantity never appears
/// here; only the resolver decides that.
#[derive(Debug, Clone, Deserialize)]
pub struct AwardRequest {
    pub action_description: String,
    pub action_type: Option<String>,
    pub metadata: Option<String>,
}

impl AwardRequest {
    pub fn validate(&self) -> ScoreResult<()> {
        let description = self.action_description.trim();
        if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ScoreError::Validation(format!(
                "action description is required and must be between 1 and {MAX_DESCRIPTION_CHARS} characters"
            )));
        }

        if let Some(action_type) = &self.action_type {
            if action_type.chars().count() > MAX_ACTION_TYPE_CHARS {
                return Err(ScoreError::Validation(format!(
                    "action type must not exceed {MAX_ACTION_TYPE_CHARS} characters"
                )));
            }
        }

        if let Some(metadata) = &self.metadata {
            if metadata.chars().count() > MAX_METADATA_CHARS {
                return Err(ScoreError::Validation(format!(
                    "metadata must not exceed {MAX_METADATA_CHARS} characters"
                )));
            }
        }

        Ok(())
    }
}

/// Orchestrates the award protocol:
/// validate, resolve, persist inside one serializable transaction, then
/// notify after commit.
///
/// The resolver runs strictly before the transaction opens so its latency
/// never extends the serializable window; the insert is the only write. A
/// serialization abort surfaces as [`ScoreError::Conflict`] and is NOT
/// retried here -- retrying is the caller's decision.
#[derive(Clone)]
pub struct AwardCoordinator {
    pool: &'static PgPool,
    resolver: Arc<dyn ActionResolver>,
    aggregator: Aggregator,
    sink: Arc<dyn NotificationSink>,
}

impl AwardCoordinator {
    pub fn new(
        pool: &'static PgPool,
        resolver: Arc<dyn ActionResolver>,
        aggregator: Aggregator,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pool,
            resolver,
            aggregator,
            sink,
        }
    }

    #[instrument(skip(self, request), fields(user = %user_id))]
    pub async fn award(&self, user_id: UserId, request: AwardRequest) -> ScoreResult<ScoreEvent> {
        if !user_id.is_valid() {
            return Err(ScoreError::Validation(String::from("invalid user id")));
        }
        request.validate()?;

        let points = self.resolver.resolve(user_id, &request).await?;
        check_resolved_points(points)?;

        let new_event = NewScoreEvent {
            user_id,
            points_earned: points,
            action_description: request.action_description.trim().to_owned(),
            action_type: request.action_type,
            metadata: request.metadata,
        };

        let mut tx = Tx::begin_serializable(self.pool)
            .await
            .map_err(|e| ScoreError::from_db(user_id, e))?;

        let row = match tx.append_event(&new_event).await {
            Ok(row) => row,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = ?rollback_err, "rollback failure after rejected append");
                }
                return Err(ScoreError::from_db(user_id, e));
            }
        };

        tx.commit()
            .await
            .map_err(|e| ScoreError::from_db(user_id, e))?;

        let event = ScoreEvent::from(row);
        tracing::info!(event = %event.id, points = event.points_earned, "award committed");

        self.notify_after_commit(user_id);

        Ok(event)
    }

    /// Post-commit leaderboard push, detached from the caller. Failures here
    /// are logged and dropped; the award already succeeded.
    fn notify_after_commit(&self, user_id: UserId) {
        let aggregator = self.aggregator.clone();
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            let snapshot = match aggregator.leaderboard(DEFAULT_LEADERBOARD_LIMIT).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(error = ?e, user = %user_id, "post-award leaderboard recomputation failed");
                    return;
                }
            };

            if let Err(e) = sink.publish(&snapshot).await {
                tracing::warn!(error = ?e, user = %user_id, "leaderboard notification failed");
            }
        });
    }
}

/// Ledger-level bound on whatever the resolver answered.
pub fn check_resolved_points(points: i64) -> ScoreResult<()> {
    if points <= 0 {
        return Err(ScoreError::Validation(String::from(
            "points to add must be positive",
        )));
    }
    if points > MAX_POINTS_PER_AWARD {
        return Err(ScoreError::Validation(format!(
            "points to add cannot exceed {MAX_POINTS_PER_AWARD}"
        )));
    }

    Ok(())
}
