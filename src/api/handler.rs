use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::middleware::identity::CallerIdentity;
use crate::api::server::{AppState, JsonResult};
use crate::constants::DEFAULT_LEADERBOARD_LIMIT;
use crate::db::models::event::ScoreEvent;
use crate::db::models::leaderboard::LeaderboardSnapshot;
use crate::db::models::user::UserId;
use crate::db::prelude::{Repository, ScoreRepository};
use crate::score::ScoreError;
use crate::score::coordinator::AwardRequest;
use crate::score::history::{HistoryQuery, ScorePage};

#[derive(Debug, Serialize)]
pub struct AwardResponse {
    pub status: &'static str,
}

/// The main award entrypoint. The caller's identity supplies the user id;
/// the body only describes the action.
#[instrument(skip(state, request), fields(user = %identity.user_id))]
pub async fn award_points(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Json(request): Json<AwardRequest>,
) -> JsonResult<AwardResponse> {
    state.coordinator.award(identity.user_id, request).await?;

    Ok(Json(AwardResponse { status: "ok" }))
}

#[instrument(skip(state))]
pub async fn user_score(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> JsonResult<ScoreEvent> {
    let user_id = UserId(user_id);
    if !user_id.is_valid() {
        return Err(ScoreError::Validation(String::from("invalid user id")).into());
    }

    let latest = ScoreRepository::new(state.db_pool)
        .find_latest_by_user(user_id)
        .await
        .map_err(ScoreError::from)?;

    match latest {
        Some(row) => Ok(Json(row.into())),
        None => {
            // distinguish "user has no score yet" from "no such user"
            if state.directory.exists(user_id).await? {
                Err(ScoreError::NotFound(user_id).into())
            } else {
                Err(ScoreError::UnknownUser(user_id).into())
            }
        }
    }
}

#[instrument(skip(state))]
pub async fn list_scores(
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<ScorePage> {
    let page = state.history.list(&query).await?;

    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    #[serde(default = "default_leaderboard_limit")]
    pub limit: i64,
}

#[inline]
const fn default_leaderboard_limit() -> i64 {
    DEFAULT_LEADERBOARD_LIMIT
}

#[instrument(skip(state))]
pub async fn leaderboard(
    Query(params): Query<LeaderboardParams>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<LeaderboardSnapshot> {
    let snapshot = state.aggregator.leaderboard(params.limit).await?;

    Ok(Json(snapshot))
}
