use async_trait::async_trait;

use crate::constants::DEFAULT_ACTION_POINTS;
use crate::db::models::user::UserId;
use crate::score::ScoreResult;
use crate::score::coordinator::AwardRequest;

/// Decides how many points a described action is worth.
///
/// The real scoring rules live outside this service; the award protocol only
/// depends on them through this seam, so swapping the rule engine never
/// touches the transactional path. Whatever a resolver answers is still
/// bounded by the coordinator before persistence.
#[async_trait]
pub trait ActionResolver: Send + Sync {
    async fn resolve(&self, user_id: UserId, action: &AwardRequest) -> ScoreResult<i64>;
}

/// Flat-rate resolver: every accepted action is worth the same quantity.
#[derive(Debug, Clone)]
pub struct FixedResolver {
    points: i64,
}

impl FixedResolver {
    pub fn new(points: i64) -> Self {
        Self { points }
    }
}

impl Default for FixedResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_POINTS)
    }
}

#[async_trait]
impl ActionResolver for FixedResolver {
    async fn resolve(&self, user_id: UserId, action: &AwardRequest) -> ScoreResult<i64> {
        tracing::info!(
            user = %user_id,
            description = %action.action_description,
            action_type = ?action.action_type,
            "resolving action"
        );

        Ok(self.points)
    }
}
