use std::collections::HashMap;

use async_trait::async_trait;

use crate::db::models::user::{DisplayFields, UserId};
use crate::score::ScoreResult;

/// Narrow view of the external user-management service: existence checks and
/// the display fields the leaderboard joins against. Account CRUD never comes
/// through here.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: UserId) -> ScoreResult<bool>;

    /// Batched lookup; ids absent from the directory are simply absent from
    /// the returned map.
    async fn display_fields(
        &self,
        ids: &[UserId],
    ) -> ScoreResult<HashMap<UserId, DisplayFields>>;
}
