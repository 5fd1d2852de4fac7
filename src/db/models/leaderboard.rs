use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::user::UserId;

/// One aggregate row of the leaderboard query: a user's derived total over
/// their non-deleted events. Never persisted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserTotalRow {
    pub user_id: UserId,
    pub total_score: i64,
    pub last_updated: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub total_score: i64,
    pub last_updated: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub entries: Vec<LeaderboardEntry>,
    pub total: i64,
    pub last_updated: NaiveDateTime,
}
