use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Ids are assigned from a positive sequence; anything else can never
    /// reference a user.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        UserId(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base users table model. The table belongs to the external user-management
/// service; this crate only reads it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The fields the user directory hands back for leaderboard display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayFields {
    pub display_name: String,
    pub email: String,
}
