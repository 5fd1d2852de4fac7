// Ledger-level bounds on a single award. The resolver decides the quantity,
// but whatever it answers is clamped against these before anything touches
// the transaction.
pub const MAX_POINTS_PER_AWARD: i64 = 1000;
pub const DEFAULT_ACTION_POINTS: i64 = 100;

pub const MAX_DESCRIPTION_CHARS: usize = 255;
pub const MAX_ACTION_TYPE_CHARS: usize = 50;
pub const MAX_METADATA_CHARS: usize = 500;

pub const MIN_LEADERBOARD_LIMIT: i64 = 1;
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const DEFAULT_API_PORT: u16 = 3000;

// Postgres SQLSTATE codes the award path classifies on.
pub const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";
pub const SQLSTATE_CHECK_VIOLATION: &str = "23514";
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
