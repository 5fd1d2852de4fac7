use thiserror::Error;

use crate::constants::{
    SQLSTATE_CHECK_VIOLATION, SQLSTATE_FOREIGN_KEY_VIOLATION, SQLSTATE_SERIALIZATION_FAILURE,
};
use crate::db::models::user::UserId;

pub mod aggregator;
pub mod coordinator;
pub mod directory;
pub mod history;
pub mod notify;
pub mod resolver;

pub type ScoreResult<T> = core::result::Result<T, ScoreError>;

/// Error taxonomy of the award and read paths. Each variant maps to a
/// distinct caller-visible outcome; `Conflict` in particular tells the caller
/// "try again" rather than "bad request".
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("{0}")]
    Validation(String),

    #[error("user {0} does not exist")]
    UnknownUser(UserId),

    #[error("no score recorded for user {0}")]
    NotFound(UserId),

    #[error("aborted by a concurrent conflicting transaction")]
    Conflict,

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl ScoreError {
    /// Classifies a persistence failure from the award path by SQLSTATE. The
    /// foreign-key and check constraints are the ledger's own enforcement of
    /// the referential and positivity invariants; serialization failures are
    /// the retryable class.
    pub fn from_db(user_id: UserId, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                return match sqlstate_kind(&code) {
                    SqlstateKind::ForeignKeyViolation => Self::UnknownUser(user_id),
                    SqlstateKind::CheckViolation => {
                        Self::Validation(String::from("points earned must be positive"))
                    }
                    SqlstateKind::SerializationFailure => Self::Conflict,
                    SqlstateKind::Other => Self::Db(err),
                };
            }
        }

        Self::Db(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlstateKind {
    ForeignKeyViolation,
    CheckViolation,
    SerializationFailure,
    Other,
}

fn sqlstate_kind(code: &str) -> SqlstateKind {
    match code {
        SQLSTATE_FOREIGN_KEY_VIOLATION => SqlstateKind::ForeignKeyViolation,
        SQLSTATE_CHECK_VIOLATION => SqlstateKind::CheckViolation,
        SQLSTATE_SERIALIZATION_FAILURE => SqlstateKind::SerializationFailure,
        _ => SqlstateKind::Other,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(sqlstate_kind("23503"), SqlstateKind::ForeignKeyViolation);
        assert_eq!(sqlstate_kind("23514"), SqlstateKind::CheckViolation);
        assert_eq!(sqlstate_kind("40001"), SqlstateKind::SerializationFailure);

        // unique_violation and friends stay unclassified
        assert_eq!(sqlstate_kind("23505"), SqlstateKind::Other);
        assert_eq!(sqlstate_kind(""), SqlstateKind::Other);
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = ScoreError::from_db(UserId(1), sqlx::Error::PoolClosed);
        assert!(matches!(err, ScoreError::Db(_)));
    }
}
