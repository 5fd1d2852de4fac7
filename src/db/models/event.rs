use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base score_events table model; `deleted_at` carries the raw soft-delete
/// marker as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreEventRow {
    pub id: EventId,
    pub user_id: UserId,
    pub points_earned: i64,
    pub action_description: String,
    pub action_type: Option<String>,
    pub metadata: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

/// Row state as a tagged enum so exclusion from aggregation is explicit at
/// the type level instead of an implicit null check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum EventState {
    Active,
    Deleted { at: NaiveDateTime },
}

impl EventState {
    pub fn is_active(&self) -> bool {
        matches!(self, EventState::Active)
    }
}

impl From<Option<NaiveDateTime>> for EventState {
    fn from(deleted_at: Option<NaiveDateTime>) -> Self {
        match deleted_at {
            Some(at) => EventState::Deleted { at },
            None => EventState::Active,
        }
    }
}

/// One unit of the ledger as handed out by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub id: EventId,
    pub user_id: UserId,
    pub points_earned: i64,
    pub action_description: String,
    pub action_type: Option<String>,
    pub metadata: Option<String>,
    pub state: EventState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ScoreEventRow> for ScoreEvent {
    fn from(row: ScoreEventRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            points_earned: row.points_earned,
            action_description: row.action_description,
            action_type: row.action_type,
            metadata: row.metadata,
            state: row.deleted_at.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert payload for one award. Validated by the coordinator before it gets
/// here; the store re-checks nothing beyond its own constraints.
#[derive(Debug, Clone)]
pub struct NewScoreEvent {
    pub user_id: UserId,
    pub points_earned: i64,
    pub action_description: String,
    pub action_type: Option<String>,
    pub metadata: Option<String>,
}

/// Store-level event filters; all optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilters {
    pub user_id: Option<UserId>,
    pub action_type: Option<String>,
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_event_state_from_deleted_at() {
        assert_eq!(EventState::from(None), EventState::Active);
        assert!(EventState::from(None).is_active());

        let at = Utc::now().naive_utc();
        let deleted = EventState::from(Some(at));
        assert_eq!(deleted, EventState::Deleted { at });
        assert!(!deleted.is_active());
    }

    #[test]
    fn test_event_state_serializes_tagged() {
        let active = serde_json::to_value(EventState::Active).unwrap();
        assert_eq!(active["state"], "active");

        let at = Utc::now().naive_utc();
        let deleted = serde_json::to_value(EventState::Deleted { at }).unwrap();
        assert_eq!(deleted["state"], "deleted");
        assert!(deleted.get("at").is_some());
    }

    #[test]
    fn test_row_into_event_keeps_soft_delete_marker() {
        let now = Utc::now().naive_utc();
        let row = ScoreEventRow {
            id: EventId(1),
            user_id: UserId(42),
            points_earned: 100,
            action_description: "daily login".into(),
            action_type: None,
            metadata: None,
            created_at: now,
            updated_at: now,
            deleted_at: Some(now),
        };

        let event = ScoreEvent::from(row);
        assert_eq!(event.state, EventState::Deleted { at: now });
        assert_eq!(event.points_earned, 100);
    }
}
