use chrono::{DateTime, Utc};
use pickmirror_common::entity::EntityType;
use serde::{Deserialize, Serialize};

/// Lifecycle of a run. The terminal variants carry what the run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunState {
    InProgress,
    Completed {
        items_synced: i64,
        items_failed: i64,
    },
    Failed {
        items_synced: i64,
        items_failed: i64,
        error_message: String,
    },
}

impl RunState {
    pub fn status(&self) -> &'static str {
        match self {
            RunState::InProgress => "in_progress",
            RunState::Completed { .. } => "completed",
            RunState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::InProgress)
    }
}

/// The only states a run may move to from `InProgress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        items_synced: i64,
        items_failed: i64,
    },
    Failed {
        items_synced: i64,
        items_failed: i64,
        error_message: String,
    },
}

impl RunOutcome {
    pub fn into_state(self) -> RunState {
        match self {
            RunOutcome::Completed {
                items_synced,
                items_failed,
            } => RunState::Completed {
                items_synced,
                items_failed,
            },
            RunOutcome::Failed {
                items_synced,
                items_failed,
                error_message,
            } => RunState::Failed {
                items_synced,
                items_failed,
                error_message,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub run_id: String,
    pub entity_type: EntityType,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub state: RunState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWatermark {
    pub entity_type: EntityType,
    /// `DateTime::UNIX_EPOCH` means the entity has never been synced.
    pub last_sync_at: DateTime<Utc>,
    pub total_available: Option<i64>,
    pub total_synced: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_serializes_flat_with_status_tag() {
        let run = SyncRun {
            run_id: "products_1700000000000".to_string(),
            entity_type: EntityType::Products,
            started_at: DateTime::UNIX_EPOCH,
            ended_at: None,
            state: RunState::Failed {
                items_synced: 3,
                items_failed: 1,
                error_message: "boom".to_string(),
            },
        };
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["entity_type"], "products");
        assert_eq!(json["items_synced"], 3);
        assert_eq!(json["error_message"], "boom");
    }

    #[test]
    fn outcome_maps_to_terminal_state() {
        let state = RunOutcome::Completed {
            items_synced: 5,
            items_failed: 0,
        }
        .into_state();
        assert!(state.is_terminal());
        assert_eq!(state.status(), "completed");
        assert!(!RunState::InProgress.is_terminal());
    }
}
