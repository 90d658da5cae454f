use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duration::TaskDuration;

pub type TaskId = Uuid;

/// One task, either active or frozen in the completion ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default, rename = "time")]
    pub duration: Option<TaskDuration>,

    #[serde(rename = "goalCategory")]
    pub goal: String,

    #[serde(default)]
    pub completed: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, title: String, goal: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            duration: None,
            goal,
            completed: false,
            created_at: now,
            completed_at: None,
        }
    }

    /// Returns the record as it is kept in the completion ledger.
    pub fn into_completed(mut self, now: DateTime<Utc>) -> Self {
        self.completed = true;
        self.completed_at = Some(now);
        self
    }

    pub fn short_id(&self) -> String {
        short_id(self.id)
    }
}

pub fn short_id(id: TaskId) -> String {
    id.simple().to_string().chars().take(8).collect()
}
