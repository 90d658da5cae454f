use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duration::{DurationUnit, TaskDuration};
use crate::snapshot::Snapshot;
use crate::task::{Task, TaskId};

/// One row of the hosted `tasks` table. Active and completed tasks share
/// the table and are told apart by `completed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRow {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub duration_unit: Option<DurationUnit>,
    pub goal: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub user_id: String,
}

impl TaskRow {
    pub fn from_task(task: &Task, user_id: &str) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            duration_minutes: task.duration.map(|d| d.minutes),
            duration_unit: task.duration.map(|d| d.unit),
            goal: task.goal.clone(),
            completed: task.completed,
            created_at: task.created_at,
            completed_at: task.completed_at,
            user_id: user_id.to_string(),
        }
    }

    pub fn into_task(self) -> Task {
        let duration = match (self.duration_minutes, self.duration_unit) {
            (Some(minutes), unit) if minutes > 0 => Some(TaskDuration {
                minutes,
                unit: unit.unwrap_or(DurationUnit::Minutes),
            }),
            _ => None,
        };
        Task {
            id: self.id,
            title: self.title,
            duration,
            goal: self.goal,
            completed: self.completed,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    pub user_id: String,
}

/// Per-record changes to send to the `tasks` table.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TaskDelta<'a> {
    pub upserts: Vec<&'a Task>,
    pub removed: Vec<TaskId>,
}

impl TaskDelta<'_> {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removed.is_empty()
    }
}

/// Compares both collections as one keyed set, so a task moving from
/// active to completed is a single upsert rather than a delete + insert.
pub fn task_delta<'a>(previous: &Snapshot, next: &'a Snapshot) -> TaskDelta<'a> {
    let before = index_tasks(previous);
    let after = index_tasks(next);

    let upserts = after
        .iter()
        .filter(|(id, task)| before.get(id) != Some(task))
        .map(|(_, task)| *task)
        .collect();
    let removed = before
        .keys()
        .filter(|id| !after.contains_key(id))
        .copied()
        .collect();

    TaskDelta { upserts, removed }
}

fn index_tasks(snapshot: &Snapshot) -> BTreeMap<TaskId, &Task> {
    snapshot
        .tasks
        .iter()
        .chain(snapshot.completed.iter())
        .map(|task| (task.id, task))
        .collect()
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct GoalDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

pub fn goal_delta(previous: &Snapshot, next: &Snapshot) -> GoalDelta {
    let before: BTreeSet<&String> = previous.goals.iter().collect();
    let after: BTreeSet<&String> = next.goals.iter().collect();
    GoalDelta {
        added: next
            .goals
            .iter()
            .filter(|goal| !before.contains(goal))
            .cloned()
            .collect(),
        removed: previous
            .goals
            .iter()
            .filter(|goal| !after.contains(goal))
            .cloned()
            .collect(),
    }
}
