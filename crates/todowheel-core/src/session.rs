//! Session state and its transitions.
//!
//! Every transition borrows the current state and returns a new one; the
//! caller decides when to swap it in and when to persist it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::duration::TaskDuration;
use crate::goals::{GoalError, GoalFilter, GoalRegistry};
use crate::snapshot::Snapshot;
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("please enter a task title")]
    EmptyTitle,
    #[error("a task with id {0} already exists")]
    DuplicateId(TaskId),
    #[error("no task with id {0}")]
    NotFound(TaskId),
    #[error("id prefix `{0}` matches more than one task")]
    AmbiguousId(String),
    #[error("unknown goal: {0}")]
    UnknownGoal(String),
    #[error(transparent)]
    Goal(#[from] GoalError),
}

impl SessionError {
    /// Not-found conditions are reported to the user but are not failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Input for a new task, as collected from the user.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub id: TaskId,
    pub title: String,
    pub duration: Option<TaskDuration>,
    pub goal: Option<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            duration: None,
            goal: None,
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    pub fn with_duration(mut self, duration: TaskDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }
}

/// Everything the user sees: active tasks, goals, the completion ledger and
/// the currently selected goal filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    tasks: Vec<Task>,
    goals: GoalRegistry,
    completed: Vec<Task>,
    active_goal: GoalFilter,
}

impl SessionState {
    pub fn new(tasks: Vec<Task>, goals: GoalRegistry, completed: Vec<Task>) -> Self {
        Self {
            tasks,
            goals,
            completed,
            active_goal: GoalFilter::All,
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self::new(
            snapshot.tasks,
            GoalRegistry::from_labels(snapshot.goals),
            snapshot.completed,
        )
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.clone(),
            goals: self.goals.labels().to_vec(),
            completed: self.completed.clone(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    pub fn goals(&self) -> &GoalRegistry {
        &self.goals
    }

    pub fn active_goal(&self) -> &GoalFilter {
        &self.active_goal
    }

    /// Active tasks under the current goal filter, in insertion order.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.active_goal.matches(task))
            .collect()
    }

    pub fn add_task(&self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Self, SessionError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(SessionError::EmptyTitle);
        }
        if self.tasks.iter().any(|task| task.id == draft.id) {
            return Err(SessionError::DuplicateId(draft.id));
        }

        let goal = match draft.goal.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => {
                if !self.goals.contains(label) {
                    return Err(SessionError::UnknownGoal(label.to_string()));
                }
                label.to_string()
            }
            _ => self.active_goal.label().to_string(),
        };

        let mut task = Task::new(draft.id, title.to_string(), goal, now);
        task.duration = draft.duration;

        let mut next = self.clone();
        next.tasks.push(task);
        Ok(next)
    }

    /// Removes an active task. Unknown ids leave the state untouched.
    pub fn remove_task(&self, id: TaskId) -> Self {
        let mut next = self.clone();
        next.tasks.retain(|task| task.id != id);
        next
    }

    /// Moves an active task to the front of the completion ledger.
    pub fn complete_task(&self, id: TaskId, now: DateTime<Utc>) -> Result<Self, SessionError> {
        let idx = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(SessionError::NotFound(id))?;

        if self.completed.iter().any(|done| done.id == id) {
            return Err(SessionError::DuplicateId(id));
        }

        let mut next = self.clone();
        let task = next.tasks.remove(idx).into_completed(now);
        next.completed.insert(0, task);
        Ok(next)
    }

    pub fn remove_completed(&self, id: TaskId) -> Self {
        let mut next = self.clone();
        next.completed.retain(|task| task.id != id);
        next
    }

    pub fn clear_completed(&self) -> Self {
        let mut next = self.clone();
        next.completed.clear();
        next
    }

    pub fn add_goal(&self, name: &str) -> Result<Self, SessionError> {
        let mut next = self.clone();
        next.goals.insert(name)?;
        Ok(next)
    }

    pub fn select_goal(&self, label: &str) -> Result<Self, SessionError> {
        let filter = GoalFilter::from_label(label);
        if !self.goals.contains(filter.label()) {
            return Err(SessionError::UnknownGoal(label.trim().to_string()));
        }
        let mut next = self.clone();
        next.active_goal = filter;
        Ok(next)
    }

    /// Resolves a full id or a unique prefix of the short id against the
    /// active collection.
    pub fn resolve_active(&self, needle: &str) -> Result<Option<TaskId>, SessionError> {
        resolve_prefix(&self.tasks, needle)
    }

    pub fn resolve_completed(&self, needle: &str) -> Result<Option<TaskId>, SessionError> {
        resolve_prefix(&self.completed, needle)
    }
}

fn resolve_prefix(tasks: &[Task], needle: &str) -> Result<Option<TaskId>, SessionError> {
    let needle = needle.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }
    if let Ok(id) = Uuid::parse_str(&needle) {
        return Ok(tasks.iter().find(|task| task.id == id).map(|task| task.id));
    }

    let mut matches = tasks
        .iter()
        .filter(|task| task.id.simple().to_string().starts_with(&needle));
    let Some(first) = matches.next() else {
        return Ok(None);
    };
    if matches.next().is_some() {
        return Err(SessionError::AmbiguousId(needle));
    }
    Ok(Some(first.id))
}
