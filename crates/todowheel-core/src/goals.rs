use crate::task::Task;

/// Aggregate filter label. Always selectable, never stored.
pub const ALL_GOALS: &str = "All Goals";

pub const DEFAULT_GOALS: [&str; 2] = ["Personal", "Work"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GoalError {
    #[error("goal name cannot be empty")]
    Empty,
}

/// Ordered set of user-defined goal labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalRegistry {
    labels: Vec<String>,
}

impl GoalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self::from_labels(DEFAULT_GOALS.iter().map(ToString::to_string))
    }

    /// Builds a registry from stored labels, dropping blanks, duplicates and
    /// the reserved aggregate label.
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut registry = Self::new();
        for label in labels {
            // Blank stored labels are skipped rather than rejected.
            let _ = registry.insert(&label);
        }
        registry
    }

    /// Inserts `name` unless an identical label exists. Returns whether the
    /// registry changed.
    pub fn insert(&mut self, name: &str) -> Result<bool, GoalError> {
        let label = name.trim();
        if label.is_empty() {
            return Err(GoalError::Empty);
        }
        if self.contains(label) {
            return Ok(false);
        }
        self.labels.push(label.to_string());
        Ok(true)
    }

    pub fn contains(&self, label: &str) -> bool {
        label == ALL_GOALS || self.labels.iter().any(|existing| existing == label)
    }

    /// Stored labels, without the aggregate entry.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Labels in display order, aggregate entry first.
    pub fn tabs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(ALL_GOALS).chain(self.labels.iter().map(String::as_str))
    }
}

/// Which goal the task list and the wheel are currently scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GoalFilter {
    #[default]
    All,
    Goal(String),
}

impl GoalFilter {
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed == ALL_GOALS || trimmed.is_empty() {
            Self::All
        } else {
            Self::Goal(trimmed.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_GOALS,
            Self::Goal(label) => label,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Goal(label) => task.goal == *label,
        }
    }
}
