use std::collections::BTreeSet;
use std::fmt;

use crate::task::Task;

/// The three persisted collections, as handed to and from a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub goals: Vec<String>,
    pub completed: Vec<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Tasks,
    Goals,
    Completed,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tasks => "tasks",
            Self::Goals => "goals",
            Self::Completed => "completed",
        })
    }
}

pub type DirtySet = BTreeSet<Collection>;

impl Snapshot {
    /// Collections whose contents differ between `self` and `other`.
    pub fn changed_collections(&self, other: &Snapshot) -> DirtySet {
        let mut dirty = DirtySet::new();
        if self.tasks != other.tasks {
            dirty.insert(Collection::Tasks);
        }
        if self.goals != other.goals {
            dirty.insert(Collection::Goals);
        }
        if self.completed != other.completed {
            dirty.insert(Collection::Completed);
        }
        dirty
    }
}
