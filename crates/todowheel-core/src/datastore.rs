use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::goals::DEFAULT_GOALS;
use crate::snapshot::{Collection, DirtySet, Snapshot};
use crate::store::{StoreError, StoreResult};
use crate::task::Task;

const TASKS_FILE: &str = "tasks.data";
const GOALS_FILE: &str = "goals.data";
const COMPLETED_FILE: &str = "completed.data";
const CONTEXT_FILE: &str = "context.data";

/// Local device storage: one JSON-lines file per collection.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub goals_path: PathBuf,
    pub completed_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| StoreError::io(&data_dir, source))?;

        let tasks_path = data_dir.join(TASKS_FILE);
        let goals_path = data_dir.join(GOALS_FILE);
        let completed_path = data_dir.join(COMPLETED_FILE);

        for path in [&tasks_path, &completed_path] {
            if !path.exists() {
                fs::write(path, "").map_err(|source| StoreError::io(path, source))?;
            }
        }
        if !goals_path.exists() {
            let defaults: Vec<String> = DEFAULT_GOALS.iter().map(ToString::to_string).collect();
            save_jsonl_atomic(&goals_path, &defaults)?;
            debug!(goals = ?defaults, "seeded default goals");
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            goals = %goals_path.display(),
            completed = %completed_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            goals_path,
            completed_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> StoreResult<Vec<Task>> {
        load_jsonl(&self.tasks_path)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_goals(&self) -> StoreResult<Vec<String>> {
        load_jsonl(&self.goals_path)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_completed(&self) -> StoreResult<Vec<Task>> {
        load_jsonl(&self.completed_path)
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&self, tasks: &[Task]) -> StoreResult<()> {
        save_jsonl_atomic(&self.tasks_path, tasks)
    }

    #[tracing::instrument(skip(self, goals))]
    pub fn save_goals(&self, goals: &[String]) -> StoreResult<()> {
        save_jsonl_atomic(&self.goals_path, goals)
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_completed(&self, tasks: &[Task]) -> StoreResult<()> {
        save_jsonl_atomic(&self.completed_path, tasks)
    }

    pub fn load_snapshot(&self) -> StoreResult<Snapshot> {
        Ok(Snapshot {
            tasks: self.load_tasks()?,
            goals: self.load_goals()?,
            completed: self.load_completed()?,
        })
    }

    /// Rewrites each dirty collection in full.
    #[tracing::instrument(skip(self, next, dirty))]
    pub fn save_snapshot(&self, next: &Snapshot, dirty: &DirtySet) -> StoreResult<()> {
        for collection in dirty {
            match collection {
                Collection::Tasks => self.save_tasks(&next.tasks)?,
                Collection::Goals => self.save_goals(&next.goals)?,
                Collection::Completed => self.save_completed(&next.completed)?,
            }
        }
        Ok(())
    }
}

/// Reads the goal filter remembered between invocations.
pub fn read_active_goal(data_dir: &Path) -> StoreResult<Option<String>> {
    let path = data_dir.join(CONTEXT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).map_err(|source| StoreError::io(&path, source))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

pub fn write_active_goal(data_dir: &Path, label: Option<&str>) -> StoreResult<()> {
    let path = data_dir.join(CONTEXT_FILE);
    fs::write(&path, label.unwrap_or_default()).map_err(|source| StoreError::io(&path, source))
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path).map_err(|source| StoreError::io(path, source))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| StoreError::io(path, source))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item = serde_json::from_str(trimmed).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
pub(crate) fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> StoreResult<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|source| StoreError::io(dir, source))?;
    for item in items {
        let serialized = serde_json::to_string(item).map_err(StoreError::Encode)?;
        writeln!(temp, "{serialized}").map_err(|source| StoreError::io(path, source))?;
    }
    temp.flush().map_err(|source| StoreError::io(path, source))?;

    temp.persist(path)
        .map_err(|err| StoreError::io(path, err.error))?;

    Ok(())
}
