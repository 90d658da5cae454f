//! Hosted row storage and authentication.

pub mod auth;
pub mod client;
pub mod rows;

use tracing::{debug, info};

use self::auth::AuthUser;
use self::client::RowClient;
use self::rows::{GoalRow, TaskRow, goal_delta, task_delta};
use crate::snapshot::{Collection, DirtySet, Snapshot};
use crate::store::{Backend, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedConfig {
    pub url: String,
    pub anon_key: String,
}

impl HostedConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// The three collections stored as rows owned by one user.
#[derive(Debug, Clone)]
pub struct HostedBackend {
    client: RowClient,
    user_id: String,
    email: Option<String>,
}

impl HostedBackend {
    pub fn new(http: reqwest::Client, config: &HostedConfig, user: &AuthUser) -> Self {
        Self {
            client: RowClient::new(http, config, &user.access_token),
            user_id: user.id.clone(),
            email: user.email.clone(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Backend for HostedBackend {
    fn describe(&self) -> String {
        match &self.email {
            Some(email) => format!("hosted:{email}"),
            None => format!("hosted:{}", self.user_id),
        }
    }

    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    async fn load(&self) -> StoreResult<Snapshot> {
        let rows = self.client.select_tasks(&self.user_id).await?;
        let goals = self.client.select_goals(&self.user_id).await?;

        let (mut completed, tasks): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .map(TaskRow::into_task)
            .partition(|task| task.completed);
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        info!(
            tasks = tasks.len(),
            completed = completed.len(),
            goals = goals.len(),
            "loaded hosted collections"
        );
        Ok(Snapshot {
            tasks,
            goals: goals.into_iter().map(|row| row.name).collect(),
            completed,
        })
    }

    #[tracing::instrument(skip(self, previous, next), fields(user_id = %self.user_id))]
    async fn persist(
        &self,
        previous: &Snapshot,
        next: &Snapshot,
        dirty: &DirtySet,
    ) -> StoreResult<()> {
        if dirty.contains(&Collection::Tasks) || dirty.contains(&Collection::Completed) {
            let delta = task_delta(previous, next);
            let rows: Vec<TaskRow> = delta
                .upserts
                .iter()
                .map(|task| TaskRow::from_task(task, &self.user_id))
                .collect();
            debug!(
                upserts = rows.len(),
                deletes = delta.removed.len(),
                "sending task delta"
            );
            self.client.upsert_tasks(&rows).await?;
            self.client
                .delete_tasks(&self.user_id, &delta.removed)
                .await?;
        }

        if dirty.contains(&Collection::Goals) {
            let delta = goal_delta(previous, next);
            let rows: Vec<GoalRow> = delta
                .added
                .into_iter()
                .map(|name| GoalRow {
                    id: None,
                    name,
                    user_id: self.user_id.clone(),
                })
                .collect();
            self.client.upsert_goals(&rows).await?;
            for name in &delta.removed {
                self.client.delete_goal(&self.user_id, name).await?;
            }
        }
        Ok(())
    }
}
