use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;

use super::HostedConfig;
use super::rows::{GoalRow, TaskRow};
use crate::store::{StoreError, StoreResult};
use crate::task::TaskId;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

pub(crate) fn build_http() -> StoreResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Turns non-2xx answers into `StoreError::Status` carrying the body.
pub(crate) async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Row-level access to the hosted tables on behalf of one signed-in user.
#[derive(Debug, Clone)]
pub struct RowClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: String,
}

impl RowClient {
    pub fn new(http: reqwest::Client, config: &HostedConfig, access_token: &str) -> Self {
        Self {
            http,
            base_url: config.base_url().to_string(),
            anon_key: config.anon_key.clone(),
            access_token: access_token.to_string(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{table}", self.base_url);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }

    #[tracing::instrument(skip(self))]
    pub async fn select_tasks(&self, user_id: &str) -> StoreResult<Vec<TaskRow>> {
        let response = self
            .request(Method::GET, "tasks")
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<TaskRow> = check(response).await?.json().await?;
        debug!(count = rows.len(), "selected task rows");
        Ok(rows)
    }

    #[tracing::instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn upsert_tasks(&self, rows: &[TaskRow]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::POST, "tasks")
            .query(&[("on_conflict", "id")])
            .header("Prefer", UPSERT_PREFER)
            .json(rows)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_tasks(&self, user_id: &str, ids: &[TaskId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .request(Method::DELETE, "tasks")
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("id", format!("in.({list})")),
            ])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn select_goals(&self, user_id: &str) -> StoreResult<Vec<GoalRow>> {
        let response = self
            .request(Method::GET, "goals")
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
            ])
            .send()
            .await?;
        let rows: Vec<GoalRow> = check(response).await?.json().await?;
        debug!(count = rows.len(), "selected goal rows");
        Ok(rows)
    }

    /// Upserts on `(user_id, name)` so a retried flush cannot duplicate a goal.
    #[tracing::instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn upsert_goals(&self, rows: &[GoalRow]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::POST, "goals")
            .query(&[("on_conflict", "user_id,name")])
            .header("Prefer", UPSERT_PREFER)
            .json(rows)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_goal(&self, user_id: &str, name: &str) -> StoreResult<()> {
        let response = self
            .request(Method::DELETE, "goals")
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("name", format!("eq.{name}")),
            ])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
