//! Password sign-in against the hosted auth endpoints.
//!
//! The signed-in session is cached as `session.json` in the data directory
//! so one-shot commands can reuse it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::HostedConfig;
use super::client::{build_http, check};
use crate::store::{StoreError, StoreResult};

const SESSION_FILE: &str = "session.json";
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (self.expires_at, &self.refresh_token) {
            (Some(expires_at), Some(_)) => {
                expires_at - Duration::seconds(REFRESH_MARGIN_SECS) <= now
            }
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_user(self, now: DateTime<Utc>) -> AuthUser {
        AuthUser {
            id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

#[derive(Debug)]
pub struct Authenticator {
    http: reqwest::Client,
    config: HostedConfig,
    session_path: PathBuf,
    user: Option<AuthUser>,
    loading: bool,
}

impl Authenticator {
    pub fn new(config: HostedConfig, data_dir: &Path) -> StoreResult<Self> {
        Ok(Self {
            http: build_http()?,
            config,
            session_path: data_dir.join(SESSION_FILE),
            user: None,
            loading: false,
        })
    }

    pub fn config(&self) -> &HostedConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn current_user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    /// True while a sign-in, refresh or sign-out request is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Loads the cached session, if any. A corrupt cache is treated as
    /// signed out.
    #[tracing::instrument(skip(self))]
    pub fn restore(&mut self) -> StoreResult<Option<&AuthUser>> {
        if !self.session_path.exists() {
            self.user = None;
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.session_path)
            .map_err(|source| StoreError::io(&self.session_path, source))?;
        self.user = match serde_json::from_str::<AuthUser>(&raw) {
            Ok(user) => Some(user),
            Err(error) => {
                warn!(
                    file = %self.session_path.display(),
                    error = %error,
                    "ignoring unreadable cached session"
                );
                None
            }
        };
        Ok(self.user.as_ref())
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in(&mut self, email: &str, password: &str) -> StoreResult<&AuthUser> {
        self.loading = true;
        let result = self
            .token_request(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        self.loading = false;

        let user = result?;
        info!(user_id = %user.id, "signed in");
        self.store_session(&user)?;
        Ok(self.user.insert(user))
    }

    /// Exchanges the refresh token when the access token is about to expire.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_fresh(&mut self, now: DateTime<Utc>) -> StoreResult<()> {
        let Some(refresh_token) = self
            .user
            .as_ref()
            .filter(|user| user.needs_refresh(now))
            .and_then(|user| user.refresh_token.clone())
        else {
            return Ok(());
        };

        self.loading = true;
        let result = self
            .token_request(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await;
        self.loading = false;

        let user = result?;
        debug!(user_id = %user.id, "refreshed session");
        self.store_session(&user)?;
        self.user = Some(user);
        Ok(())
    }

    /// Revokes the session remotely when possible and always forgets it
    /// locally.
    #[tracing::instrument(skip(self))]
    pub async fn sign_out(&mut self) -> StoreResult<()> {
        let Some(user) = self.user.take() else {
            return self.forget_session();
        };

        self.loading = true;
        let url = format!("{}/auth/v1/logout", self.config.base_url());
        let result = match self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&user.access_token)
            .send()
            .await
        {
            Ok(response) => check(response).await.map(|_| ()),
            Err(error) => Err(StoreError::from(error)),
        };
        self.loading = false;

        if let Err(error) = result {
            warn!(error = %error, "remote sign-out failed; clearing local session");
        }
        info!(user_id = %user.id, "signed out");
        self.forget_session()
    }

    /// Drops a session the store no longer accepts, without contacting the
    /// auth endpoint.
    pub fn discard(&mut self) -> StoreResult<()> {
        if let Some(user) = self.user.take() {
            info!(user_id = %user.id, "discarded rejected session");
        }
        self.forget_session()
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> StoreResult<AuthUser> {
        let url = format!("{}/auth/v1/token", self.config.base_url());
        let response = self
            .http
            .post(url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        Ok(token.into_user(Utc::now()))
    }

    fn store_session(&self, user: &AuthUser) -> StoreResult<()> {
        let dir = self
            .session_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|source| StoreError::io(dir, source))?;

        let serialized = serde_json::to_string_pretty(user).map_err(StoreError::Encode)?;
        let mut temp = NamedTempFile::new_in(dir).map_err(|source| StoreError::io(dir, source))?;
        temp.write_all(serialized.as_bytes())
            .map_err(|source| StoreError::io(&self.session_path, source))?;
        temp.persist(&self.session_path)
            .map_err(|err| StoreError::io(&self.session_path, err.error))?;
        Ok(())
    }

    fn forget_session(&self) -> StoreResult<()> {
        match fs::remove_file(&self.session_path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::io(&self.session_path, source)),
        }
    }
}
