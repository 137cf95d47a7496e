//! Supabase Auth session provider.
//!
//! Knows who is signed in; the OAuth exchange that produced the access token
//! happens elsewhere.
//!
//! ### Endpoints
//!
//! - `GET {url}/auth/v1/user`: user behind an access token
//! - `POST {url}/auth/v1/logout`: revoke the session
//! - **Authentication**: `apikey` header with the project anon key, plus
//!   `Authorization: Bearer <access token>`.
//!
//! The session is kept locally once verified, so [`SessionProvider::current_session`]
//! never touches the network. [`SupabaseAuth::refresh_user`] re-checks it.

pub mod error;

pub use error::SupabaseError;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;

use nutz_core::identity::{Session, SessionEventKind, SessionEvents, SessionHub, SessionProvider};
use nutz_core::{AppConfig, Error};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "nutz-rooms/0.1";

/// Supabase client configuration.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub url: String,
    /// Project anon (public) key.
    pub anon_key: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
    pub user_agent: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Build from application config; None when Supabase is not configured.
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        let (url, key) = config.supabase()?;
        Some(Self { user_agent: config.user_agent.clone(), ..Self::new(url, key) })
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Session provider backed by Supabase Auth.
#[derive(Debug, Clone)]
pub struct SupabaseAuth {
    http: reqwest::Client,
    config: SupabaseConfig,
    hub: SessionHub,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Result<Self, SupabaseError> {
        if config.url.trim().is_empty() {
            return Err(SupabaseError::InvalidConfig("project url is empty".into()));
        }
        if config.anon_key.is_empty() {
            return Err(SupabaseError::InvalidConfig("anon key is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| SupabaseError::Network(Arc::new(e)))?;

        Ok(Self { http, config, hub: SessionHub::new() })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Look up the user behind `access_token`.
    ///
    /// Returns None when Supabase rejects the token (401/403).
    pub async fn fetch_user(&self, access_token: &str) -> Result<Option<Session>, SupabaseError> {
        let response = self
            .http
            .get(self.endpoint("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Supabase user lookup status: {}", status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SupabaseError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let user: SupabaseUser = serde_json::from_slice(&bytes).map_err(|e| SupabaseError::Parse(e.to_string()))?;

        Ok(Some(Session { user_id: user.id, email: user.email, access_token: Some(access_token.to_string()) }))
    }

    /// Verify `access_token` and make its user the current session.
    pub async fn sign_in_with_token(&self, access_token: &str) -> Result<Session, SupabaseError> {
        let session = self.fetch_user(access_token).await?.ok_or(SupabaseError::InvalidToken)?;
        tracing::info!(user_id = %session.user_id, "signed in");
        self.hub.sign_in(session.clone());
        Ok(session)
    }

    /// Re-check the current session against Supabase.
    ///
    /// A rejected token signs the visitor out locally.
    pub async fn refresh_user(&self) -> Result<Option<Session>, SupabaseError> {
        let Some(token) = self.hub.session().and_then(|s| s.access_token) else {
            return Ok(None);
        };

        match self.fetch_user(&token).await? {
            Some(session) => {
                self.hub.publish(SessionEventKind::UserUpdated, Some(session.clone()));
                Ok(Some(session))
            }
            None => {
                tracing::info!("access token no longer valid; signing out locally");
                self.hub.publish(SessionEventKind::SignedOut, None);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SessionProvider for SupabaseAuth {
    async fn current_session(&self) -> Result<Option<Session>, Error> {
        Ok(self.hub.session())
    }

    fn subscribe(&self) -> SessionEvents {
        self.hub.subscribe()
    }

    /// Signs out locally first; a failed revoke call is reported afterwards.
    async fn sign_out(&self) -> Result<(), Error> {
        let token = self.hub.session().and_then(|s| s.access_token);
        self.hub.publish(SessionEventKind::SignedOut, None);

        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.endpoint("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(SupabaseError::from)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            tracing::warn!("Supabase logout returned {}", status);
            Err(SupabaseError::HttpError { status: status.as_u16() }.into())
        }
    }
}
