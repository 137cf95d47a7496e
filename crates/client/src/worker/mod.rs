//! Offline cache manager.
//!
//! Network-first with cache fallback for same-origin GETs, generation-based
//! invalidation of old stores, and a fixed set of core assets cached at
//! install time so the app shell opens offline.
//!
//! The manager exposes the three lifecycle hooks as plain methods
//! ([`OfflineCacheManager::on_install`], [`OfflineCacheManager::on_activate`],
//! [`OfflineCacheManager::on_fetch`]); [`host::WorkerHost`] wires them to
//! lifecycle events.

pub mod host;
pub mod policy;
pub mod state;

use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use parking_lot::Mutex;
use serde::Serialize;

use nutz_core::{AppConfig, CacheDb, Error};

use crate::fetch::{Network, Request, Response, resolve};

pub use host::{DeployOutcome, EventResult, Served, WorkerEvent, WorkerHost};
pub use policy::{PassReason, Route, classify};
pub use state::WorkerState;

/// What the manager is built from. Nothing here is global, so several
/// generations can be exercised side by side.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: url::Url,
    /// Current cache generation; names the live store.
    pub cache_name: String,
    pub core_assets: Vec<String>,
    pub api_prefix: String,
}

impl WorkerConfig {
    pub fn new(origin: url::Url, cache_name: impl Into<String>) -> Self {
        Self { origin, cache_name: cache_name.into(), core_assets: Vec::new(), api_prefix: "/api".to_string() }
    }

    pub fn with_core_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }
}

impl TryFrom<&AppConfig> for WorkerConfig {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        let origin = url::Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        Ok(Self::new(origin, config.cache_generation.clone())
            .with_core_assets(config.core_assets.iter().cloned())
            .with_api_prefix(config.api_prefix.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub cache_name: String,
    pub cached: usize,
    /// Take control immediately instead of waiting for old clients to close.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateOutcome {
    pub deleted: Vec<String>,
    /// Stale stores whose deletion failed; retried on the next activation.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    #[serde(rename = "passthrough")]
    PassThrough,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::PassThrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone)]
pub enum FetchDecision {
    /// Not intercepted; the host performs the request itself.
    PassThrough(PassReason),
    Respond { response: Response, source: ResponseSource },
}

/// One worker version: its cache generation, its lifecycle and its fetch policy.
pub struct OfflineCacheManager {
    config: WorkerConfig,
    cache: CacheDb,
    network: Arc<dyn Network>,
    state: Mutex<WorkerState>,
}

impl OfflineCacheManager {
    pub fn new(config: WorkerConfig, cache: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { config, cache, network, state: Mutex::new(WorkerState::Installing) }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Cache every core asset into the current generation's store.
    ///
    /// All assets are fetched before any is stored; one failure rejects the
    /// whole install and this worker version never activates.
    pub async fn on_install(&self) -> Result<InstallOutcome, Error> {
        self.expect_state("install", WorkerState::Installing)?;

        match self.precache().await {
            Ok(cached) => {
                self.set_state(WorkerState::Activating);
                tracing::info!(cache = %self.config.cache_name, cached, "worker installed");
                Ok(InstallOutcome { cache_name: self.config.cache_name.clone(), cached, skip_waiting: true })
            }
            Err(err) => {
                self.set_state(WorkerState::Rejected);
                tracing::warn!(cache = %self.config.cache_name, error = %err, "worker install rejected");
                Err(err)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        self.cache.open_store(&self.config.cache_name).await?;

        let fetches = self.config.core_assets.iter().map(|asset| async move {
            let url = resolve(&self.config.origin, asset)
                .map_err(|e| Error::InstallFailed { asset: asset.clone(), reason: e.to_string() })?;
            let request = Request::get(url);
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed { asset: asset.clone(), reason: e.to_string() })?;
            if !response.status.is_success() {
                return Err(Error::InstallFailed {
                    asset: asset.clone(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }
            Ok((asset, request, response))
        });
        let fetched = try_join_all(fetches).await?;

        for (asset, request, response) in &fetched {
            self.cache
                .put_response(&self.config.cache_name, &response.to_cached(request))
                .await
                .map_err(|e| Error::InstallFailed { asset: (*asset).clone(), reason: e.to_string() })?;
        }

        Ok(fetched.len())
    }

    /// Drop every store that is not the current generation, then take control.
    pub async fn on_activate(&self) -> Result<ActivateOutcome, Error> {
        self.expect_state("activate", WorkerState::Activating)?;

        let outcome = self.purge_stale_stores().await?;
        self.set_state(WorkerState::Active);
        tracing::info!(
            cache = %self.config.cache_name,
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "worker activated"
        );

        Ok(outcome)
    }

    /// Delete all stores whose name differs from the current generation.
    ///
    /// Deletions run concurrently; one failing does not stop the others.
    pub async fn purge_stale_stores(&self) -> Result<ActivateOutcome, Error> {
        let stale: Vec<String> = self
            .cache
            .store_names()
            .await?
            .into_iter()
            .filter(|name| name != &self.config.cache_name)
            .collect();

        let results = join_all(stale.iter().map(|name| self.cache.delete_store(name))).await;

        let mut outcome = ActivateOutcome::default();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => outcome.deleted.push(name),
                Err(err) => {
                    tracing::warn!(store = %name, error = %err, "failed to delete stale cache store");
                    outcome.failed.push(name);
                }
            }
        }

        Ok(outcome)
    }

    /// Network first, cache on network failure, for same-origin non-API GETs.
    ///
    /// # Errors
    ///
    /// The network error, when the network failed and nothing is cached for
    /// the request.
    pub async fn on_fetch(&self, request: &Request) -> Result<FetchDecision, Error> {
        if let Route::PassThrough(reason) = classify(request, &self.config.origin, &self.config.api_prefix) {
            tracing::debug!(url = %request.url, ?reason, "fetch passed through");
            return Ok(FetchDecision::PassThrough(reason));
        }

        if self.state() != WorkerState::Active {
            return Ok(FetchDecision::PassThrough(PassReason::NotActive));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status.is_success() {
                    self.store(request, &response).await;
                } else {
                    tracing::debug!(url = %request.url, status = response.status.as_u16(), "not caching error response");
                }
                Ok(FetchDecision::Respond { response, source: ResponseSource::Network })
            }
            Err(err) => {
                let cached = self
                    .cache
                    .match_response(&self.config.cache_name, request.method.as_str(), request.url.as_str())
                    .await;
                match cached {
                    Ok(Some(cached)) => {
                        tracing::debug!(url = %request.url, "network failed, serving from cache");
                        let response = Response::from_cached(cached)?;
                        Ok(FetchDecision::Respond { response, source: ResponseSource::Cache })
                    }
                    Ok(None) => Err(err),
                    Err(lookup) => {
                        tracing::warn!(url = %request.url, error = %lookup, "cache lookup failed");
                        Err(err)
                    }
                }
            }
        }
    }

    async fn store(&self, request: &Request, response: &Response) {
        if let Err(err) = self
            .cache
            .put_response(&self.config.cache_name, &response.to_cached(request))
            .await
        {
            tracing::warn!(url = %request.url, error = %err, "failed to cache response");
        }
    }

    fn expect_state(&self, operation: &'static str, expected: WorkerState) -> Result<(), Error> {
        let current = self.state();
        if current == expected {
            Ok(())
        } else {
            Err(Error::InvalidState { operation, state: current.to_string() })
        }
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
    }
}
