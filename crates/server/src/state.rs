//! Shared server state, built once at boot.

use std::sync::Arc;

use nutz_client::{
    FetchConfig, HttpNetwork, Network, OfflineCacheManager, SupabaseAuth, SupabaseConfig, WorkerConfig, WorkerHost,
};
use nutz_core::identity::{LocalStore, SessionHub, SessionProvider};
use nutz_core::{AppConfig, CacheDb, Error, IdentityResolver};

/// Everything the tools need, shared behind an `Arc`.
pub struct AppState {
    pub config: AppConfig,
    pub origin: url::Url,
    pub cache: CacheDb,
    pub host: WorkerHost,
    pub resolver: IdentityResolver,
}

impl AppState {
    /// Open the database named in `config` and boot the worker and resolver.
    pub async fn build(config: AppConfig) -> Result<Self, Error> {
        let cache = CacheDb::open(&config.db_path).await?;
        Self::with_cache(config, cache).await
    }

    /// Boot against an already opened database.
    ///
    /// A failed worker install is logged and the server carries on without
    /// an active worker; requests then go straight to the network.
    pub async fn with_cache(config: AppConfig, cache: CacheDb) -> Result<Self, Error> {
        let worker_config = WorkerConfig::try_from(&config)?;
        let origin = worker_config.origin.clone();
        let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(FetchConfig::from(&config))?);

        let host = WorkerHost::new(network.clone());
        match host.deploy(OfflineCacheManager::new(worker_config, cache.clone(), network)).await {
            Ok(outcome) => tracing::info!(
                cache = %outcome.install.cache_name,
                cached = outcome.install.cached,
                deleted = outcome.activate.as_ref().map_or(0, |a| a.deleted.len()),
                "offline cache active"
            ),
            Err(err) => tracing::warn!(error = %err, "offline cache not installed; serving from network"),
        }

        let sessions = session_provider(&config).await;
        let store: Arc<dyn LocalStore> = Arc::new(cache.clone());
        let resolver = IdentityResolver::new(sessions, Some(store), config.anon_id_key.clone());

        Ok(Self { config, origin, cache, host, resolver })
    }
}

/// Supabase when configured, otherwise an empty in-process hub.
async fn session_provider(config: &AppConfig) -> Arc<dyn SessionProvider> {
    let Some(supabase) = SupabaseConfig::from_app_config(config) else {
        tracing::debug!("Supabase not configured; visitors stay anonymous");
        return Arc::new(SessionHub::new());
    };

    let auth = match SupabaseAuth::new(supabase) {
        Ok(auth) => auth,
        Err(err) => {
            tracing::warn!(error = %err, "Supabase client unavailable; visitors stay anonymous");
            return Arc::new(SessionHub::new());
        }
    };

    if let Some(token) = config.supabase_access_token.as_deref()
        && let Err(err) = auth.sign_in_with_token(token).await
    {
        tracing::warn!(error = %err, "access token rejected; starting signed out");
    }

    Arc::new(auth)
}
