//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NUTZ_*)
//! 2. TOML config file (if NUTZ_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The cache generation and the anonymous-id storage key live here rather
//! than in constants so a deploy (or a test) can pick its own.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NUTZ_*)
/// 2. TOML config file (if NUTZ_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the offline cache serves, e.g. `https://rooms.nutz.app`.
    ///
    /// Set via NUTZ_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Name of the live cache store. Bump on deploy to drop every older store.
    ///
    /// Set via NUTZ_CACHE_GENERATION environment variable.
    #[serde(default = "default_cache_generation")]
    pub cache_generation: String,

    /// Paths fetched and cached at install time.
    #[serde(default = "default_core_assets")]
    pub core_assets: Vec<String>,

    /// Path prefix of routes that are never cached.
    ///
    /// Set via NUTZ_API_PREFIX environment variable.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path to SQLite database holding cache stores and local storage.
    ///
    /// Set via NUTZ_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Local storage key for the anonymous visitor identifier.
    ///
    /// Set via NUTZ_ANON_ID_KEY environment variable.
    #[serde(default = "default_anon_id_key")]
    pub anon_id_key: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Supabase project URL. Enables authenticated identities when set.
    #[serde(default)]
    pub supabase_url: Option<String>,

    /// Supabase anon (public) API key.
    #[serde(default)]
    pub supabase_anon_key: Option<String>,

    /// Access token of an already signed-in user.
    #[serde(default)]
    pub supabase_access_token: Option<String>,
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_generation() -> String {
    "kagan-v2".into()
}

fn default_core_assets() -> Vec<String> {
    vec!["/".into(), "/manifest.json".into(), "/icon-192.png".into(), "/icon-512.png".into()]
}

fn default_api_prefix() -> String {
    "/api".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./nutz-rooms.sqlite")
}

fn default_anon_id_key() -> String {
    "nutz_anonymous_user_id".into()
}

fn default_user_agent() -> String {
    "nutz-rooms/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_generation: default_cache_generation(),
            core_assets: default_core_assets(),
            api_prefix: default_api_prefix(),
            db_path: default_db_path(),
            anon_id_key: default_anon_id_key(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            supabase_url: None,
            supabase_anon_key: None,
            supabase_access_token: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("NUTZ_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::from_figment(figment.merge(
            Env::prefixed("NUTZ_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Supabase URL and anon key, when both are configured.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_anon_key.as_deref()) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        }
    }
}
