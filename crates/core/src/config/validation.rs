//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL with a host
    /// - `cache_generation`, `anon_id_key` or `user_agent` is empty
    /// - `api_prefix` or a core asset path does not start with `/`
    /// - `api_prefix` is `/` alone, which would exclude every path from caching
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    ///
    /// Returns `ConfigError::Missing` if only one of `supabase_url` and
    /// `supabase_anon_key` is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = url::Url::parse(&self.origin).map_err(|e| invalid("origin", e.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
            return Err(invalid("origin", "must be an http(s) URL with a host"));
        }

        if self.cache_generation.trim().is_empty() {
            return Err(invalid("cache_generation", "must not be empty"));
        }

        if !self.api_prefix.starts_with('/') {
            return Err(invalid("api_prefix", "must start with '/'"));
        }
        if self.api_prefix.trim_end_matches('/').is_empty() {
            return Err(invalid("api_prefix", "must name a path below '/'"));
        }

        if let Some(asset) = self.core_assets.iter().find(|a| !a.starts_with('/')) {
            return Err(invalid("core_assets", format!("'{asset}' must start with '/'")));
        }

        if self.anon_id_key.is_empty() {
            return Err(invalid("anon_id_key", "must not be empty"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(_), None) => {
                return Err(ConfigError::Missing {
                    field: "supabase_anon_key".into(),
                    hint: "Set NUTZ_SUPABASE_ANON_KEY alongside NUTZ_SUPABASE_URL".into(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    field: "supabase_url".into(),
                    hint: "Set NUTZ_SUPABASE_URL alongside NUTZ_SUPABASE_ANON_KEY".into(),
                });
            }
            _ => {}
        }

        if self.supabase_access_token.is_some() && self.supabase_url.is_none() {
            tracing::warn!("supabase_access_token is set without supabase_url; visitors resolve anonymously");
        }

        Ok(())
    }
}
