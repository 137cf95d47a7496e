//! cache_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use nutz_client::WorkerHost;
use nutz_core::CacheDb;

use crate::tools::json_result;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    /// Configured cache generation.
    pub generation: String,
    /// State of the active worker; None when no worker took control.
    pub worker_state: Option<String>,
    /// Generation of the active worker, if any.
    pub active_generation: Option<String>,
    /// Every store present, oldest first.
    pub stores: Vec<String>,
    /// Entries in the configured generation's store.
    pub entries: u64,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(host: &WorkerHost, cache: &CacheDb, generation: &str) -> Result<CallToolResult, McpError> {
    let active = host.active();
    let stores = cache.store_names().await?;
    let entries = if stores.iter().any(|s| s == generation) { cache.count_entries(generation).await? } else { 0 };

    let output = CacheStatusOutput {
        generation: generation.to_string(),
        worker_state: active.as_ref().map(|m| m.state().to_string()),
        active_generation: active.as_ref().map(|m| m.config().cache_name.clone()),
        stores,
        entries,
    };

    json_result(&output)
}
