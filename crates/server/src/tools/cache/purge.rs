//! cache_purge tool implementation.
//!
//! Deletes every store that does not belong to the current generation, the
//! same sweep a worker runs when it activates.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use nutz_client::WorkerHost;
use nutz_core::Error;

use crate::tools::json_result;

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Generation that was kept.
    pub kept: String,
    /// Stores deleted.
    pub deleted: Vec<String>,
    /// Stores whose deletion failed.
    pub failed: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(host: &WorkerHost) -> Result<CallToolResult, McpError> {
    let manager = host
        .active()
        .ok_or(Error::InvalidState { operation: "purge", state: "no active worker".into() })?;

    let outcome = manager.purge_stale_stores().await?;
    tracing::info!(deleted = outcome.deleted.len(), failed = outcome.failed.len(), "purged stale cache stores");

    let output =
        CachePurgeOutput { kept: manager.config().cache_name.clone(), deleted: outcome.deleted, failed: outcome.failed };

    json_result(&output)
}
