//! identity_resolve and identity_clear tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use nutz_core::{Identity, IdentityResolver};

use super::json_result;

/// Output from the identity_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClearOutput {
    /// Local storage key that was removed.
    pub cleared_key: String,
    /// Identity the visitor resolves to afterwards.
    pub identity: Identity,
}

/// Implementation of the identity_resolve tool.
pub async fn resolve_impl(resolver: &IdentityResolver) -> Result<CallToolResult, McpError> {
    let identity = resolver.resolve().await?;
    tracing::debug!(user_id = %identity.user_id, anonymous = identity.is_anonymous, "identity resolved");
    json_result(&identity)
}

/// Implementation of the identity_clear tool.
///
/// A signed-in visitor keeps their account id; an anonymous one gets a fresh
/// identifier on the follow-up resolve.
pub async fn clear_impl(resolver: &IdentityResolver) -> Result<CallToolResult, McpError> {
    resolver.clear_anonymous().await?;
    let identity = resolver.resolve().await?;

    json_result(&IdentityClearOutput { cleared_key: resolver.storage_key().to_string(), identity })
}
