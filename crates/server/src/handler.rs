//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::{cache, identity, offline_fetch};
use crate::tools::offline_fetch::OfflineFetchParams;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for nutz-rooms.
#[derive(Clone)]
pub struct NutzRoomsServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl NutzRoomsServer {
    /// Create a new server handler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    #[tool(
        description = "Resolve the current visitor. Returns { userId, isAnonymous }: the signed-in user id, or a persisted anonymous id."
    )]
    async fn identity_resolve(&self) -> Result<CallToolResult, McpError> {
        identity::resolve_impl(&self.state.resolver).await
    }

    #[tool(description = "Forget the stored anonymous id. The next resolve issues a fresh one unless a user is signed in.")]
    async fn identity_clear(&self) -> Result<CallToolResult, McpError> {
        identity::clear_impl(&self.state.resolver).await
    }

    /// Request a URL through the offline cache.
    ///
    /// Same-origin GETs are network-first with cache fallback; API routes,
    /// other methods and other origins go straight to the network.
    #[tool(
        description = "Fetch a URL or origin-relative path through the offline cache. Returns status, source (network/cache/passthrough), content type and body."
    )]
    async fn offline_fetch(&self, params: Parameters<OfflineFetchParams>) -> Result<CallToolResult, McpError> {
        offline_fetch::fetch_impl(&self.state.host, &self.state.origin, params.0).await
    }

    #[tool(description = "Show the cache generation, active worker state, stores present and entry count.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        cache::status_impl(&self.state.host, &self.state.cache, &self.state.config.cache_generation).await
    }

    #[tool(description = "Delete every cache store that does not belong to the current generation.")]
    async fn cache_purge(&self) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.state.host).await
    }
}

impl ServerHandler for NutzRoomsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "nutz-rooms".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
