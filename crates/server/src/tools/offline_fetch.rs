//! offline_fetch tool implementation.
//!
//! Routes a request through the active worker the way a page load would,
//! so the caller sees what the visitor would get online or offline.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use nutz_client::fetch::{Method, resolve};
use nutz_client::{Request, WorkerHost};
use nutz_core::Error;

use super::json_result;

/// Input parameters for the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// URL or origin-relative path (`/rooms/kagan`) to request.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET bypasses the cache.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub status: u16,
    /// Where the response came from: "network", "cache" or "passthrough".
    pub source: String,
    /// Why the worker did not intercept, for pass-through responses.
    pub pass_reason: Option<String>,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Response body, decoded as UTF-8 with replacement.
    pub body: String,
    pub bytes: usize,
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl(
    host: &WorkerHost, origin: &url::Url, params: OfflineFetchParams,
) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;

    let served = host.fetch(&Request::new(method, url.clone())).await?;

    let output = OfflineFetchOutput {
        url: url.to_string(),
        status: served.response.status.as_u16(),
        source: served.source.as_str().to_string(),
        pass_reason: served.pass_reason.map(|r| r.as_str().to_string()),
        content_type: served.response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&served.response.bytes).into_owned(),
        bytes: served.response.bytes.len(),
    };

    json_result(&output)
}
