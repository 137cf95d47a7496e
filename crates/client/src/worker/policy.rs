//! Which requests the fetch interceptor may touch.

use reqwest::Method;
use serde::Serialize;

use crate::fetch::{Request, has_path_prefix, same_origin};

/// Why a request was left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassReason {
    NonGet,
    /// API responses must always be live, even when that means failing.
    Api,
    CrossOrigin,
    /// The worker does not control the page yet (or any more).
    NotActive,
}

impl PassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassReason::NonGet => "non_get",
            PassReason::Api => "api",
            PassReason::CrossOrigin => "cross_origin",
            PassReason::NotActive => "not_active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PassThrough(PassReason),
    Intercept,
}

/// Evaluate the interception rules in order; the first match wins.
pub fn classify(request: &Request, origin: &url::Url, api_prefix: &str) -> Route {
    if request.method != Method::GET {
        return Route::PassThrough(PassReason::NonGet);
    }
    if has_path_prefix(request.url.path(), api_prefix) {
        return Route::PassThrough(PassReason::Api);
    }
    if !same_origin(&request.url, origin) {
        return Route::PassThrough(PassReason::CrossOrigin);
    }
    Route::Intercept
}
