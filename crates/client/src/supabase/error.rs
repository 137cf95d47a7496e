//! Supabase Auth client error types.

use std::sync::Arc;

/// Errors from the Supabase Auth client.
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    /// Missing project URL or anon key.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The access token does not belong to a live session.
    #[error("access token rejected")]
    InvalidToken,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SupabaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { SupabaseError::Timeout } else { SupabaseError::Network(Arc::new(err)) }
    }
}

impl From<SupabaseError> for nutz_core::Error {
    fn from(err: SupabaseError) -> Self {
        nutz_core::Error::Session(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(SupabaseError::HttpError { status: 500 }.to_string(), "HTTP error: 500");
        assert!(SupabaseError::InvalidConfig("url".into()).to_string().contains("url"));
    }

    #[test]
    fn test_into_core_error() {
        let err: nutz_core::Error = SupabaseError::InvalidToken.into();
        assert!(matches!(err, nutz_core::Error::Session(_)));
        assert!(err.to_string().starts_with("SESSION_ERROR"));
    }
}
