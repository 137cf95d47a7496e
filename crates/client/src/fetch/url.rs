//! URL resolution and matching for the offline cache.

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target against the worker origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Paths starting with `/` resolve against `origin`
/// 3. Default scheme to https:// if missing on absolute targets
/// 4. Only http and https are accepted
/// 5. Remove fragment (#...); the query string is kept as-is
pub fn resolve(origin: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else if trimmed.contains("://") {
        url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        url::Url::parse(&format!("https://{}", trimmed.trim_start_matches('/')))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Same scheme, host and port.
pub fn same_origin(a: &url::Url, b: &url::Url) -> bool {
    a.origin() == b.origin()
}

/// Whether `path` falls under `prefix`.
///
/// The prefix matches as a whole path segment: `/api` covers `/api` and
/// `/api/chat` but not `/apiary`. A trailing slash on the prefix is ignored.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> url::Url {
        url::Url::parse("https://rooms.nutz.app").unwrap()
    }

    #[test]
    fn test_resolve_path_against_origin() {
        let url = resolve(&origin(), "/manifest.json").unwrap();
        assert_eq!(url.as_str(), "https://rooms.nutz.app/manifest.json");
    }

    #[test]
    fn test_resolve_default_scheme() {
        let url = resolve(&origin(), "cdn.example.com/app.js").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve(&origin(), "https://ROOMS.NUTZ.APP/").unwrap();
        assert_eq!(url.host_str(), Some("rooms.nutz.app"));
    }

    #[test]
    fn test_resolve_remove_fragment_keep_query() {
        let url = resolve(&origin(), "/room?persona=kagan#top").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("persona=kagan"));
    }

    #[test]
    fn test_resolve_protocol_relative() {
        let url = resolve(&origin(), "//cdn.example.com/a.js").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&origin(), "file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), ""), Err(UrlError::Empty)));
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin() {
        let a = url::Url::parse("https://rooms.nutz.app/a").unwrap();
        assert!(same_origin(&a, &url::Url::parse("https://rooms.nutz.app/b?x=1").unwrap()));
        assert!(!same_origin(&a, &url::Url::parse("http://rooms.nutz.app/a").unwrap()));
        assert!(!same_origin(&a, &url::Url::parse("https://rooms.nutz.app:8443/a").unwrap()));
        assert!(!same_origin(&a, &url::Url::parse("https://nutz.vercel.app/a").unwrap()));
    }

    #[test]
    fn test_has_path_prefix() {
        assert!(has_path_prefix("/api", "/api"));
        assert!(has_path_prefix("/api/", "/api"));
        assert!(has_path_prefix("/api/chat", "/api"));
        assert!(has_path_prefix("/api/chat", "/api/"));
        assert!(!has_path_prefix("/apiary", "/api"));
        assert!(!has_path_prefix("/", "/api"));
        assert!(!has_path_prefix("/rooms/api", "/api"));
    }
}
