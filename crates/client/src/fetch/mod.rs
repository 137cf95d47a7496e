//! Network boundary of the offline cache.
//!
//! ### Contract
//! - [`Network::fetch`] returns `Ok` for every response that arrived,
//!   whatever its status; `Err` means no response (DNS, connect, timeout,
//!   body too large)
//! - Max redirects: 5
//! - Max body bytes: 10MB (configurable)
//!
//! [`HttpNetwork`] is the reqwest implementation used outside tests.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use reqwest::{Method, StatusCode};
pub use url::{UrlError, has_path_prefix, resolve, same_origin};

use nutz_core::{AppConfig, CachedResponse, Error};

/// A request as seen by the fetch interceptor.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: ::url::Url,
    pub headers: header::HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: ::url::Url) -> Self {
        Self { method, url, headers: header::HeaderMap::new() }
    }

    pub fn get(url: ::url::Url) -> Self {
        Self::new(Method::GET, url)
    }
}

/// A response delivered to the page.
#[derive(Debug, Clone)]
pub struct Response {
    /// The final URL after redirects
    pub url: ::url::Url,
    pub status: StatusCode,
    pub headers: header::HeaderMap,
    pub bytes: Bytes,
}

impl Response {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Snapshot of this response for storage under `request`.
    ///
    /// Header values that are not valid UTF-8 are not kept.
    pub fn to_cached(&self, request: &Request) -> CachedResponse {
        CachedResponse {
            method: request.method.as_str().to_string(),
            url: request.url.as_str().to_string(),
            final_url: self.url.as_str().to_string(),
            status: self.status.as_u16(),
            headers: self
                .headers
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
                .collect(),
            body: self.bytes.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored entry.
    pub fn from_cached(cached: CachedResponse) -> Result<Self, Error> {
        let url = ::url::Url::parse(&cached.final_url).map_err(|e| Error::CorruptEntry(format!("url: {e}")))?;
        let status = StatusCode::from_u16(cached.status).map_err(|e| Error::CorruptEntry(format!("status: {e}")))?;

        let mut headers = header::HeaderMap::new();
        for (name, value) in &cached.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header name: {e}")))?;
            let value =
                header::HeaderValue::from_str(value).map_err(|e| Error::CorruptEntry(format!("header value: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self { url, status, headers, bytes: Bytes::from(cached.body) })
    }
}

/// Issues network requests on behalf of the cache.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "nutz-rooms/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "nutz-rooms/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Network`].
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Network(format!("timed out: {}", request.url))
                } else {
                    Error::Network(format!("{}: {}", request.url, e))
                }
            })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::Network(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::Network(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        Ok(Response { url, status, headers, bytes })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "nutz-rooms/0.1");
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_cached_round_trip_keeps_headers() {
        let request = Request::get(::url::Url::parse("https://rooms.nutz.app/").unwrap());
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/html"));
        let response = Response {
            url: request.url.clone(),
            status: StatusCode::OK,
            headers,
            bytes: Bytes::from_static(b"<html></html>"),
        };

        let cached = response.to_cached(&request);
        assert_eq!(cached.method, "GET");
        assert_eq!(cached.status, 200);

        let rebuilt = Response::from_cached(cached).unwrap();
        assert_eq!(rebuilt.content_type(), Some("text/html"));
        assert_eq!(rebuilt.bytes, response.bytes);
    }

    #[test]
    fn test_cached_round_trip_keeps_final_url() {
        let request = Request::get(::url::Url::parse("https://rooms.nutz.app/old-room").unwrap());
        let mut headers = header::HeaderMap::new();
        headers.insert("x-room", header::HeaderValue::from_static("kagan"));
        headers.insert("x-raw", header::HeaderValue::from_bytes(b"caf\xe9").unwrap());
        let response = Response {
            url: ::url::Url::parse("https://rooms.nutz.app/rooms/kagan").unwrap(),
            status: StatusCode::OK,
            headers,
            bytes: Bytes::from_static(b"room"),
        };

        let cached = response.to_cached(&request);
        assert_eq!(cached.url, "https://rooms.nutz.app/old-room");
        assert_eq!(cached.final_url, "https://rooms.nutz.app/rooms/kagan");
        assert_eq!(cached.headers, vec![("x-room".to_string(), "kagan".to_string())]);

        let rebuilt = Response::from_cached(cached).unwrap();
        assert_eq!(rebuilt.url.as_str(), "https://rooms.nutz.app/rooms/kagan");
    }

    #[tokio::test]
    async fn test_http_network_returns_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let network = HttpNetwork::new(FetchConfig::default()).unwrap();
        let url = ::url::Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let response = network.fetch(&Request::get(url)).await.unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(&response.bytes[..], b"not found");
    }

    #[tokio::test]
    async fn test_http_network_rejects_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 64]))
            .mount(&server)
            .await;

        let network = HttpNetwork::new(FetchConfig { max_bytes: 16, ..Default::default() }).unwrap();
        let url = ::url::Url::parse(&format!("{}/big", server.uri())).unwrap();
        let result = network.fetch(&Request::get(url)).await;

        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_http_network_connection_refused_is_error() {
        let network = HttpNetwork::new(FetchConfig::default()).unwrap();
        let url = ::url::Url::parse("http://127.0.0.1:9/").unwrap();
        assert!(matches!(network.fetch(&Request::get(url)).await, Err(Error::Network(_))));
    }
}
