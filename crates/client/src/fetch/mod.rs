//! HTTP network seam for the caching agent.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! The [`Network`] trait is the seam the resolution strategy, the seeder,
//! and the background hooks talk through; [`FetchClient`] is its reqwest
//! implementation. Unlike a plain API client, `get` returns non-success
//! responses to the caller instead of mapping them to errors - the
//! resolution strategy must hand a 404 back unmodified.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize};

use stowage_core::Error;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "stowage/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "stowage/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Build a response that never touched the wire.
    ///
    /// Used by test doubles standing in for the network.
    pub fn synthetic(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.clone(),
            final_url: url,
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            content_type: None,
            bytes: body.into(),
            headers: header::HeaderMap::new(),
            fetch_ms: 0,
        }
    }

    /// Headers flattened into owned pairs, the shape the artifact store keeps.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }
}

/// The network boundary.
///
/// The agent never talks to reqwest directly; everything network-shaped
/// goes through this trait so tests can count and fail requests.
#[async_trait]
pub trait Network: Send + Sync {
    /// Issue a GET. Non-success statuses are responses, not errors;
    /// `Err` means no response was produced at all.
    async fn get(&self, url: &Url) -> Result<FetchResponse, Error>;

    /// POST a JSON body.
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<FetchResponse, Error>;
}

/// HTTP network client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
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
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn read_response(&self, url: &Url, response: reqwest::Response, start: Instant) -> Result<FetchResponse, Error> {
        let status = response.status();

        let content_length = response.content_length();
        if let Some(len) = content_length
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(FetchResponse { url: url.clone(), final_url, status, content_type, bytes, headers, fetch_ms })
    }

    fn map_send_error(err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout(err.to_string())
        } else {
            Error::Http(format!("network error: {}", err))
        }
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn get(&self, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(Self::map_send_error)?;

        self.read_response(url, response, start).await
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .post(url.as_str())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        self.read_response(url, response, start).await
    }
}
