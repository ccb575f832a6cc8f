//! HTTP fetch executor
//!
//! This module performs every request the crawler makes:
//! - Building the HTTP client with a proper user agent string
//! - Passing each attempt through the source's rate limiter
//! - Retrying HTTP 429 answers after a fixed pause
//! - Classifying everything else as a body, an HTTP error or a transport error

use crate::config::UserAgentConfig;
use crate::state::RateLimiter;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Expected content of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchKind {
    /// An HTML page
    Document,
    /// A JSON REST payload
    Json,
}

impl FetchKind {
    /// Value of the `Accept` header sent for this kind
    pub fn accept(&self) -> &'static str {
        match self {
            Self::Document => "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A request that never produced a complete response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            Self::Body(error.to_string())
        } else {
            Self::Other(error.to_string())
        }
    }
}

/// Performs a single GET request
///
/// Implementations do not retry and do not throttle; both happen in
/// [`Fetcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        kind: FetchKind,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a transport whose client identifies itself with `config`
    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        kind: FetchKind,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, kind.accept())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

/// Builds an HTTP client with proper configuration
///
/// The per-request timeout comes from the source configuration, so only
/// the connect timeout is set here.
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use filmlist_crawler::config::UserAgentConfig;
/// use filmlist_crawler::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "FilmlistCrawler".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classified result of fetching one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 2xx; the raw body for the caller to parse
    Body(String),

    /// Terminal HTTP error (anything but 2xx and 429)
    HttpError(u16),

    /// The request did not complete
    Transport(TransportError),
}

/// Rate-limited fetch executor of one source
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return the body |
/// | HTTP 429 | Sleep the retry backoff, retry without limit |
/// | Other HTTP status | Return `HttpError` |
/// | Timeout, connection or body failure | Return `Transport` |
///
/// Every attempt, retries included, acquires one permit from the limiter.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    socket_timeout: Duration,
    retry_backoff: Duration,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        socket_timeout: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            transport,
            limiter,
            socket_timeout,
            retry_backoff,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches `url`, retrying while the server answers HTTP 429
    pub async fn fetch(&self, url: &Url, kind: FetchKind) -> FetchOutcome {
        let mut rate_limited = 0u32;

        loop {
            self.limiter.acquire().await;

            let response = match self.transport.get(url, kind, self.socket_timeout).await {
                Ok(response) => response,
                Err(e) => return FetchOutcome::Transport(e),
            };

            match StatusCode::from_u16(response.status) {
                Ok(status) if status.is_success() => {
                    if rate_limited > 0 {
                        tracing::debug!("{} succeeded after {} rate-limited attempts", url, rate_limited);
                    }
                    return FetchOutcome::Body(response.body);
                }
                Ok(StatusCode::TOO_MANY_REQUESTS) => {
                    rate_limited += 1;
                    tracing::debug!(
                        "{} answered 429, retrying in {:?} (attempt {})",
                        url,
                        self.retry_backoff,
                        rate_limited
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                _ => return FetchOutcome::HttpError(response.status),
            }
        }
    }
}
