//! Network utilities: the document fetcher and HTML parsing helpers.
//!
//! - **HTTP Client**: [`HttpClient`] performs GET requests with a per-request
//!   timeout, a default user agent and bounded exponential-backoff retry
//! - **Transport**: the [`Transport`] trait is the only place that touches
//!   the network; [`ReqwestTransport`] is the production implementation
//! - **Content Parsing**: see [`html`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use hondana::config::FetchConfig;
//! use hondana::net::{FetchOptions, HttpClient};
//!
//! # async fn example() -> hondana::Result<()> {
//! let client = HttpClient::new(&FetchConfig::default())?;
//! let options = FetchOptions::new().with_referer("https://example.com/");
//! let doc = client.fetch("https://example.com/page/1/", &options).await?;
//! println!("{} bytes from {}", doc.body.len(), doc.url);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::error::{Error, Result};

pub mod html;

/// A successfully fetched document.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    /// The URL that was requested
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// A single HTTP GET, without retry.
///
/// Implementations return `Err` for transport failures and for non-success
/// status codes alike; [`HttpClient`] treats both as a failed attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &HeaderMap, timeout: Duration)
    -> Result<FetchedDocument>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a client with connection pooling and gzip/brotli support.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<FetchedDocument> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
            });
        }

        Ok(FetchedDocument {
            url: url.to_string(),
            status: status.as_u16(),
            body: response.text().await?,
        })
    }
}

/// Per-call request options layered over the client defaults.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    headers: HeaderMap,
    max_attempts: Option<u32>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a header for this call. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<HeaderName>(),
            value.parse::<HeaderValue>(),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_referer(self, referer: &str) -> Self {
        self.with_header(REFERER.as_str(), referer)
    }

    /// Overrides the client's attempt budget for this call.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }
}

/// HTTP client with default headers, timeout and retry.
///
/// Attempt 1 fires immediately; attempt `n >= 2` first sleeps
/// `base_delay * 2^(n-1)`. When every attempt fails the last error is
/// returned wrapped in [`Error::Fetch`]. Calls share no retry state.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    headers: HeaderMap,
    timeout: Duration,
    base_delay: Duration,
    max_attempts: u32,
}

impl HttpClient {
    /// Creates a client over [`ReqwestTransport`] using the given settings.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self::with_transport(
            Arc::new(ReqwestTransport::new()?),
            config,
        ))
    }

    /// Creates a client over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: &FetchConfig) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, value);
        }

        Self {
            transport,
            headers,
            timeout: config.timeout(),
            base_delay: config.base_delay(),
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Fetches a document, retrying with exponential backoff.
    ///
    /// # Errors
    ///
    /// * [`Error::Fetch`] - every attempt failed; `cause` is the last failure
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument> {
        let max_attempts = options.max_attempts.unwrap_or(self.max_attempts);
        let mut headers = self.headers.clone();
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        let mut last_error = None;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(self.base_delay, attempt);
                info!(
                    url,
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    "Retrying fetch"
                );
                tokio::time::sleep(delay).await;
            }

            match self.transport.get(url, &headers, self.timeout).await {
                Ok(document) => return Ok(document),
                Err(e) => {
                    debug!(url, attempt, error = %e, "Fetch attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let cause = last_error.unwrap_or_else(|| Error::Other("no attempts made".to_string()));
        Err(Error::fetch(url, cause))
    }

    /// Fetches a document and returns only its body.
    pub async fn get_text(&self, url: &str, options: &FetchOptions) -> Result<String> {
        self.fetch(url, options).await.map(|doc| doc.body)
    }
}

/// Delay before `attempt` (1-based); zero for the first attempt.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    base.saturating_mul(2u32.saturating_pow(attempt - 1))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Serves fixed bodies per URL and records every request; unknown URLs answer 404.
    #[derive(Default)]
    pub(crate) struct MapTransport {
        pages: HashMap<String, String>,
        pub(crate) requests: Mutex<Vec<String>>,
    }

    impl MapTransport {
        pub(crate) fn new(pages: HashMap<String, String>) -> Self {
            Self {
                pages,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for MapTransport {
        async fn get(&self, url: &str, _: &HeaderMap, _: Duration) -> Result<FetchedDocument> {
            self.requests.lock().push(url.to_string());
            self.pages
                .get(url)
                .map(|body| FetchedDocument {
                    url: url.to_string(),
                    status: 200,
                    body: body.clone(),
                })
                .ok_or(Error::Status { status: 404 })
        }
    }

    /// A client over `transport` that never sleeps between attempts.
    pub(crate) fn instant_client(transport: Arc<MapTransport>, max_attempts: u32) -> HttpClient {
        let config = FetchConfig {
            base_delay_ms: 0,
            max_attempts,
            ..FetchConfig::default()
        };
        HttpClient::with_transport(transport, &config)
    }
}
