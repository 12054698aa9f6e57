//! The transport capability the pipeline fetches through.
//!
//! [`Transport`] is the seam between pipeline logic and the network:
//! production code uses [`HttpTransport`], tests substitute in-memory doubles.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use harvest_shared::{FetchConfig, HarvestError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::retry::{RetryPolicy, with_retry};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("omeka-harvest/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// TransportResponse
// ---------------------------------------------------------------------------

/// Status, headers and body of a completed GET.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| HarvestError::parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Issue an HTTP GET and hand back the raw response.
///
/// Implementations return non-success statuses as responses, not errors;
/// only failures to obtain a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, params: &[(String, String)]) -> Result<TransportResponse>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport whose client gives up on a request after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, params: &[(String, String)]) -> Result<TransportResponse> {
        let response = self
            .client
            .get(url.clone())
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpTransport {
    fn classify(&self, url: &Url, error: reqwest::Error) -> HarvestError {
        if error.is_timeout() {
            HarvestError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            HarvestError::Network(format!("{url}: {error}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Checked requests
// ---------------------------------------------------------------------------

/// Fan-out width, per-request timeout and retry policy for a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl From<&FetchConfig> for RequestOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1) as usize,
            timeout: config.timeout(),
            retry: RetryPolicy::from(config),
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

/// GET with a timeout, retries, and a success-status check.
///
/// A non-2xx response becomes [`HarvestError::Http`]; an expired timeout
/// becomes [`HarvestError::Timeout`]. Both are retried per `options.retry`.
pub async fn get_checked(
    transport: &dyn Transport,
    url: &Url,
    params: &[(String, String)],
    options: &RequestOptions,
) -> Result<TransportResponse> {
    let label = url.as_str();
    with_retry(&options.retry, label, || async move {
        debug!(%url, ?params, "GET");
        let response = tokio::time::timeout(options.timeout, transport.get(url, params))
            .await
            .map_err(|_| HarvestError::Timeout {
                url: url.to_string(),
                secs: options.timeout.as_secs(),
            })??;

        if !response.is_success() {
            return Err(HarvestError::Http {
                status: response.status,
                url: url.to_string(),
            });
        }
        Ok(response)
    })
    .await
}
