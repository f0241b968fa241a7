//! HTTP client utilities.
//!
//! Every source talks to its backend through one [`HttpClient`]. The client carries the
//! source's user agent, default headers and timeout from construction, applies the
//! optional [`Throttle`] before each request and retries transport failures through
//! [`with_retry`].

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;
use crate::utils::{with_retry, RetryConfig, Throttle};

/// User agent sent when a source doesn't configure its own
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with timeout, retry and optional throttling
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryConfig,
    throttle: Option<Arc<Throttle>>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry
    }

    /// GET a JSON document and deserialize it
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let body = self.fetch(url, "application/json").await?;
        serde_json::from_slice(&body).map_err(SourceError::from)
    }

    /// GET a raw body (used for XML/Atom feeds)
    pub async fn get_bytes(&self, url: &str, accept: &str) -> Result<Vec<u8>, SourceError> {
        self.fetch(url, accept).await
    }

    async fn fetch(&self, url: &str, accept: &str) -> Result<Vec<u8>, SourceError> {
        let client = &self.client;
        let throttle = self.throttle.as_deref();

        with_retry(self.retry, move || async move {
            if let Some(throttle) = throttle {
                throttle.acquire().await;
            }

            tracing::debug!(url, "GET");
            let response = client.get(url).header(ACCEPT, accept).send().await?;
            let status = response.status();
            let body = response.bytes().await?;

            if !status.is_success() {
                return Err(SourceError::Api {
                    status: status.as_u16(),
                    message: api_message(&body, status),
                });
            }

            Ok(body.to_vec())
        })
        .await
    }
}

/// Build a percent-encoded query string from key/value pairs
pub fn query_string<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), urlencoding::encode(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode a caller-supplied id for use in a URL path.
///
/// `/` and `:` stay literal so DOI and prefixed ids (`doi:10.x/y`, `CorpusId:1`) keep
/// their shape; `#`, `?`, spaces and the rest are escaped.
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment)
        .replace("%2F", "/")
        .replace("%3A", ":")
}

/// Pull the human-readable message out of an error body
fn api_message(body: &[u8], status: reqwest::StatusCode) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        let message = value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|m| match m {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(o) => o
                    .get("message")
                    .and_then(|s| s.as_str())
                    .map(str::to_string),
                _ => None,
            });
        if let Some(message) = message {
            return message;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        status.to_string()
    } else {
        text.chars().take(200).collect()
    }
}

/// Builder for [`HttpClient`]
#[derive(Debug)]
pub struct HttpClientBuilder {
    user_agent: String,
    timeout: Duration,
    headers: HeaderMap,
    retry: RetryConfig,
    min_interval: Option<Duration>,
    invalid_header: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            headers: HeaderMap::new(),
            retry: RetryConfig::default(),
            min_interval: None,
            invalid_header: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header sent with every request (API keys are marked sensitive)
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(mut value) => {
                value.set_sensitive(name.eq_ignore_ascii_case("x-api-key"));
                self.headers.insert(HeaderName::from_static(name), value);
            }
            Err(e) => self.invalid_header = Some(format!("{}: {}", name, e)),
        }
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enforce a minimum interval between requests made through this client
    pub fn min_interval(mut self, interval: Option<Duration>) -> Self {
        self.min_interval = interval.filter(|i| !i.is_zero());
        self
    }

    pub fn build(self) -> Result<HttpClient, SourceError> {
        if let Some(err) = self.invalid_header {
            return Err(SourceError::InvalidRequest(format!("Invalid header value {}", err)));
        }

        let client = Client::builder()
            .user_agent(self.user_agent)
            .default_headers(self.headers)
            .timeout(self.timeout)
            .connect_timeout(self.timeout.min(Duration::from_secs(10)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpClient {
            client,
            retry: self.retry,
            throttle: self.min_interval.map(|i| Arc::new(Throttle::new(i))),
        })
    }
}
