//! Transport and text utilities shared by every source.
//!
//! - [`HttpClient`]: reqwest client with timeout, default headers, throttling and retry
//! - [`Throttle`]: minimum interval between requests of one source instance
//! - [`RetryConfig`] / [`with_retry`]: exponential backoff for transport failures
//! - [`strip_markup`]: clean titles and abstracts
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use scholar_search::sources::SourceError;
//! use scholar_search::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let data = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod retry;
mod text;
mod throttle;

pub use http::{encode_path_segment, query_string, HttpClient, HttpClientBuilder, DEFAULT_USER_AGENT};
pub use retry::{with_retry, RetryConfig, TransientError};
pub use text::{collapse_whitespace, strip_markup};
pub use throttle::Throttle;
