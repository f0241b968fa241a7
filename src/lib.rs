//! # Scholar Search
//!
//! One search interface over three bibliographic backends: arXiv, OpenAlex and
//! Semantic Scholar. Requests fall back from one backend to the next until one of
//! them answers with results.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Canonical paper record, search request/result and PDF link types
//! - [`sources`]: The [`Source`] trait, the three adapters, the identifier classifier
//!   and the [`SourceRegistry`]
//! - [`search`]: [`UnifiedSearch`], the fallback orchestrator
//! - [`utils`]: HTTP client with timeout, retry and throttling; text cleanup
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod search;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{PaperRecord, SearchRequest, SearchResult};
pub use search::{SearchError, UnifiedSearch};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
