//! Source adapters for the supported bibliographic backends.
//!
//! This module defines the [`Source`] trait that every backend implements. Each adapter
//! translates a [`SearchRequest`] into its backend's native query, performs one GET
//! through the shared [`HttpClient`](crate::utils::HttpClient) and normalizes the
//! response into [`PaperRecord`]s.
//!
//! | Source | Kind | Search | Details | PDF link | Extras |
//! |--------|------|--------|---------|----------|--------|
//! | [`ArxivSource`] | preprint index | Atom feed | `id_list` | derived, no request | |
//! | [`OpenAlexSource`] | graph index | `/works` | `/works/{id}` | via details | top cited, concepts |
//! | [`SemanticScholarSource`] | citation graph | `/paper/search` | `/paper/{id}` | via details | citations, recommendations |
//!
//! Adapters never retry on their own; retries and throttling live in the transport.
//! [`identifier::classify`] decides which adapter a bare identifier most likely
//! belongs to, and [`SourceRegistry`] builds the ordered adapter list from
//! configuration.

mod arxiv;
pub mod identifier;
pub mod mock;
mod openalex;
mod registry;
mod semantic;

pub use arxiv::ArxivSource;
pub use identifier::{classify, SourceHint};
pub use mock::MockSource;
pub use openalex::OpenAlexSource;
pub use registry::{SourceCapabilities, SourceRegistry};
pub use semantic::SemanticScholarSource;

use crate::models::{Concept, PaperRecord, PdfLink, SearchRequest, SearchResult, SourceKind};
use async_trait::async_trait;

/// The Source trait defines the interface for all bibliographic backends.
///
/// `search`, `get_by_id` and `get_pdf_url` are required. The remaining operations are
/// only offered by some backends and default to [`SourceError::NotImplemented`];
/// advertise them through [`Source::capabilities`].
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "arxiv", "openalex")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Which backend this adapter talks to
    fn kind(&self) -> SourceKind;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DETAILS | SourceCapabilities::PDF_LINK
    }

    fn supports(&self, capability: SourceCapabilities) -> bool {
        self.capabilities().contains(capability)
    }

    // ========== CORE METHODS ==========

    /// Search for papers matching the request.
    ///
    /// A successful response without matches is an empty [`SearchResult`], not an error.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SourceError>;

    /// Get a paper by its source-native identifier
    async fn get_by_id(&self, id: &str) -> Result<PaperRecord, SourceError>;

    /// Resolve where the paper's PDF lives
    async fn get_pdf_url(&self, id: &str) -> Result<PdfLink, SourceError>;

    // ========== CITATION GRAPH ==========

    /// Get papers that cite this paper
    async fn get_citations(&self, _id: &str, _limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Get papers recommended as related to this paper
    async fn get_recommendations(
        &self,
        _id: &str,
        _limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::NotImplemented)
    }

    // ========== CATALOG ==========

    /// Most cited works in the index
    async fn top_cited(&self, _count: usize) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Subject areas of the source's taxonomy
    async fn list_concepts(&self, _limit: usize) -> Result<Vec<Concept>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Connection, DNS or other transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-2xx response or an error document from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded (XML, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// Invalid request parameters, or an id this source can't handle
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// Transport-level failure (the backend was never reached or never answered)
    pub fn is_transport(&self) -> bool {
        matches!(self, SourceError::Network(_) | SourceError::Timeout(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

impl From<feed_rs::parser::ParseFeedError> for SourceError {
    fn from(err: feed_rs::parser::ParseFeedError) -> Self {
        SourceError::Parse(format!("Atom: {}", err))
    }
}
