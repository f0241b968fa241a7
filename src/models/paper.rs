//! Canonical paper record shared by every source.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The backend a source adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Arxiv,
    #[serde(rename = "openalex")]
    OpenAlex,
    SemanticScholar,
}

impl SourceKind {
    /// Default fallback priority: preprints first, then the graph index, then citations.
    pub const PRIORITY: [SourceKind; 3] = [
        SourceKind::Arxiv,
        SourceKind::OpenAlex,
        SourceKind::SemanticScholar,
    ];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Arxiv => "arXiv",
            SourceKind::OpenAlex => "OpenAlex",
            SourceKind::SemanticScholar => "Semantic Scholar",
        }
    }

    /// Returns the source identifier used in results and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::Arxiv => "arxiv",
            SourceKind::OpenAlex => "openalex",
            SourceKind::SemanticScholar => "semantic_scholar",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arxiv" => Ok(SourceKind::Arxiv),
            "openalex" => Ok(SourceKind::OpenAlex),
            "semantic_scholar" | "semantic" | "s2" => Ok(SourceKind::SemanticScholar),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// A research paper normalized from any backend.
///
/// Adapters fill everything except [`PaperRecord::source_name`], which is only set by
/// the orchestrator once it has decided which source answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Source-native identifier (arXiv id, OpenAlex work id, Semantic Scholar paperId)
    pub id: String,

    pub title: String,

    pub authors: Vec<String>,

    /// Abstract with markup stripped and entities decoded
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    pub published_year: Option<i32>,

    /// Publication date (ISO-8601)
    pub published_date: Option<String>,

    /// Last updated date (ISO-8601)
    pub updated_date: Option<String>,

    /// Source taxonomy terms, deduplicated, in the order the backend reported them
    pub categories: Vec<String>,

    pub primary_category: Option<String>,

    pub pdf_url: Option<String>,

    /// Human-facing page for the paper
    pub landing_url: String,

    pub citation_count: Option<u32>,

    pub is_open_access: Option<bool>,

    pub doi: Option<String>,

    /// Journal or conference name
    pub venue: Option<String>,

    /// Source that answered; set by the orchestrator
    pub source_name: Option<String>,
}

impl PaperRecord {
    /// Create a new record with required fields
    pub fn new(id: String, title: String, landing_url: String) -> Self {
        Self {
            id,
            title,
            authors: Vec::new(),
            abstract_text: String::new(),
            published_year: None,
            published_date: None,
            updated_date: None,
            categories: Vec::new(),
            primary_category: None,
            pdf_url: None,
            landing_url,
            citation_count: None,
            is_open_access: None,
            doi: None,
            venue: None,
            source_name: None,
        }
    }

    /// Check if paper has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.is_some()
    }
}

/// Builder for constructing PaperRecord objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: PaperRecord,
}

impl PaperBuilder {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        landing_url: impl Into<String>,
    ) -> Self {
        Self {
            paper: PaperRecord::new(id.into(), title.into(), landing_url.into()),
        }
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors
            .into_iter()
            .map(Into::<String>::into)
            .filter(|a| !a.trim().is_empty())
            .collect();
        self
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.abstract_text = abstract_text.into();
        self
    }

    pub fn published_year(mut self, year: Option<i32>) -> Self {
        self.paper.published_year = year;
        self
    }

    /// Set publication date; empty strings are ignored
    pub fn published_date(mut self, date: Option<String>) -> Self {
        self.paper.published_date = date.filter(|d| !d.is_empty());
        self
    }

    /// Set updated date; empty strings are ignored
    pub fn updated_date(mut self, date: Option<String>) -> Self {
        self.paper.updated_date = date.filter(|d| !d.is_empty());
        self
    }

    /// Set categories, dropping blanks and duplicates. The first one becomes primary.
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for category in categories.into_iter().map(Into::<String>::into) {
            let category = category.trim().to_string();
            if !category.is_empty() && !unique.contains(&category) {
                unique.push(category);
            }
        }
        self.paper.primary_category = unique.first().cloned();
        self.paper.categories = unique;
        self
    }

    /// Set PDF URL; empty strings are ignored
    pub fn pdf_url(mut self, url: Option<String>) -> Self {
        self.paper.pdf_url = url.filter(|u| !u.is_empty());
        self
    }

    pub fn citation_count(mut self, count: Option<u32>) -> Self {
        self.paper.citation_count = count;
        self
    }

    pub fn open_access(mut self, is_open_access: Option<bool>) -> Self {
        self.paper.is_open_access = is_open_access;
        self
    }

    /// Set DOI, dropping any resolver prefix
    pub fn doi(mut self, doi: Option<String>) -> Self {
        self.paper.doi = doi
            .map(|d| d.trim_start_matches("https://doi.org/").to_string())
            .filter(|d| !d.is_empty());
        self
    }

    pub fn venue(mut self, venue: Option<String>) -> Self {
        self.paper.venue = venue.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn build(self) -> PaperRecord {
        self.paper
    }
}
