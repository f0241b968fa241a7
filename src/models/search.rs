//! Search request and response models.

use serde::{Deserialize, Serialize};

use crate::models::PaperRecord;

/// Sort field for search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Relevance,
    Date,
    CitationCount,
}

/// Search query parameters shared by every source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Keyword query (required, non-empty)
    pub query: String,

    /// Category/subject filter in the target source's own taxonomy
    pub category: Option<String>,

    pub year_min: Option<i32>,

    pub year_max: Option<i32>,

    /// Journal or conference filter
    pub venue: Option<String>,

    /// 1-based page number
    pub page: u32,

    /// Requested page size; sources clamp it to their own maximum
    pub page_size: u32,

    /// Sort order; each source falls back to its own default when unset
    pub sort: Option<SortBy>,

    /// Only papers cited at least this many times
    pub min_citations: Option<u32>,

    /// Only papers with an open access copy
    pub open_access_only: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: None,
            year_min: None,
            year_max: None,
            venue: None,
            page: 1,
            page_size: 10,
            sort: None,
            min_citations: None,
            open_access_only: false,
        }
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set an inclusive publication year range; either bound may be open
    pub fn years(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.year_min = min;
        self.year_max = max;
        self
    }

    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn sort(mut self, sort: SortBy) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn min_citations(mut self, min: u32) -> Self {
        self.min_citations = Some(min);
        self
    }

    pub fn open_access_only(mut self, only: bool) -> Self {
        self.open_access_only = only;
        self
    }

    /// Check the fields that callers must get right before any source is contacted
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if self.page == 0 {
            return Err("page numbers start at 1".to_string());
        }
        Ok(())
    }

    /// Page size clamped to a source's maximum (and to at least 1)
    pub fn clamped_page_size(&self, max: u32) -> u32 {
        self.page_size.clamp(1, max)
    }

    /// Zero-based offset of the first result for the given page size
    pub fn offset(&self, page_size: u32) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(page_size)
    }
}

/// One page of results from a single source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub papers: Vec<PaperRecord>,

    /// Total matches reported by the backend (0 when it reported none)
    pub total_matches: u64,

    pub page: u32,

    /// Page size actually used after clamping
    pub page_size: u32,

    pub total_pages: u64,

    /// Source that answered; set by the orchestrator
    pub source_name: Option<String>,
}

impl SearchResult {
    pub fn new(papers: Vec<PaperRecord>, total_matches: u64, page: u32, page_size: u32) -> Self {
        Self {
            papers,
            total_matches,
            page,
            page_size,
            total_pages: total_pages(total_matches, page_size),
            source_name: None,
        }
    }

    /// An empty, successful result
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    /// Tag the result and each of its papers with the answering source
    pub fn tag_source(&mut self, source: &str) {
        self.source_name = Some(source.to_string());
        for paper in &mut self.papers {
            paper.source_name = Some(source.to_string());
        }
    }
}

/// `ceil(total / page_size)`, or 0 when there are no matches
pub fn total_pages(total_matches: u64, page_size: u32) -> u64 {
    if total_matches == 0 || page_size == 0 {
        0
    } else {
        total_matches.div_ceil(u64::from(page_size))
    }
}

/// Where a paper's full text can be fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfLink {
    pub paper_id: String,
    pub pdf_url: Option<String>,
    pub is_open_access: bool,
    pub landing_url: Option<String>,
    pub source_name: Option<String>,
}

impl PdfLink {
    pub fn new(paper_id: impl Into<String>, pdf_url: Option<String>, is_open_access: bool) -> Self {
        Self {
            paper_id: paper_id.into(),
            pdf_url: pdf_url.filter(|u| !u.is_empty()),
            is_open_access,
            landing_url: None,
            source_name: None,
        }
    }

    pub fn landing_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.landing_url = (!url.is_empty()).then_some(url);
        self
    }

    /// Derive a link from a fetched record
    pub fn from_record(record: &PaperRecord) -> Self {
        Self::new(
            record.id.clone(),
            record.pdf_url.clone(),
            record.is_open_access.unwrap_or(false),
        )
        .landing_url(record.landing_url.clone())
    }
}

/// A subject area from a source's taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub works_count: u64,
    pub description: Option<String>,
}
