//! arXiv research source implementation.

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{PaperBuilder, PaperRecord, PdfLink, SearchRequest, SearchResult, SortBy, SourceKind};
use crate::sources::identifier::normalize_arxiv_id;
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{collapse_whitespace, strip_markup, HttpClient, RetryConfig};

/// Default base URL for the arXiv export API
const ARXIV_BASE_URL: &str = "https://export.arxiv.org";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";
/// Base URL for arXiv abstract pages
const ARXIV_ABS_URL: &str = "https://arxiv.org/abs";
/// Largest page the export API serves in one request
const MAX_PAGE_SIZE: u32 = 200;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const ATOM: &str = "application/atom+xml";

/// arXiv research source
///
/// Supports:
/// - Search by query with category, year range and venue clauses
/// - Lookup by arXiv id
/// - PDF links (derived from the id, no request)
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    base_url: String,
}

impl ArxivSource {
    /// Create a new arXiv source with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&SourceConfig::default(), RetryConfig::default())
    }

    pub fn from_config(config: &SourceConfig, retry: RetryConfig) -> Result<Self, SourceError> {
        let mut builder = HttpClient::builder()
            .timeout(config.timeout_or(DEFAULT_TIMEOUT))
            .min_interval(config.min_interval_or(None))
            .retry(retry);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url_or(ARXIV_BASE_URL),
        })
    }

    /// Create with a custom HTTP client and endpoint (for testing)
    pub fn with_client(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// PDF location for an arXiv id
    pub fn pdf_url_for(id: &str) -> String {
        format!("{}/{}.pdf", ARXIV_PDF_URL, id)
    }

    /// Build the `search_query` expression: clauses joined with ` AND `
    fn build_search_query(request: &SearchRequest) -> String {
        let mut parts = vec![format!("all:{}", request.query.trim())];

        if let Some(category) = request.category.as_deref().filter(|c| !c.trim().is_empty()) {
            parts.push(format!("cat:{}", category.trim()));
        }

        if request.year_min.is_some() || request.year_max.is_some() {
            let from = request.year_min.unwrap_or(1900);
            let to = request
                .year_max
                .unwrap_or_else(|| chrono::Utc::now().year());
            parts.push(format!("submittedDate:[{}01010000 TO {}12312359]", from, to));
        }

        if let Some(venue) = request.venue.as_deref().filter(|v| !v.trim().is_empty()) {
            parts.push(format!("all:{}", venue.trim()));
        }

        parts.join(" AND ")
    }

    /// Percent-encode a query value with spaces as `+`
    fn encode_query(value: &str) -> String {
        urlencoding::encode(value).replace("%20", "+")
    }

    fn sort_params(sort: Option<SortBy>) -> (&'static str, &'static str) {
        match sort {
            Some(SortBy::Relevance) => ("relevance", "descending"),
            Some(SortBy::CitationCount) => {
                tracing::debug!("arXiv has no citation counts; sorting by submission date");
                ("submittedDate", "descending")
            }
            Some(SortBy::Date) | None => ("submittedDate", "descending"),
        }
    }

    fn search_url(&self, request: &SearchRequest) -> (String, u32) {
        let page_size = request.clamped_page_size(MAX_PAGE_SIZE);
        let (sort_by, sort_order) = Self::sort_params(request.sort);

        let url = format!(
            "{}/api/query?search_query={}&start={}&max_results={}&sortBy={}&sortOrder={}",
            self.base_url,
            Self::encode_query(&Self::build_search_query(request)),
            request.offset(page_size),
            page_size,
            sort_by,
            sort_order
        );
        (url, page_size)
    }

    async fn fetch_feed(&self, url: &str) -> Result<ArxivFeed, SourceError> {
        let body = self.client.get_bytes(url, ATOM).await?;
        parse_feed(&body)
    }
}

/// A parsed arXiv response
#[derive(Debug)]
struct ArxivFeed {
    total_results: u64,
    papers: Vec<PaperRecord>,
}

/// arXiv-namespace elements that feed-rs doesn't surface
#[derive(Debug, Default)]
struct EntryExtras {
    doi: Option<String>,
    journal_ref: Option<String>,
}

#[derive(Debug, Default)]
struct FeedExtras {
    total_results: Option<u64>,
    entries: Vec<EntryExtras>,
}

#[derive(Clone, Copy)]
enum ExtraField {
    TotalResults,
    Doi,
    JournalRef,
}

/// Pull `opensearch:totalResults` and the per-entry `arxiv:*` elements
fn scan_extras(body: &[u8]) -> Result<FeedExtras, SourceError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut extras = FeedExtras::default();
    let mut in_entry = false;
    let mut field: Option<ExtraField> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                field = match e.local_name().as_ref() {
                    b"entry" => {
                        in_entry = true;
                        extras.entries.push(EntryExtras::default());
                        None
                    }
                    b"totalResults" if !in_entry => Some(ExtraField::TotalResults),
                    b"doi" if in_entry => Some(ExtraField::Doi),
                    b"journal_ref" if in_entry => Some(ExtraField::JournalRef),
                    _ => None,
                };
            }
            Event::Text(t) => {
                if let Some(current) = field {
                    let text = t.unescape()?.trim().to_string();
                    match current {
                        ExtraField::TotalResults => extras.total_results = text.parse().ok(),
                        ExtraField::Doi => {
                            if let Some(entry) = extras.entries.last_mut() {
                                entry.doi = Some(text);
                            }
                        }
                        ExtraField::JournalRef => {
                            if let Some(entry) = extras.entries.last_mut() {
                                entry.journal_ref = Some(collapse_whitespace(&text));
                            }
                        }
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"entry" {
                    in_entry = false;
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(extras)
}

/// Parse an arXiv Atom response into records
fn parse_feed(body: &[u8]) -> Result<ArxivFeed, SourceError> {
    let feed = parser::parse(body)?;
    let extras = scan_extras(body)?;

    // The API reports malformed queries as a single entry under /api/errors
    if let Some(error) = feed.entries.iter().find(|e| e.id.contains("/api/errors")) {
        let message = error
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .unwrap_or_else(|| error.id.clone());
        return Err(SourceError::Api {
            status: 400,
            message,
        });
    }

    let papers = feed
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(entry, extras.entries.get(i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ArxivFeed {
        total_results: extras.total_results.unwrap_or(0),
        papers,
    })
}

/// Parse an arXiv Atom feed entry into a record
fn parse_entry(
    entry: &feed_rs::model::Entry,
    extras: Option<&EntryExtras>,
) -> Result<PaperRecord, SourceError> {
    let paper_id = normalize_arxiv_id(&entry.id)
        .ok_or_else(|| SourceError::Parse(format!("Unrecognized arXiv entry id: {}", entry.id)))?;

    let title = entry
        .title
        .as_ref()
        .map(|t| collapse_whitespace(&t.content))
        .unwrap_or_default();

    let abstract_text = entry
        .summary
        .as_ref()
        .map(|s| strip_markup(&s.content))
        .unwrap_or_default();

    let pdf_url = entry
        .links
        .iter()
        .find(|l| l.media_type.as_deref() == Some("application/pdf"))
        .map(|l| l.href.clone())
        .unwrap_or_else(|| ArxivSource::pdf_url_for(&paper_id));

    let landing_url = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .map(|l| l.href.clone())
        .unwrap_or_else(|| format!("{}/{}", ARXIV_ABS_URL, paper_id));

    Ok(PaperBuilder::new(paper_id, title, landing_url)
        .authors(entry.authors.iter().map(|a| collapse_whitespace(&a.name)))
        .abstract_text(abstract_text)
        .published_year(entry.published.map(|d| d.year()))
        .published_date(entry.published.map(|d| d.to_rfc3339()))
        .updated_date(entry.updated.map(|d| d.to_rfc3339()))
        .categories(entry.categories.iter().map(|c| c.term.clone()))
        .pdf_url(Some(pdf_url))
        .open_access(Some(true))
        .doi(extras.and_then(|x| x.doi.clone()))
        .venue(extras.and_then(|x| x.journal_ref.clone()))
        .build())
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        SourceKind::Arxiv.id()
    }

    fn name(&self) -> &str {
        SourceKind::Arxiv.name()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DETAILS | SourceCapabilities::PDF_LINK
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SourceError> {
        let (url, page_size) = self.search_url(request);
        tracing::debug!(query = %request.query, page = request.page, "Searching arXiv");

        let feed = self.fetch_feed(&url).await?;

        Ok(SearchResult::new(
            feed.papers,
            feed.total_results,
            request.page,
            page_size,
        ))
    }

    async fn get_by_id(&self, id: &str) -> Result<PaperRecord, SourceError> {
        let paper_id = normalize_arxiv_id(id)
            .ok_or_else(|| SourceError::InvalidRequest(format!("Not an arXiv id: {}", id)))?;

        let url = format!(
            "{}/api/query?id_list={}&max_results=1",
            self.base_url,
            urlencoding::encode(&paper_id)
        );
        let feed = self.fetch_feed(&url).await?;

        feed.papers
            .into_iter()
            .next()
            .ok_or(SourceError::NotFound(paper_id))
    }

    async fn get_pdf_url(&self, id: &str) -> Result<PdfLink, SourceError> {
        let paper_id = normalize_arxiv_id(id)
            .ok_or_else(|| SourceError::InvalidRequest(format!("Not an arXiv id: {}", id)))?;

        let landing_url = format!("{}/{}", ARXIV_ABS_URL, paper_id);
        let pdf_url = Self::pdf_url_for(&paper_id);
        Ok(PdfLink::new(paper_id, Some(pdf_url), true).landing_url(landing_url))
    }
}
