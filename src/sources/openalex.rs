//! OpenAlex research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{
    Concept, PaperBuilder, PaperRecord, PdfLink, SearchRequest, SearchResult, SortBy, SourceKind,
};
use crate::sources::identifier::{normalize_arxiv_id, normalize_openalex_id};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{encode_path_segment, query_string, strip_markup, HttpClient, RetryConfig, DEFAULT_USER_AGENT};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";
const OPENALEX_WORK_URL: &str = "https://openalex.org";
/// DOI prefix arXiv registers its preprints under
const ARXIV_DOI_PREFIX: &str = "10.48550/arXiv.";
const MAX_PAGE_SIZE: u32 = 200;
const MAX_TOP_CITED: usize = 50;
const MAX_CONCEPTS: usize = 200;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(10);

/// OpenAlex research source
///
/// Uses the OpenAlex REST API. A contact email puts requests in the polite pool; it is
/// sent in the user agent and as the `mailto` parameter.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: HttpClient,
    base_url: String,
    email: Option<String>,
}

impl OpenAlexSource {
    /// Create a new OpenAlex source with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&SourceConfig::default(), RetryConfig::default())
    }

    pub fn from_config(config: &SourceConfig, retry: RetryConfig) -> Result<Self, SourceError> {
        let email = config.email.clone().filter(|e| !e.trim().is_empty());
        let user_agent = match (&config.user_agent, &email) {
            (Some(agent), _) => agent.clone(),
            (None, Some(email)) => format!("{} (mailto:{})", DEFAULT_USER_AGENT, email),
            (None, None) => DEFAULT_USER_AGENT.to_string(),
        };

        let client = HttpClient::builder()
            .user_agent(user_agent)
            .timeout(config.timeout_or(DEFAULT_TIMEOUT))
            .min_interval(config.min_interval_or(Some(DEFAULT_MIN_INTERVAL)))
            .retry(retry)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url_or(OPENALEX_API_BASE),
            email,
        })
    }

    /// Create with a custom HTTP client and endpoint (for testing)
    pub fn with_client(client: HttpClient, base_url: impl Into<String>, email: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email,
        }
    }

    /// Build request URL, adding `mailto` when an email is configured
    fn build_url(&self, endpoint: &str, mut params: Vec<(&'static str, String)>) -> String {
        if let Some(email) = &self.email {
            params.push(("mailto", email.clone()));
        }
        if params.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query_string(&params))
        }
    }

    /// Comma-joined `filter` clauses for a request
    fn build_filter(request: &SearchRequest) -> Option<String> {
        let mut clauses = Vec::new();

        if let Some(year) = request.year_min {
            clauses.push(format!("from_publication_year:{}", year));
        }
        if let Some(year) = request.year_max {
            clauses.push(format!("to_publication_year:{}", year));
        }
        if request.open_access_only {
            clauses.push("open_access.is_oa:true".to_string());
        }
        if let Some(min) = request.min_citations.filter(|m| *m > 0) {
            clauses.push(format!("cited_by_count:>{}", min - 1));
        }
        if request.category.is_some() || request.venue.is_some() {
            tracing::debug!("OpenAlex ignores category and venue filters");
        }

        (!clauses.is_empty()).then(|| clauses.join(","))
    }

    fn sort_param(sort: Option<SortBy>) -> &'static str {
        match sort {
            Some(SortBy::Relevance) => "relevance_score:desc",
            Some(SortBy::Date) => "publication_date:desc",
            Some(SortBy::CitationCount) | None => "cited_by_count:desc",
        }
    }

    fn search_url(&self, request: &SearchRequest) -> (String, u32) {
        let page_size = request.clamped_page_size(MAX_PAGE_SIZE);

        let mut params = vec![
            ("search", request.query.trim().to_string()),
            ("per-page", page_size.to_string()),
            ("page", request.page.to_string()),
        ];
        if let Some(filter) = Self::build_filter(request) {
            params.push(("filter", filter));
        }
        params.push(("sort", Self::sort_param(request.sort).to_string()));

        (self.build_url("/works", params), page_size)
    }

    /// Endpoint for a single work. arXiv ids go through the DOI arXiv registers.
    fn work_endpoint(id: &str) -> String {
        if let Some(arxiv_id) = normalize_arxiv_id(id) {
            return format!(
                "/works/doi:{}",
                encode_path_segment(&format!("{}{}", ARXIV_DOI_PREFIX, arxiv_id))
            );
        }

        let id = normalize_openalex_id(id);
        let id = id.strip_prefix("https://doi.org/").unwrap_or(&id);
        if id.starts_with("10.") {
            format!("/works/doi:{}", encode_path_segment(id))
        } else {
            format!("/works/{}", encode_path_segment(id))
        }
    }

    /// Parse OpenAlex work data
    fn parse_work(work: Work) -> PaperRecord {
        let paper_id = work
            .id
            .as_deref()
            .map(normalize_openalex_id)
            .unwrap_or_default();

        let title = work
            .title
            .or(work.display_name)
            .map(|t| strip_markup(&t))
            .unwrap_or_default();

        let abstract_text = match (work.abstract_text, work.abstract_inverted_index) {
            (Some(text), _) if !text.trim().is_empty() => strip_markup(&text),
            (_, Some(index)) => strip_markup(&rebuild_abstract(&index)),
            _ => String::new(),
        };

        let published_year = work.publication_year.or_else(|| {
            work.publication_date
                .as_deref()
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse().ok())
        });

        let pdf_url = work
            .best_oa_location
            .as_ref()
            .and_then(|l| l.pdf_url.clone())
            .or_else(|| work.best_location.as_ref().and_then(|l| l.pdf_url.clone()))
            .or_else(|| {
                work.best_location
                    .as_ref()
                    .and_then(|l| l.landing_page_url.clone())
            });

        let venue = work
            .primary_location
            .as_ref()
            .and_then(|l| l.source.as_ref())
            .and_then(|s| s.display_name.clone());

        let landing_url = work
            .id
            .clone()
            .unwrap_or_else(|| format!("{}/{}", OPENALEX_WORK_URL, paper_id));

        let categories = work
            .concepts
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.display_name);

        let mut paper = PaperBuilder::new(paper_id, title, landing_url)
            .authors(
                work.authorships
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|a| a.author.and_then(|a| a.display_name)),
            )
            .abstract_text(abstract_text)
            .published_year(published_year)
            .published_date(work.publication_date)
            .updated_date(work.updated_date)
            .categories(categories)
            .pdf_url(pdf_url)
            .citation_count(work.cited_by_count)
            .open_access(work.open_access.and_then(|oa| oa.is_oa))
            .doi(work.doi)
            .venue(venue)
            .build();

        if let Some(topic) = work.primary_topic.and_then(|t| t.display_name) {
            paper.primary_category = Some(topic);
        }
        paper
    }

    async fn fetch_work(&self, id: &str) -> Result<PaperRecord, SourceError> {
        let url = self.build_url(&Self::work_endpoint(id), Vec::new());

        match self.client.get_json::<Work>(&url).await {
            Ok(work) => Ok(Self::parse_work(work)),
            Err(SourceError::Api { status: 404, .. }) => Err(SourceError::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }
}

/// Rebuild abstract text from OpenAlex's word -> positions index
fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut words: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |p| (*p, word.as_str())))
        .collect();
    words.sort_unstable_by_key(|(pos, _)| *pos);
    words
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Source for OpenAlexSource {
    fn id(&self) -> &str {
        SourceKind::OpenAlex.id()
    }

    fn name(&self) -> &str {
        SourceKind::OpenAlex.name()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::OpenAlex
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DETAILS
            | SourceCapabilities::PDF_LINK
            | SourceCapabilities::TOP_CITED
            | SourceCapabilities::CONCEPTS
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SourceError> {
        let (url, page_size) = self.search_url(request);
        tracing::debug!(query = %request.query, page = request.page, "Searching OpenAlex");

        let data: WorksResponse = self.client.get_json(&url).await?;
        let total = data.meta.and_then(|m| m.count).unwrap_or(0);
        let papers = data
            .results
            .unwrap_or_default()
            .into_iter()
            .map(Self::parse_work)
            .collect();

        Ok(SearchResult::new(papers, total, request.page, page_size))
    }

    async fn get_by_id(&self, id: &str) -> Result<PaperRecord, SourceError> {
        if id.trim().is_empty() {
            return Err(SourceError::InvalidRequest("Empty OpenAlex id".to_string()));
        }
        self.fetch_work(id).await
    }

    async fn get_pdf_url(&self, id: &str) -> Result<PdfLink, SourceError> {
        let paper = self.get_by_id(id).await?;
        Ok(PdfLink::from_record(&paper))
    }

    async fn top_cited(&self, count: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let per_page = count.clamp(1, MAX_TOP_CITED);
        let url = self.build_url(
            "/works",
            vec![
                ("per-page", per_page.to_string()),
                ("sort", "cited_by_count:desc".to_string()),
            ],
        );

        let data: WorksResponse = self.client.get_json(&url).await?;
        Ok(data
            .results
            .unwrap_or_default()
            .into_iter()
            .map(Self::parse_work)
            .collect())
    }

    async fn list_concepts(&self, limit: usize) -> Result<Vec<Concept>, SourceError> {
        let per_page = limit.clamp(1, MAX_CONCEPTS);
        let url = self.build_url(
            "/concepts",
            vec![
                ("per-page", per_page.to_string()),
                ("sort", "works_count:desc".to_string()),
            ],
        );

        let data: ConceptsResponse = self.client.get_json(&url).await?;
        Ok(data
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|c| Concept {
                id: c.id.as_deref().map(normalize_openalex_id).unwrap_or_default(),
                name: c.display_name.unwrap_or_default(),
                level: c.level.unwrap_or(0),
                works_count: c.works_count.unwrap_or(0),
                description: c.description.filter(|d| !d.trim().is_empty()),
            })
            .collect())
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct WorksResponse {
    results: Option<Vec<Work>>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    publication_date: Option<String>,
    updated_date: Option<String>,
    cited_by_count: Option<u32>,
    doi: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    authorships: Option<Vec<Authorship>>,
    best_oa_location: Option<Location>,
    best_location: Option<Location>,
    primary_location: Option<Location>,
    open_access: Option<OpenAccess>,
    concepts: Option<Vec<ConceptRef>>,
    primary_topic: Option<Topic>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    pdf_url: Option<String>,
    landing_page_url: Option<String>,
    source: Option<LocationSource>,
}

#[derive(Debug, Deserialize)]
struct LocationSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccess {
    is_oa: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ConceptRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Topic {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConceptsResponse {
    results: Option<Vec<ConceptData>>,
}

#[derive(Debug, Deserialize)]
struct ConceptData {
    id: Option<String>,
    display_name: Option<String>,
    level: Option<u32>,
    works_count: Option<u64>,
    description: Option<String>,
}
