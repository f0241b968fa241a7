//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{PaperBuilder, PaperRecord, PdfLink, SearchRequest, SearchResult, SortBy, SourceKind};
use crate::sources::identifier::normalize_arxiv_id;
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{encode_path_segment, query_string, strip_markup, HttpClient, RetryConfig};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org";
const SEMANTIC_PAPER_URL: &str = "https://www.semanticscholar.org/paper";
const MAX_PAGE_SIZE: u32 = 100;
const MAX_CITATIONS: usize = 1000;
const MAX_RECOMMENDATIONS: usize = 500;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields requested for every paper
const PAPER_FIELDS: &str = "paperId,title,abstract,authors,year,publicationDate,venue,journal,\
openAccessPdf,url,citationCount,isOpenAccess,externalIds,fieldsOfStudy,s2FieldsOfStudy";

/// Semantic Scholar research source
///
/// Uses the Semantic Scholar Graph and Recommendations APIs. An API key, when
/// configured, is sent as the `x-api-key` header on every request.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: HttpClient,
    base_url: String,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source with default settings
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
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            builder = builder.header("x-api-key", key.trim());
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url_or(SEMANTIC_API_BASE),
        })
    }

    /// Create with a custom HTTP client and endpoint (for testing)
    pub fn with_client(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Semantic Scholar `year` parameter: `Y1-Y2`, `Y1-` or `-Y2`
    fn year_param(year_min: Option<i32>, year_max: Option<i32>) -> Option<String> {
        match (year_min, year_max) {
            (Some(min), Some(max)) => Some(format!("{}-{}", min, max)),
            (Some(min), None) => Some(format!("{}-", min)),
            (None, Some(max)) => Some(format!("-{}", max)),
            (None, None) => None,
        }
    }

    fn search_url(&self, request: &SearchRequest) -> (String, u32) {
        let page_size = request.clamped_page_size(MAX_PAGE_SIZE);

        let mut params = vec![
            ("query", request.query.trim().to_string()),
            ("offset", request.offset(page_size).to_string()),
            ("limit", page_size.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        if let Some(year) = Self::year_param(request.year_min, request.year_max) {
            params.push(("year", year));
        }
        if let Some(venue) = request.venue.as_deref().filter(|v| !v.trim().is_empty()) {
            params.push(("venue", venue.trim().to_string()));
        }
        if let Some(field) = request.category.as_deref().filter(|c| !c.trim().is_empty()) {
            params.push(("fieldsOfStudy", field.trim().to_string()));
        }
        if let Some(min) = request.min_citations {
            params.push(("minCitationCount", min.to_string()));
        }
        if request.open_access_only {
            params.push(("openAccessPdf", String::new()));
        }
        if matches!(request.sort, Some(SortBy::Date | SortBy::CitationCount)) {
            tracing::debug!("Semantic Scholar search is relevance-ranked; ignoring sort");
        }

        let url = format!(
            "{}/graph/v1/paper/search?{}",
            self.base_url,
            query_string(&params)
        );
        (url, page_size)
    }

    /// Map an identifier to the form the Graph API expects
    fn paper_ref(id: &str) -> String {
        let id = id.trim();
        let reference = if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            format!("CorpusId:{}", id)
        } else if let Some(arxiv_id) = normalize_arxiv_id(id) {
            format!("arXiv:{}", arxiv_id)
        } else if id.starts_with("10.") {
            format!("DOI:{}", id)
        } else {
            id.to_string()
        };
        encode_path_segment(&reference)
    }

    /// Parse Semantic Scholar paper data
    fn parse_paper(data: S2Paper) -> Option<PaperRecord> {
        let paper_id = data.paper_id.filter(|id| !id.is_empty())?;

        let landing_url = data
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("{}/{}", SEMANTIC_PAPER_URL, paper_id));

        let mut categories: Vec<String> = data
            .s2_fields_of_study
            .unwrap_or_default()
            .into_iter()
            .filter_map(|f| f.category)
            .collect();
        if categories.is_empty() {
            categories = data.fields_of_study.unwrap_or_default();
        }

        let venue = data
            .venue
            .filter(|v| !v.trim().is_empty())
            .or_else(|| data.journal.and_then(|j| j.name));

        let published_year = data.year.or_else(|| {
            data.publication_date
                .as_deref()
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse().ok())
        });

        let pdf_url = data.open_access_pdf.and_then(|p| p.url);

        Some(
            PaperBuilder::new(
                paper_id,
                data.title.map(|t| strip_markup(&t)).unwrap_or_default(),
                landing_url,
            )
            .authors(data.authors.unwrap_or_default().into_iter().filter_map(|a| a.name))
            .abstract_text(data.r#abstract.map(|a| strip_markup(&a)).unwrap_or_default())
            .published_year(published_year)
            .published_date(data.publication_date)
            .categories(categories)
            .pdf_url(pdf_url)
            .citation_count(data.citation_count)
            .open_access(data.is_open_access)
            .doi(data.external_ids.and_then(|ids| ids.doi))
            .venue(venue)
            .build(),
        )
    }

    fn parse_papers(papers: Vec<S2Paper>) -> Vec<PaperRecord> {
        papers.into_iter().filter_map(Self::parse_paper).collect()
    }

    fn not_found_for(id: &str) -> impl FnOnce(SourceError) -> SourceError + '_ {
        move |err| match err {
            SourceError::Api { status: 404, .. } => SourceError::NotFound(id.to_string()),
            other => other,
        }
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        SourceKind::SemanticScholar.id()
    }

    fn name(&self) -> &str {
        SourceKind::SemanticScholar.name()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DETAILS
            | SourceCapabilities::PDF_LINK
            | SourceCapabilities::CITATIONS
            | SourceCapabilities::RECOMMENDATIONS
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SourceError> {
        let (url, page_size) = self.search_url(request);
        tracing::debug!(query = %request.query, page = request.page, "Searching Semantic Scholar");

        let data: S2SearchResponse = self.client.get_json(&url).await?;
        let papers = Self::parse_papers(data.data.unwrap_or_default());

        Ok(SearchResult::new(
            papers,
            data.total.unwrap_or(0),
            request.page,
            page_size,
        ))
    }

    async fn get_by_id(&self, id: &str) -> Result<PaperRecord, SourceError> {
        if id.trim().is_empty() {
            return Err(SourceError::InvalidRequest("Empty paper id".to_string()));
        }

        let url = format!(
            "{}/graph/v1/paper/{}?{}",
            self.base_url,
            Self::paper_ref(id),
            query_string(&[("fields", PAPER_FIELDS)])
        );

        let paper: S2Paper = self
            .client
            .get_json(&url)
            .await
            .map_err(Self::not_found_for(id))?;

        Self::parse_paper(paper).ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    async fn get_pdf_url(&self, id: &str) -> Result<PdfLink, SourceError> {
        let paper = self.get_by_id(id).await?;
        Ok(PdfLink::from_record(&paper))
    }

    async fn get_citations(&self, id: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!(
            "{}/graph/v1/paper/{}/citations?{}",
            self.base_url,
            Self::paper_ref(id),
            query_string(&[
                ("fields", PAPER_FIELDS.to_string()),
                ("limit", limit.clamp(1, MAX_CITATIONS).to_string()),
            ])
        );

        let data: CitationsResponse = self
            .client
            .get_json(&url)
            .await
            .map_err(Self::not_found_for(id))?;

        Ok(Self::parse_papers(
            data.data
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| c.citing_paper)
                .collect(),
        ))
    }

    async fn get_recommendations(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!(
            "{}/recommendations/v1/papers/forpaper/{}?{}",
            self.base_url,
            Self::paper_ref(id),
            query_string(&[
                ("fields", PAPER_FIELDS.to_string()),
                ("limit", limit.clamp(1, MAX_RECOMMENDATIONS).to_string()),
            ])
        );

        let data: RecommendationsResponse = self
            .client
            .get_json(&url)
            .await
            .map_err(Self::not_found_for(id))?;

        Ok(Self::parse_papers(data.recommended_papers.unwrap_or_default()))
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    r#abstract: Option<String>,
    authors: Option<Vec<S2Author>>,
    year: Option<i32>,
    publication_date: Option<String>,
    venue: Option<String>,
    journal: Option<S2Journal>,
    open_access_pdf: Option<S2OpenAccessPdf>,
    url: Option<String>,
    citation_count: Option<u32>,
    is_open_access: Option<bool>,
    external_ids: Option<S2ExternalIds>,
    fields_of_study: Option<Vec<String>>,
    s2_fields_of_study: Option<Vec<S2FieldOfStudy>>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Journal {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2FieldOfStudy {
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    total: Option<u64>,
    data: Option<Vec<S2Paper>>,
}

#[derive(Debug, Deserialize)]
struct CitationsResponse {
    data: Option<Vec<CitationEdge>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CitationEdge {
    citing_paper: Option<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationsResponse {
    recommended_papers: Option<Vec<S2Paper>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const SEARCH: &str = r#"{
      "total": 8123,
      "offset": 20,
      "next": 30,
      "data": [
        {
          "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
          "title": "Construction of the Literature Graph in Semantic Scholar",
          "abstract": "We describe a deployed scalable system &amp; its <b>graph</b>.",
          "authors": [{"authorId": "1741101", "name": "Waleed Ammar"}, {"authorId": null, "name": "Dirk Groeneveld"}],
          "year": 2018,
          "publicationDate": "2018-05-06",
          "venue": "",
          "journal": {"name": "NAACL"},
          "openAccessPdf": {"url": "https://aclanthology.org/N18-3011.pdf", "status": "HYBRID"},
          "url": "https://www.semanticscholar.org/paper/649def34f8be52c8b66281af98ae884c09aef38b",
          "citationCount": 453,
          "isOpenAccess": true,
          "externalIds": {"DOI": "10.18653/v1/N18-3011", "CorpusId": 19170988},
          "fieldsOfStudy": ["Computer Science"],
          "s2FieldsOfStudy": [{"category": "Computer Science", "source": "external"}, {"category": "Computer Science", "source": "s2-fos-model"}, {"category": "Linguistics", "source": "s2-fos-model"}]
        },
        {
          "paperId": "abc",
          "title": "No extras",
          "abstract": null,
          "authors": [],
          "year": null,
          "publicationDate": null,
          "venue": "ICML",
          "openAccessPdf": null,
          "citationCount": 0,
          "isOpenAccess": false,
          "externalIds": null,
          "fieldsOfStudy": ["Mathematics"],
          "s2FieldsOfStudy": null
        },
        {
          "paperId": null,
          "title": "Dropped: no id"
        }
      ]
    }"#;

    fn source(url: &str) -> SemanticScholarSource {
        let client = HttpClient::builder()
            .retry(RetryConfig::none())
            .build()
            .unwrap();
        SemanticScholarSource::with_client(client, url)
    }

    #[test]
    fn test_year_param() {
        assert_eq!(
            SemanticScholarSource::year_param(Some(2019), Some(2021)).as_deref(),
            Some("2019-2021")
        );
        assert_eq!(SemanticScholarSource::year_param(Some(2019), None).as_deref(), Some("2019-"));
        assert_eq!(SemanticScholarSource::year_param(None, Some(2021)).as_deref(), Some("-2021"));
        assert!(SemanticScholarSource::year_param(None, None).is_none());
    }

    #[test]
    fn test_paper_ref() {
        assert_eq!(SemanticScholarSource::paper_ref("215416146"), "CorpusId:215416146");
        assert_eq!(SemanticScholarSource::paper_ref("2301.00001v1"), "arXiv:2301.00001");
        assert_eq!(SemanticScholarSource::paper_ref("10.18653/v1/N18-3011"), "DOI:10.18653/v1/N18-3011");
        assert_eq!(
            SemanticScholarSource::paper_ref("649def34f8be52c8b66281af98ae884c09aef38b"),
            "649def34f8be52c8b66281af98ae884c09aef38b"
        );
        assert_eq!(SemanticScholarSource::paper_ref("CorpusId:42"), "CorpusId:42");
        assert_eq!(SemanticScholarSource::paper_ref("abc?d#e"), "abc%3Fd%23e");
        assert_eq!(SemanticScholarSource::paper_ref("10.1000/a b"), "DOI:10.1000/a%20b");
    }

    #[test]
    fn test_parse_search_response() {
        let data: S2SearchResponse = serde_json::from_str(SEARCH).unwrap();
        let papers = SemanticScholarSource::parse_papers(data.data.unwrap());
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.id, "649def34f8be52c8b66281af98ae884c09aef38b");
        assert_eq!(first.authors, vec!["Waleed Ammar", "Dirk Groeneveld"]);
        assert_eq!(first.abstract_text, "We describe a deployed scalable system & its graph.");
        assert_eq!(first.published_year, Some(2018));
        assert_eq!(first.published_date.as_deref(), Some("2018-05-06"));
        assert_eq!(first.venue.as_deref(), Some("NAACL"));
        assert_eq!(first.categories, vec!["Computer Science", "Linguistics"]);
        assert_eq!(first.pdf_url.as_deref(), Some("https://aclanthology.org/N18-3011.pdf"));
        assert_eq!(first.citation_count, Some(453));
        assert_eq!(first.doi.as_deref(), Some("10.18653/v1/N18-3011"));
        assert_eq!(first.is_open_access, Some(true));

        let second = &papers[1];
        assert_eq!(second.landing_url, "https://www.semanticscholar.org/paper/abc");
        assert!(second.abstract_text.is_empty());
        assert!(second.published_year.is_none());
        assert_eq!(second.categories, vec!["Mathematics"]);
        assert_eq!(second.venue.as_deref(), Some("ICML"));
        assert!(second.pdf_url.is_none());
    }

    #[tokio::test]
    async fn test_search_sends_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "literature graph".into()),
                Matcher::UrlEncoded("offset".into(), "20".into()),
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("fields".into(), PAPER_FIELDS.into()),
                Matcher::UrlEncoded("year".into(), "2017-2019".into()),
                Matcher::UrlEncoded("venue".into(), "NAACL".into()),
                Matcher::UrlEncoded("fieldsOfStudy".into(), "Computer Science".into()),
                Matcher::UrlEncoded("minCitationCount".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(SEARCH)
            .create_async()
            .await;

        let request = SearchRequest::new("literature graph")
            .years(Some(2017), Some(2019))
            .venue("NAACL")
            .category("Computer Science")
            .min_citations(50)
            .page(3)
            .page_size(10);
        let result = source(&server.url()).search(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.papers.len(), 2);
        assert_eq!(result.total_matches, 8123);
        assert_eq!(result.total_pages, 813);
    }

    #[tokio::test]
    async fn test_search_clamps_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("offset".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"total": 0, "offset": 100, "data": []}"#)
            .create_async()
            .await;

        let result = source(&server.url())
            .search(&SearchRequest::new("q").page(2).page_size(250))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(result.page_size, 100);
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"message": "Too Many Requests. Please wait and try again or apply for a key for higher rate limits."}"#)
            .create_async()
            .await;

        let err = source(&server.url())
            .search(&SearchRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_api_key_header_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graph/v1/paper/CorpusId:19170988")
            .match_query(Matcher::Any)
            .match_header("x-api-key", "secret-key")
            .with_status(200)
            .with_body(r#"{"paperId": "649def34f8be52c8b66281af98ae884c09aef38b", "title": "T"}"#)
            .create_async()
            .await;

        let config = SourceConfig {
            base_url: Some(server.url()),
            api_key: Some("secret-key".to_string()),
            ..SourceConfig::default()
        };
        let source = SemanticScholarSource::from_config(&config, RetryConfig::none()).unwrap();
        let paper = source.get_by_id("19170988").await.unwrap();

        mock.assert_async().await;
        assert_eq!(paper.id, "649def34f8be52c8b66281af98ae884c09aef38b");
    }

    #[tokio::test]
    async fn test_get_by_id_404_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/graph/v1/paper/arXiv:2301.99999")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": "Paper with id arXiv:2301.99999 not found"}"#)
            .create_async()
            .await;

        let err = source(&server.url()).get_by_id("2301.99999").await.unwrap_err();
        assert_eq!(err, SourceError::NotFound("2301.99999".into()));
    }

    #[tokio::test]
    async fn test_get_citations() {
        let body = r#"{
          "offset": 0,
          "data": [
            {"citingPaper": {"paperId": "c1", "title": "Citing one", "year": 2020}},
            {"citingPaper": {"paperId": null, "title": "Missing id"}},
            {"citingPaper": {"paperId": "c2", "title": "Citing two", "year": 2021}}
          ]
        }"#;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graph/v1/paper/p1/citations")
            .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let papers = source(&server.url()).get_citations("p1", 5).await.unwrap();
        mock.assert_async().await;
        let ids: Vec<_> = papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_get_recommendations() {
        let body = r#"{"recommendedPapers": [{"paperId": "r1", "title": "Related", "citationCount": 3}]}"#;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/recommendations/v1/papers/forpaper/p1")
            .match_query(Matcher::UrlEncoded("limit".into(), "10".into()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let papers = source(&server.url()).get_recommendations("p1", 10).await.unwrap();
        mock.assert_async().await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].citation_count, Some(3));
    }

    #[tokio::test]
    async fn test_pdf_link_without_open_access_copy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/graph/v1/paper/abc")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"paperId": "abc", "title": "Closed", "openAccessPdf": null, "isOpenAccess": false}"#)
            .create_async()
            .await;

        let link = source(&server.url()).get_pdf_url("abc").await.unwrap();
        assert!(link.pdf_url.is_none());
        assert!(!link.is_open_access);
        assert_eq!(link.landing_url.as_deref(), Some("https://www.semanticscholar.org/paper/abc"));
    }
}
