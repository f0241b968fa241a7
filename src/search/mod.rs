//! Fallback orchestration across the registered sources.
//!
//! [`UnifiedSearch`] tries sources one at a time and stops at the first acceptable
//! answer. Searches follow the registry order (optionally with a preferred source
//! moved to the front); detail lookups follow the order suggested by
//! [`classify`](crate::sources::classify). Only [`UnifiedSearch::compare_sources`]
//! queries every source, concurrently.
//!
//! ```no_run
//! use scholar_search::config::Config;
//! use scholar_search::models::SearchRequest;
//! use scholar_search::search::UnifiedSearch;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let search = UnifiedSearch::from_config(&Config::default())?;
//! let result = search.search(&SearchRequest::new("graph neural networks"), None).await?;
//! println!("{} papers from {:?}", result.papers.len(), result.source_name);
//! # Ok(())
//! # }
//! ```

mod report;

pub use report::{
    AttemptOutcome, ComparisonReport, ExhaustedReport, SearchError, SourceAttempt,
    SourceComparison,
};

use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SearchConfig};
use crate::models::{Concept, PaperRecord, PdfLink, SearchRequest, SearchResult};
use crate::sources::{classify, Source, SourceCapabilities, SourceError, SourceRegistry};

/// How the orchestrator treats empty answers and how long a chain may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackOptions {
    /// Try the next source when one answers with zero matches
    pub fallback_on_empty: bool,
    /// Bound for a whole fallback chain (and for each source in a comparison)
    pub deadline: Option<Duration>,
    /// Papers kept per source when comparing
    pub compare_limit: usize,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            fallback_on_empty: true,
            deadline: None,
            compare_limit: 5,
        }
    }
}

impl From<&SearchConfig> for FallbackOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            fallback_on_empty: config.fallback_on_empty,
            deadline: config.deadline(),
            compare_limit: config.compare_limit,
        }
    }
}

/// Outcome of one source call inside a chain
enum Step<T> {
    /// Good answer, stop here
    Accept(T),
    /// Successful answer without matches
    Empty(T),
}

/// Unified search over an ordered set of sources
#[derive(Debug, Clone)]
pub struct UnifiedSearch {
    registry: SourceRegistry,
    options: FallbackOptions,
}

impl UnifiedSearch {
    pub fn new(registry: SourceRegistry, options: FallbackOptions) -> Self {
        Self { registry, options }
    }

    /// Build the registry and options from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Ok(Self::new(
            SourceRegistry::from_config(config)?,
            FallbackOptions::from(&config.search),
        ))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn options(&self) -> FallbackOptions {
        self.options
    }

    /// Search, falling back through the sources until one returns matches.
    ///
    /// `preferred` moves that source to the front of the order; an unknown name is
    /// logged and ignored.
    pub async fn search(
        &self,
        request: &SearchRequest,
        preferred: Option<&str>,
    ) -> Result<SearchResult, SearchError> {
        request.validate().map_err(SearchError::InvalidRequest)?;

        let candidates = self.search_order(preferred);
        let report = ExhaustedReport::new("search", request.query.clone());

        self.bounded(self.run_chain(report, candidates, |source| async move {
            let mut result = source.search(request).await?;
            result.tag_source(source.id());
            Ok::<_, SourceError>(if result.is_empty() {
                Step::Empty(result)
            } else {
                Step::Accept(result)
            })
        }))
        .await
    }

    /// Fetch one paper, from `source` only when given, otherwise in classifier order
    pub async fn get_by_id(&self, id: &str, source: Option<&str>) -> Result<PaperRecord, SearchError> {
        let id = require_id(id)?;
        let candidates = self.lookup_order(id, source)?;
        let report = ExhaustedReport::new("get_by_id", id);

        self.bounded(self.run_chain(report, candidates, |source| async move {
            let mut record = source.get_by_id(id).await?;
            record.source_name = Some(source.id().to_string());
            Ok::<_, SourceError>(Step::Accept(record))
        }))
        .await
    }

    /// Resolve a PDF link, with the same ordering as [`get_by_id`](Self::get_by_id)
    pub async fn get_pdf_url(&self, id: &str, source: Option<&str>) -> Result<PdfLink, SearchError> {
        let id = require_id(id)?;
        let candidates = self.lookup_order(id, source)?;
        let report = ExhaustedReport::new("get_pdf_url", id);

        self.bounded(self.run_chain(report, candidates, |source| async move {
            let mut link = source.get_pdf_url(id).await?;
            link.source_name = Some(source.id().to_string());
            Ok::<_, SourceError>(Step::Accept(link))
        }))
        .await
    }

    /// Run the query against every source at once and report each outcome.
    ///
    /// Never fails once the request is valid; per-source failures are recorded in the
    /// report.
    pub async fn compare_sources(
        &self,
        request: &SearchRequest,
        limit: Option<usize>,
    ) -> Result<ComparisonReport, SearchError> {
        request.validate().map_err(SearchError::InvalidRequest)?;

        let limit = limit.unwrap_or(self.options.compare_limit);
        let deadline = self.options.deadline;

        let calls = self
            .registry
            .with_capability(SourceCapabilities::SEARCH)
            .into_iter()
            .map(|source| async move {
                let outcome = match deadline {
                    Some(deadline) => tokio::time::timeout(deadline, source.search(request))
                        .await
                        .unwrap_or_else(|_| {
                            Err(SourceError::Timeout(format!("deadline of {:?} exceeded", deadline)))
                        }),
                    None => source.search(request).await,
                };

                if let Err(e) = &outcome {
                    tracing::warn!(source = source.id(), error = %e, "Comparison search failed");
                }
                SourceComparison::from_outcome(source.id(), outcome, limit)
            });

        let sources = join_all(calls).await;

        Ok(ComparisonReport {
            success: true,
            query: request.query.clone(),
            sources,
        })
    }

    /// Papers citing `id`
    pub async fn citations(&self, id: &str, limit: usize) -> Result<Vec<PaperRecord>, SearchError> {
        let id = require_id(id)?;
        let candidates = self.capable(SourceCapabilities::CITATIONS, "citations")?;
        let report = ExhaustedReport::new("citations", id);

        self.bounded(self.run_chain(report, candidates, |source| async move {
            let papers = source.get_citations(id, limit).await?;
            Ok::<_, SourceError>(Step::Accept(tag_papers(papers, source.id())))
        }))
        .await
    }

    /// Papers recommended as related to `id`
    pub async fn recommendations(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SearchError> {
        let id = require_id(id)?;
        let candidates = self.capable(SourceCapabilities::RECOMMENDATIONS, "recommendations")?;
        let report = ExhaustedReport::new("recommendations", id);

        self.bounded(self.run_chain(report, candidates, |source| async move {
            let papers = source.get_recommendations(id, limit).await?;
            Ok::<_, SourceError>(Step::Accept(tag_papers(papers, source.id())))
        }))
        .await
    }

    /// Most cited works
    pub async fn top_cited(&self, count: usize) -> Result<Vec<PaperRecord>, SearchError> {
        let candidates = self.capable(SourceCapabilities::TOP_CITED, "top cited")?;
        let report = ExhaustedReport::new("top_cited", count.to_string());

        self.bounded(self.run_chain(report, candidates, |source| async move {
            let papers = source.top_cited(count).await?;
            Ok::<_, SourceError>(Step::Accept(tag_papers(papers, source.id())))
        }))
        .await
    }

    /// Subject areas of the first source with a taxonomy
    pub async fn concepts(&self, limit: usize) -> Result<Vec<Concept>, SearchError> {
        let candidates = self.capable(SourceCapabilities::CONCEPTS, "concepts")?;
        let report = ExhaustedReport::new("concepts", limit.to_string());

        self.bounded(self.run_chain(report, candidates, |source| async move {
            Ok::<_, SourceError>(Step::Accept(source.list_concepts(limit).await?))
        }))
        .await
    }

    /// Registry order, with the preferred source (if registered) moved to the front
    fn search_order(&self, preferred: Option<&str>) -> Vec<Arc<dyn Source>> {
        let mut order: Vec<_> = self
            .registry
            .with_capability(SourceCapabilities::SEARCH)
            .into_iter()
            .cloned()
            .collect();

        if let Some(name) = preferred {
            match self.registry.resolve(name).map(|s| s.kind()) {
                Some(kind) => {
                    if let Some(pos) = order.iter().position(|s| s.kind() == kind) {
                        let first = order.remove(pos);
                        order.insert(0, first);
                    }
                }
                None => {
                    tracing::warn!(source = name, "Unknown preferred source, using default order")
                }
            }
        }

        order
    }

    /// Explicit source only, or the classifier's order followed by the remaining sources
    fn lookup_order(&self, id: &str, source: Option<&str>) -> Result<Vec<Arc<dyn Source>>, SearchError> {
        if let Some(name) = source {
            return self
                .registry
                .resolve(name)
                .map(|s| vec![Arc::clone(s)])
                .ok_or_else(|| SearchError::UnknownSource(name.to_string()));
        }

        let hint = classify(id);
        let mut order: Vec<Arc<dyn Source>> = hint
            .lookup_order()
            .iter()
            .filter_map(|kind| self.registry.by_kind(*kind).cloned())
            .collect();
        for source in self.registry.all() {
            if !order.iter().any(|s| s.kind() == source.kind()) {
                order.push(Arc::clone(source));
            }
        }
        order.retain(|s| s.supports(SourceCapabilities::DETAILS));

        tracing::debug!(
            id,
            ?hint,
            order = ?order.iter().map(|s| s.id()).collect::<Vec<_>>(),
            "Lookup order"
        );
        Ok(order)
    }

    fn capable(
        &self,
        capability: SourceCapabilities,
        operation: &'static str,
    ) -> Result<Vec<Arc<dyn Source>>, SearchError> {
        let sources: Vec<_> = self
            .registry
            .with_capability(capability)
            .into_iter()
            .cloned()
            .collect();

        if sources.is_empty() {
            Err(SearchError::Unsupported(operation))
        } else {
            Ok(sources)
        }
    }

    /// Try candidates in order until one accepts
    async fn run_chain<T, F, Fut>(
        &self,
        mut report: ExhaustedReport,
        candidates: Vec<Arc<dyn Source>>,
        call: F,
    ) -> Result<T, SearchError>
    where
        F: Fn(Arc<dyn Source>) -> Fut,
        Fut: Future<Output = Result<Step<T>, SourceError>>,
    {
        for source in candidates {
            let id = source.id().to_string();
            tracing::info!(source = %id, operation = %report.operation, target = %report.target, "Trying source");

            match call(source).await {
                Ok(Step::Accept(value)) => {
                    tracing::info!(source = %id, operation = %report.operation, "Source answered");
                    return Ok(value);
                }
                Ok(Step::Empty(value)) => {
                    if !self.options.fallback_on_empty {
                        return Ok(value);
                    }
                    tracing::info!(source = %id, "No matches, trying next source");
                    report.record(&id, AttemptOutcome::Empty);
                }
                Err(e) => {
                    tracing::warn!(source = %id, operation = %report.operation, error = %e, "Source failed");
                    report.record(&id, AttemptOutcome::from_error(&e));
                }
            }
        }

        tracing::warn!(
            operation = %report.operation,
            tried = ?report.tried_sources(),
            "All sources exhausted"
        );
        Err(SearchError::Exhausted(report))
    }

    /// Apply the configured deadline to a whole chain
    async fn bounded<T, Fut>(&self, chain: Fut) -> Result<T, SearchError>
    where
        Fut: Future<Output = Result<T, SearchError>>,
    {
        match self.options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, chain)
                .await
                .map_err(|_| SearchError::DeadlineExceeded(deadline))?,
            None => chain.await,
        }
    }
}

fn require_id(id: &str) -> Result<&str, SearchError> {
    let id = id.trim();
    if id.is_empty() {
        Err(SearchError::InvalidRequest("paper id must not be empty".to_string()))
    } else {
        Ok(id)
    }
}

fn tag_papers(mut papers: Vec<PaperRecord>, source: &str) -> Vec<PaperRecord> {
    for paper in &mut papers {
        paper.source_name = Some(source.to_string());
    }
    papers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use crate::sources::mock::{make_paper, MockSource};

    fn unified(sources: Vec<MockSource>, options: FallbackOptions) -> UnifiedSearch {
        let registry = sources
            .into_iter()
            .fold(SourceRegistry::new(), |r, s| r.with(Arc::new(s)));
        UnifiedSearch::new(registry, options)
    }

    fn order_ids(search: &UnifiedSearch, preferred: Option<&str>) -> Vec<String> {
        search
            .search_order(preferred)
            .iter()
            .map(|s| s.id().to_string())
            .collect()
    }

    fn all_kinds() -> Vec<MockSource> {
        SourceKind::PRIORITY.iter().map(|k| MockSource::new(*k)).collect()
    }

    #[test]
    fn test_search_order_with_preference() {
        let search = unified(all_kinds(), FallbackOptions::default());

        assert_eq!(order_ids(&search, None), ["arxiv", "openalex", "semantic_scholar"]);
        assert_eq!(
            order_ids(&search, Some("semantic_scholar")),
            ["semantic_scholar", "arxiv", "openalex"]
        );
        assert_eq!(order_ids(&search, Some("s2"))[0], "semantic_scholar");
        assert_eq!(
            order_ids(&search, Some("pubmed")),
            ["arxiv", "openalex", "semantic_scholar"]
        );
    }

    #[test]
    fn test_lookup_order_follows_classifier() {
        let search = unified(all_kinds(), FallbackOptions::default());
        let ids = |id: &str| -> Vec<String> {
            search
                .lookup_order(id, None)
                .unwrap()
                .iter()
                .map(|s| s.id().to_string())
                .collect()
        };

        assert_eq!(ids("2301.00001"), ["arxiv", "openalex", "semantic_scholar"]);
        assert_eq!(ids("W2741809807"), ["openalex", "semantic_scholar", "arxiv"]);
        assert_eq!(ids("215416146"), ["semantic_scholar", "openalex", "arxiv"]);
    }

    #[test]
    fn test_explicit_unknown_source() {
        let search = unified(all_kinds(), FallbackOptions::default());
        assert!(matches!(
            search.lookup_order("2301.00001", Some("crossref")),
            Err(SearchError::UnknownSource(name)) if name == "crossref"
        ));
    }

    #[tokio::test]
    async fn test_empty_result_returned_when_fallback_disabled() {
        let options = FallbackOptions {
            fallback_on_empty: false,
            ..FallbackOptions::default()
        };
        let search = unified(
            vec![
                MockSource::new(SourceKind::Arxiv),
                MockSource::new(SourceKind::OpenAlex).with_papers(vec![make_paper("W1", "A")]),
            ],
            options,
        );

        let result = search.search(&SearchRequest::new("rare topic"), None).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.source_name.as_deref(), Some("arxiv"));
    }

    #[tokio::test]
    async fn test_invalid_request_contacts_nobody() {
        let search = unified(all_kinds(), FallbackOptions::default());

        let err = search.search(&SearchRequest::new("   "), None).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));

        let err = search.get_by_id("", None).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_supplements_need_a_capable_source() {
        let search = unified(all_kinds(), FallbackOptions::default());

        assert_eq!(
            search.citations("123", 5).await.unwrap_err(),
            SearchError::Unsupported("citations")
        );
        assert_eq!(
            search.concepts(10).await.unwrap_err(),
            SearchError::Unsupported("concepts")
        );
    }

    #[tokio::test]
    async fn test_supplements_route_to_capable_source() {
        let search = unified(
            vec![
                MockSource::new(SourceKind::Arxiv),
                MockSource::new(SourceKind::SemanticScholar)
                    .with_capabilities(SourceCapabilities::CITATIONS)
                    .with_related(vec![make_paper("a", "A"), make_paper("b", "B")]),
            ],
            FallbackOptions::default(),
        );

        let papers = search.citations("649def34", 10).await.unwrap();
        assert_eq!(papers.len(), 2);
        assert!(papers
            .iter()
            .all(|p| p.source_name.as_deref() == Some("semantic_scholar")));
    }

    #[test]
    fn test_options_from_config() {
        let config = SearchConfig {
            fallback_on_empty: false,
            deadline_secs: Some(12),
            compare_limit: 3,
            ..SearchConfig::default()
        };
        let options = FallbackOptions::from(&config);

        assert!(!options.fallback_on_empty);
        assert_eq!(options.deadline, Some(Duration::from_secs(12)));
        assert_eq!(options.compare_limit, 3);
    }
}
