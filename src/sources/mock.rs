//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::models::{Concept, PaperRecord, PdfLink, SearchRequest, SearchResult, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};

/// A mock source for testing that returns predefined responses.
///
/// It impersonates one of the real backends (`kind`) so it can sit in a
/// [`SourceRegistry`](crate::sources::SourceRegistry) in place of the network adapter.
/// Unconfigured searches return an empty result; unconfigured lookups return
/// [`SourceError::NotFound`].
#[derive(Debug)]
pub struct MockSource {
    kind: SourceKind,
    capabilities: SourceCapabilities,
    delay: Option<Duration>,
    search_response: Mutex<Option<Result<SearchResult, SourceError>>>,
    records: Mutex<Vec<PaperRecord>>,
    lookup_error: Mutex<Option<SourceError>>,
    related: Mutex<Vec<PaperRecord>>,
    concepts: Mutex<Vec<Concept>>,
    search_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            capabilities: SourceCapabilities::SEARCH
                | SourceCapabilities::DETAILS
                | SourceCapabilities::PDF_LINK,
            delay: None,
            search_response: Mutex::new(None),
            records: Mutex::new(Vec::new()),
            lookup_error: Mutex::new(None),
            related: Mutex::new(Vec::new()),
            concepts: Mutex::new(Vec::new()),
            search_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }

    /// Add capabilities on top of search/details/pdf
    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities |= capabilities;
        self
    }

    /// Sleep before answering any call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return these papers from every search
    pub fn with_papers(self, papers: Vec<PaperRecord>) -> Self {
        let total = papers.len() as u64;
        let size = papers.len().max(1) as u32;
        self.set_search_response(Ok(SearchResult::new(papers, total, 1, size)));
        self
    }

    /// Fail every search with this error
    pub fn failing(self, error: SourceError) -> Self {
        self.set_search_response(Err(error));
        self
    }

    /// Make this record available to `get_by_id`/`get_pdf_url`
    pub fn with_record(self, record: PaperRecord) -> Self {
        lock(&self.records).push(record);
        self
    }

    /// Fail every lookup with this error
    pub fn failing_lookups(self, error: SourceError) -> Self {
        *lock(&self.lookup_error) = Some(error);
        self
    }

    /// Papers returned by citations, recommendations and top-cited
    pub fn with_related(self, papers: Vec<PaperRecord>) -> Self {
        *lock(&self.related) = papers;
        self
    }

    pub fn with_concepts(self, concepts: Vec<Concept>) -> Self {
        *lock(&self.concepts) = concepts;
        self
    }

    /// Set the search response to return.
    pub fn set_search_response(&self, response: Result<SearchResult, SourceError>) {
        *lock(&self.search_response) = Some(response);
    }

    /// Clear the configured response.
    pub fn clear_response(&self) {
        *lock(&self.search_response) = None;
    }

    /// Number of `search` calls received
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_by_id`/`get_pdf_url` calls received
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn find(&self, id: &str) -> Result<PaperRecord, SourceError> {
        if let Some(error) = lock(&self.lookup_error).clone() {
            return Err(error);
        }
        lock(&self.records)
            .iter()
            .find(|r| r.id == id || r.doi.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    fn require(&self, capability: SourceCapabilities) -> Result<(), SourceError> {
        if self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(SourceError::NotImplemented)
        }
    }
}

/// A poisoned mutex only means another test thread panicked; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        self.kind.id()
    }

    fn name(&self) -> &str {
        self.kind.name()
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let configured = lock(&self.search_response).clone();
        match configured {
            Some(Ok(mut result)) => {
                result.page = request.page;
                Ok(result)
            }
            Some(Err(error)) => Err(error),
            None => Ok(SearchResult::empty(request.page, request.page_size)),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<PaperRecord, SourceError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.find(id)
    }

    async fn get_pdf_url(&self, id: &str) -> Result<PdfLink, SourceError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.find(id).map(|record| PdfLink::from_record(&record))
    }

    async fn get_citations(&self, _id: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        self.require(SourceCapabilities::CITATIONS)?;
        Ok(lock(&self.related).iter().take(limit).cloned().collect())
    }

    async fn get_recommendations(
        &self,
        _id: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.require(SourceCapabilities::RECOMMENDATIONS)?;
        Ok(lock(&self.related).iter().take(limit).cloned().collect())
    }

    async fn top_cited(&self, count: usize) -> Result<Vec<PaperRecord>, SourceError> {
        self.require(SourceCapabilities::TOP_CITED)?;
        Ok(lock(&self.related).iter().take(count).cloned().collect())
    }

    async fn list_concepts(&self, limit: usize) -> Result<Vec<Concept>, SourceError> {
        self.require(SourceCapabilities::CONCEPTS)?;
        Ok(lock(&self.concepts).iter().take(limit).cloned().collect())
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(id: &str, title: &str) -> PaperRecord {
    PaperRecord::new(
        id.to_string(),
        title.to_string(),
        format!("http://example.com/{}", id),
    )
}
