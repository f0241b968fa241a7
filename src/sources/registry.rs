//! Registry for the configured source adapters.

use std::sync::Arc;

use super::{
    arxiv::ArxivSource, openalex::OpenAlexSource, semantic::SemanticScholarSource, Source,
    SourceError,
};
use crate::config::Config;
use crate::models::SourceKind;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const DETAILS = 1 << 1;
        const PDF_LINK = 1 << 2;
        const CITATIONS = 1 << 3;
        const RECOMMENDATIONS = 1 << 4;
        const TOP_CITED = 1 << 5;
        const CONCEPTS = 1 << 6;
    }
}

/// Ordered collection of source adapters
///
/// Registration order is the default fallback order. Each [`SourceKind`] appears at most
/// once; registering a kind again replaces the earlier adapter in place.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every enabled source, in the configured order
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut registry = Self::new();

        for kind in &config.search.sources {
            let settings = config.source(*kind);
            if !settings.enabled {
                tracing::debug!(source = %kind, "Source disabled in configuration");
                continue;
            }

            let source: Arc<dyn Source> = match kind {
                SourceKind::Arxiv => Arc::new(ArxivSource::from_config(settings, config.retry)?),
                SourceKind::OpenAlex => {
                    Arc::new(OpenAlexSource::from_config(settings, config.retry)?)
                }
                SourceKind::SemanticScholar => {
                    Arc::new(SemanticScholarSource::from_config(settings, config.retry)?)
                }
            };
            registry.register(source);
        }

        tracing::debug!(sources = ?registry.ids().collect::<Vec<_>>(), "Source registry ready");
        Ok(registry)
    }

    /// Register a source at the end of the order, or replace the one of the same kind
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.kind() == source.kind()) {
            Some(index) => self.sources[index] = source,
            None => self.sources.push(source),
        }
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, source: Arc<dyn Source>) -> Self {
        self.register(source);
        self
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Get a source by backend kind
    pub fn by_kind(&self, kind: SourceKind) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.kind() == kind)
    }

    /// Resolve a user-supplied source name (id or alias such as "s2")
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Source>> {
        self.get(name)
            .or_else(|| name.parse::<SourceKind>().ok().and_then(|k| self.by_kind(k)))
    }

    /// Get all registered sources in fallback order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all source IDs in fallback order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    #[test]
    fn test_from_config_default_order() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["arxiv", "openalex", "semantic_scholar"]
        );
    }

    #[test]
    fn test_from_config_respects_order_and_enabled() {
        let mut config = Config::default();
        config.search.sources = vec![
            SourceKind::SemanticScholar,
            SourceKind::Arxiv,
            SourceKind::OpenAlex,
        ];
        config.arxiv.enabled = false;

        let registry = SourceRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["semantic_scholar", "openalex"]
        );
        assert!(!registry.has("arxiv"));
    }

    #[test]
    fn test_get_source() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();

        let arxiv = registry.get("arxiv");
        assert!(arxiv.is_some());
        assert_eq!(arxiv.unwrap().kind(), SourceKind::Arxiv);

        assert!(registry.get("nonexistent").is_none());
        assert_eq!(
            registry.resolve("s2").map(|s| s.id()),
            Some("semantic_scholar")
        );
    }

    #[test]
    fn test_with_capability() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();

        let citing: Vec<_> = registry
            .with_capability(SourceCapabilities::CITATIONS)
            .into_iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(citing, vec!["semantic_scholar"]);
        assert_eq!(registry.with_capability(SourceCapabilities::SEARCH).len(), 3);
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let mut registry = SourceRegistry::new()
            .with(Arc::new(MockSource::new(SourceKind::Arxiv)))
            .with(Arc::new(MockSource::new(SourceKind::OpenAlex)));
        registry.register(Arc::new(MockSource::new(SourceKind::Arxiv)));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["arxiv", "openalex"]);
    }
}
