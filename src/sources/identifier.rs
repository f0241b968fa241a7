//! Identifier scheme detection for detail lookups.
//!
//! The three backends use unrelated id schemes. [`classify`] guesses which backend an id
//! belongs to so that `get_by_id` can try the most likely source first. It's a routing
//! heuristic only: a lookup is never rejected because of its classification.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::models::SourceKind;

/// Which kind of backend an identifier most likely belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceHint {
    /// New-style arXiv id, e.g. `2301.00001v2`
    Preprint,
    /// OpenAlex work id, e.g. `W2741809807`
    GraphIndex,
    /// Semantic Scholar paperId or CorpusId
    CitationGraph,
    Unknown,
}

impl SourceHint {
    /// Sources to try for a detail lookup, most likely first
    pub fn lookup_order(self) -> &'static [SourceKind] {
        match self {
            SourceHint::Preprint => &[SourceKind::Arxiv, SourceKind::OpenAlex],
            SourceHint::GraphIndex => &[SourceKind::OpenAlex, SourceKind::SemanticScholar],
            SourceHint::CitationGraph => &[SourceKind::SemanticScholar, SourceKind::OpenAlex],
            SourceHint::Unknown => &[SourceKind::Arxiv, SourceKind::OpenAlex],
        }
    }
}

fn arxiv_new_style() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?i:arxiv:)?\d{4}\.\d{5}(v\d+)?$").expect("valid regex"))
}

fn arxiv_any_style() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}\.\d{4,5}|[a-z][a-z\-]*(\.[A-Z]{2})?/\d{7})(v\d+)?$").expect("valid regex")
    })
}

fn openalex_work() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:https?://openalex\.org/)?(W\d+)$").expect("valid regex"))
}

fn sha40() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("valid regex"))
}

/// Classify an identifier. Rules are evaluated in order on the trimmed id.
pub fn classify(id: &str) -> SourceHint {
    let id = id.trim();

    if arxiv_new_style().is_match(id) {
        return SourceHint::Preprint;
    }

    if let Some(caps) = openalex_work().captures(id) {
        if caps[1].len() >= 10 {
            return SourceHint::GraphIndex;
        }
    }

    let is_digits = !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit());
    if is_digits || id.starts_with("CorpusId:") || id.len() == 27 || sha40().is_match(id) {
        return SourceHint::CitationGraph;
    }

    SourceHint::Unknown
}

/// Normalize an arXiv id: drop `arXiv:` and `/abs/` URL prefixes and the version suffix.
///
/// Returns `None` when the result isn't shaped like an arXiv id (new `YYMM.NNNNN` or old
/// `archive/NNNNNNN` style).
pub fn normalize_arxiv_id(id: &str) -> Option<String> {
    let mut id = id.trim();

    if let Some(pos) = id.find("/abs/").or_else(|| id.find("/pdf/")) {
        id = &id[pos + 5..];
    }
    id = id.trim_end_matches(".pdf");
    if id.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("arxiv:")) {
        id = &id[6..];
    }

    let caps = arxiv_any_style().captures(id)?;
    Some(caps[1].to_string())
}

/// Bare OpenAlex work id (`W…`) from either the bare or URL form
pub fn normalize_openalex_id(id: &str) -> String {
    let id = id.trim();
    id.strip_prefix("https://openalex.org/")
        .or_else(|| id.strip_prefix("http://openalex.org/"))
        .unwrap_or(id)
        .to_string()
}
