//! Core data models for research papers and search operations.

mod paper;
mod search;

pub use paper::{PaperBuilder, PaperRecord, SourceKind};
pub use search::{total_pages, Concept, PdfLink, SearchRequest, SearchResult, SortBy};
