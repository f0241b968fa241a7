//! Errors and per-source reports produced by [`UnifiedSearch`](super::UnifiedSearch).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::models::{PaperRecord, SearchResult};
use crate::sources::SourceError;

/// Errors returned by the orchestrator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// The request was rejected before any source was contacted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An explicitly named source is not registered
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Every candidate source was tried without an acceptable answer
    #[error("{0}")]
    Exhausted(ExhaustedReport),

    /// The whole chain did not finish within the deadline
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// No registered source offers the operation
    #[error("No registered source supports {0}")]
    Unsupported(&'static str),
}

impl SearchError {
    /// The exhaustion report, when every source was tried
    pub fn report(&self) -> Option<&ExhaustedReport> {
        match self {
            SearchError::Exhausted(report) => Some(report),
            _ => None,
        }
    }
}

/// What happened when one source was tried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Answered successfully with zero matches
    Empty,
    /// Answered that the paper doesn't exist there
    NotFound,
    /// Errored (transport, API, parse or routing)
    Failed(String),
}

impl AttemptOutcome {
    pub fn from_error(err: &SourceError) -> Self {
        match err {
            SourceError::NotFound(_) => AttemptOutcome::NotFound,
            other => AttemptOutcome::Failed(other.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AttemptOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source: String,
    pub outcome: AttemptOutcome,
}

/// Aggregate of every attempt made before giving up
///
/// Lets callers tell "nothing matched anywhere" ([`nothing_matched`](Self::nothing_matched))
/// apart from "every backend was unreachable" ([`all_failed`](Self::all_failed)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhaustedReport {
    /// `search`, `get_by_id`, ...
    pub operation: String,
    /// Query text or paper id
    pub target: String,
    pub attempts: Vec<SourceAttempt>,
}

impl ExhaustedReport {
    pub fn new(operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            target: target.into(),
            attempts: Vec::new(),
        }
    }

    pub fn record(&mut self, source: &str, outcome: AttemptOutcome) {
        self.attempts.push(SourceAttempt {
            source: source.to_string(),
            outcome,
        });
    }

    /// Sources tried, in the order they were tried
    pub fn tried_sources(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.source.as_str()).collect()
    }

    /// Message of the most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| match &a.outcome {
            AttemptOutcome::Failed(message) => Some(message.as_str()),
            _ => None,
        })
    }

    /// Every source answered, none had a match
    pub fn nothing_matched(&self) -> bool {
        !self.attempts.is_empty() && self.attempts.iter().all(|a| !a.outcome.is_failure())
    }

    /// Every source errored
    pub fn all_failed(&self) -> bool {
        !self.attempts.is_empty() && self.attempts.iter().all(|a| a.outcome.is_failure())
    }
}

impl fmt::Display for ExhaustedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "No source available for {} '{}'", self.operation, self.target);
        }

        write!(f, "All sources exhausted for {} '{}':", self.operation, self.target)?;
        for attempt in &self.attempts {
            match &attempt.outcome {
                AttemptOutcome::Empty => write!(f, " {} (no matches);", attempt.source)?,
                AttemptOutcome::NotFound => write!(f, " {} (not found);", attempt.source)?,
                AttemptOutcome::Failed(message) => write!(f, " {} ({});", attempt.source, message)?,
            }
        }
        Ok(())
    }
}

/// One source's side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceComparison {
    pub source: String,
    pub success: bool,
    pub total: u64,
    pub papers: Vec<PaperRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceComparison {
    pub fn from_outcome(source: &str, outcome: Result<SearchResult, SourceError>, limit: usize) -> Self {
        match outcome {
            Ok(mut result) => {
                result.tag_source(source);
                result.papers.truncate(limit);
                Self {
                    source: source.to_string(),
                    success: true,
                    total: result.total_matches,
                    papers: result.papers,
                    error: None,
                }
            }
            Err(err) => Self::failed(source, err.to_string()),
        }
    }

    pub fn failed(source: &str, error: String) -> Self {
        Self {
            source: source.to_string(),
            success: false,
            total: 0,
            papers: Vec::new(),
            error: Some(error),
        }
    }
}

/// Per-source breakdown of one query. `success` is always true; failures live in `sources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub success: bool,
    pub query: String,
    pub sources: Vec<SourceComparison>,
}

impl ComparisonReport {
    pub fn get(&self, source: &str) -> Option<&SourceComparison> {
        self.sources.iter().find(|s| s.source == source)
    }
}
