//! Result and report types produced by the fetcher and the batch runs.

use crate::error::{FailureKind, PageError, Spa2MdError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A successfully fetched, fully rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub title: String,
    pub html: String,
    /// Length of `html` in characters (Unicode scalar values), not bytes.
    pub html_length: usize,
}

impl FetchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>, html: String) -> Self {
        let html_length = html.chars().count();
        Self {
            url: url.into(),
            title: title.into(),
            html,
            html_length,
        }
    }
}

/// One attempt of the retry loop. Kept in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchAttempt {
    pub url: String,
    /// 1-indexed.
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success { title: String, html_length: usize },
    /// Another attempt follows. `reload_attempted` is set when a
    /// best-effort reload was issued before it; its own outcome is ignored.
    RetryableFailure {
        kind: FailureKind,
        detail: String,
        reload_attempted: bool,
    },
    /// Last attempt failed; the URL is given up on.
    TerminalFailure { kind: FailureKind, detail: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }
}

/// Summary line for one saved page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub url: String,
    /// Output path relative to the run's output directory.
    pub path: String,
    pub title: String,
    pub html_length: usize,
}

/// Persisted record of one run's outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: Vec<SummaryEntry>,
    /// URLs whose fetch failed after all retries.
    pub failed: Vec<String>,
    /// URLs fetched fine but yielding no usable content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extraction_failed: Vec<String>,
}

impl RunSummary {
    /// Write the summary as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), Spa2MdError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Spa2MdError::Internal(format!("summary serialisation: {e}")))?;
        crate::scrape::write_atomic(path, json.as_bytes())
    }
}

/// Everything a scrape run produced.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Fetched pages in fetch order.
    pub pages: Vec<FetchResult>,
    /// Per-page failures (fetch and extraction) in run order.
    pub errors: Vec<PageError>,
    /// Every attempt made, in order.
    pub attempts: Vec<FetchAttempt>,
    pub summary: RunSummary,
    pub total_duration_ms: u64,
}

/// Counters for an offline HTML → Markdown directory conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub converted: usize,
    pub failed: usize,
}
