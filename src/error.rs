//! Error types for the edgequake-spa2md library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Spa2MdError`]: **Fatal**: the run cannot proceed at all (bad
//!   configuration, browser failed to launch, output directory not
//!   writable). Returned as `Err(Spa2MdError)` from the top-level entry
//!   points.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed (retries exhausted,
//!   no recognisable content) but the batch continues. Collected into the
//!   run report so callers can inspect partial success rather than losing
//!   the whole run to one bad URL.
//!
//! * [`DriverError`]: a single fetch *attempt* failed. The fetcher
//!   classifies it with [`DriverError::kind`] to decide whether a reload is
//!   worth issuing before the next attempt.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-spa2md library.
///
/// Page-level failures use [`PageError`] and are stored in the run report
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum Spa2MdError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The JSON configuration file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON configuration file is not valid.
    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The string is not a valid absolute HTTP/HTTPS URL.
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    // ── Browser errors ────────────────────────────────────────────────────
    /// The rendering engine could not be started.
    #[error(
        "Failed to launch browser: {0}\n\n\
Chromium (or Chrome) must be installed and discoverable on PATH.\n\
Set CHROME=/path/to/chrome to point at a specific binary, or use\n\
--engine http for static pages that do not need JavaScript.\n"
    )]
    BrowserLaunch(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read an input HTML file.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Extraction ────────────────────────────────────────────────────────
    /// A single-document conversion produced no usable content.
    #[error(transparent)]
    Extraction(#[from] PageError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The run continues with the next URL; the error is recorded in the
/// report and the summary.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// Every fetch attempt failed.
    #[error("{url}: fetch failed after {attempts} attempts: {detail}")]
    FetchFailed {
        url: String,
        attempts: u32,
        detail: String,
    },

    /// None of the profile's content-root selectors matched.
    #[error("{url}: no content root found")]
    NoContentRoot { url: String },

    /// Content was found but is below the minimum length threshold.
    #[error("{url}: extracted content too short ({chars} < {min} chars)")]
    ContentTooShort { url: String, chars: usize, min: usize },
}

impl PageError {
    /// The URL (or file path) of the page this error belongs to.
    pub fn url(&self) -> &str {
        match self {
            PageError::FetchFailed { url, .. }
            | PageError::NoContentRoot { url }
            | PageError::ContentTooShort { url, .. } => url,
        }
    }

    /// `true` for errors raised after the page was fetched. These are never
    /// retried: fetching again will not produce content that is absent.
    pub fn is_extraction(&self) -> bool {
        !matches!(self, PageError::FetchFailed { .. })
    }
}

/// Classification of a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Navigation or wait exceeded the configured timeout.
    Timeout,
    /// Navigation raised (DNS, connection reset, bad status, CDP error…).
    Navigation,
    /// The page loaded but its title or markup could not be read.
    Content,
}

/// One attempt's failure, as reported by a [`crate::browser::PageDriver`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("content capture failed: {0}")]
    Content(String),
}

impl DriverError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DriverError::Timeout { .. } => FailureKind::Timeout,
            DriverError::Navigation(_) => FailureKind::Navigation,
            DriverError::Content(_) => FailureKind::Content,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == FailureKind::Timeout
    }
}
