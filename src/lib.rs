//! # edgequake-spa2md
//!
//! Render JavaScript-heavy documentation sites and convert them to clean,
//! structurally faithful Markdown.
//!
//! ## Why this crate?
//!
//! Modern component-library docs (Vant, TDesign, WeChat mini-program docs…)
//! are single-page applications: a plain HTTP fetch returns an empty shell
//! and the real content only exists after the page's JavaScript has run.
//! This crate drives a headless browser to render each page, survives the
//! flaky network and render conditions that come with it, and then maps the
//! rendered DOM onto Markdown deterministically: code samples keep their
//! language and indentation, tables stay well-formed even when ragged, and
//! percent-encoded demo sources are decoded.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL queue
//!  │
//!  ├─ 1. Fetch     navigate + wait + capture, retry with backoff (browser / HTTP)
//!  ├─ 2. Select    content root and sections per site profile
//!  ├─ 3. Model     scraper DOM → typed Node tree
//!  ├─ 4. Render    exhaustive tag dispatch (tables, code, encoded payloads)
//!  ├─ 5. Normalize whitespace cleanup, fence-aware, idempotent
//!  └─ 6. Output    html/ + markdown/ trees and scrape_summary.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_spa2md::{scrape, ChromeDriver, ScrapeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScrapeConfig::builder()
//!         .start_urls(["https://vant-ui.github.io/vant/#/zh-CN/button"])
//!         .profile(edgequake_spa2md::ProfileSpec::Named("vant".into()))
//!         .build()?;
//!     let driver = ChromeDriver::launch(config.fetch.headless, Some(&config.user_agent)).await?;
//!     let report = scrape::run(driver, config, "output").await?;
//!     eprintln!("{} pages saved, {} failed",
//!         report.summary.success.len(),
//!         report.summary.failed.len());
//!     Ok(())
//! }
//! ```
//!
//! Already have the markup? Skip the browser entirely:
//!
//! ```rust
//! use edgequake_spa2md::{html_to_markdown, RenderOptions};
//!
//! let md = html_to_markdown(
//!     "<table><tr><th>A</th><th>B</th></tr><tr><td>1|2</td><td>x</td></tr></table>",
//!     &RenderOptions::default(),
//! );
//! assert!(md.contains("| 1\\|2 | x |"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `spa2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-spa2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod convert;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scrape;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use browser::{ChromeDriver, Engine, HttpDriver, PageDriver, Sleeper, TokioSleeper};
pub use config::{
    FetchConfig, HeadingSpaces, LinkPolicy, ProfileSpec, RenderOptions, ScrapeConfig,
    ScrapeConfigBuilder, WaitStrategy,
};
pub use convert::{convert_dir, convert_dir_sync, convert_file, html_to_markdown};
pub use error::{DriverError, FailureKind, PageError, Spa2MdError};
pub use output::{
    AttemptOutcome, ConversionStats, FetchAttempt, FetchResult, RunSummary, ScrapeReport,
    SummaryEntry,
};
pub use pipeline::extract::{extract_markdown, ContentProfile, SectionRule};
pub use pipeline::fetch::{backoff_delay, FetchOutcome, Fetcher};
pub use progress::{NoopProgressCallback, ProgressCallback, ScrapeProgressCallback};
pub use scrape::Scraper;
