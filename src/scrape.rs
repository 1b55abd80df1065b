//! Scrape runs: fetch a URL queue, save HTML and Markdown, write a summary.
//!
//! ## Output layout
//!
//! ```text
//! <out>/html/<path>.html          raw rendered markup, one file per page
//! <out>/markdown/<path>.md        extracted Markdown (when extraction succeeds)
//! <out>/scrape_summary.json       {success: [...], failed: [...]}
//! ```
//!
//! `<path>` comes from [`crate::layout::relative_path_for`]. Pages are
//! processed strictly one at a time in queue order; with link following the
//! queue grows breadth-first as pages are fetched.

use crate::browser::{PageDriver, Sleeper};
use crate::config::{LinkPolicy, RenderOptions, ScrapeConfig};
use crate::error::Spa2MdError;
use crate::layout::{parse_http_url, relative_path_for, to_slash};
use crate::output::{RunSummary, ScrapeReport, SummaryEntry};
use crate::pipeline::extract::{extract_markdown, ContentProfile};
use crate::pipeline::fetch::Fetcher;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

pub const SUMMARY_FILE: &str = "scrape_summary.json";

/// Write `bytes` to `path` via a temp file in the same directory and a
/// rename, creating parent directories first. Readers never see a partial
/// file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Spa2MdError> {
    let write_err = |source: std::io::Error| Spa2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Absolute links in `html`, resolved against `base`. In-page anchors are
/// dropped; hash routes (`#/...`) are kept since they address SPA pages.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for el in doc.select(&selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        match base.join(href.trim()) {
            Ok(mut link) => {
                if !link.fragment().is_some_and(|f| f.starts_with('/')) {
                    link.set_fragment(None);
                }
                found.push(link);
            }
            Err(e) => debug!("skipping link '{href}' on {base}: {e}"),
        }
    }
    found
}

/// One scrape run over a driver. Build with [`Scraper::new`], then
/// [`run`](Scraper::run).
pub struct Scraper<D: PageDriver> {
    fetcher: Fetcher<D>,
    config: ScrapeConfig,
    options: RenderOptions,
    out_dir: PathBuf,
    write_markdown: bool,
}

impl<D: PageDriver> Scraper<D> {
    pub fn new(driver: D, config: ScrapeConfig, out_dir: impl Into<PathBuf>) -> Self {
        let fetcher =
            Fetcher::new(driver, config.fetch.clone()).with_progress(config.progress_callback.clone());
        Self {
            fetcher,
            config,
            options: RenderOptions::default(),
            out_dir: out_dir.into(),
            write_markdown: true,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.fetcher = self.fetcher.with_sleeper(sleeper);
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Save raw HTML only.
    pub fn html_only(mut self) -> Self {
        self.write_markdown = false;
        self
    }

    /// Process the whole queue. The driver is closed exactly once before
    /// returning, whatever happened.
    pub async fn run(mut self) -> Result<ScrapeReport, Spa2MdError> {
        let result = self.process().await;
        if let Err(e) = self.fetcher.close().await {
            warn!("closing page driver: {e}");
        }
        result
    }

    async fn process(&mut self) -> Result<ScrapeReport, Spa2MdError> {
        let started = Instant::now();
        self.config.validate()?;
        let profile = self.config.profile.resolve()?;
        profile.validate()?;

        let mut queue: VecDeque<String> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        for raw in &self.config.start_urls {
            let url = parse_http_url(raw)?.to_string();
            if seen.insert(url.clone()) {
                queue.push_back(url);
            }
        }

        let policy = self.config.follow_links.clone();
        let max_pages = policy.as_ref().map_or(usize::MAX, |p| p.max_pages);
        let progress = self.config.progress_callback.clone();

        info!(
            urls = queue.len(),
            profile = profile.name.as_str(),
            out = %self.out_dir.display(),
            "scrape run starting"
        );
        if let Some(ref cb) = progress {
            cb.on_run_start(queue.len());
        }

        let mut report = ScrapeReport::default();
        let mut index = 0usize;
        while let Some(url) = queue.pop_front() {
            if index >= max_pages {
                info!(max_pages, "page limit reached, {} queued URLs left", queue.len() + 1);
                break;
            }
            if index > 0 {
                self.fetcher.sleeper().sleep(self.config.rate_limit()).await;
            }
            index += 1;
            let total = index + queue.len();
            if let Some(ref cb) = progress {
                cb.on_page_start(index, total, &url);
            }
            info!("[{index}/{total}] {url}");

            let outcome = self.fetcher.fetch(&url).await;
            report.attempts.extend(outcome.attempts);

            let page = match outcome.result {
                Ok(page) => page,
                Err(e) => {
                    if let Some(ref cb) = progress {
                        cb.on_page_error(index, total, &url, &e.to_string());
                    }
                    report.summary.failed.push(url);
                    report.errors.push(e);
                    continue;
                }
            };

            let html_rel = relative_path_for(&url, "html")?;
            write_atomic(&self.out_dir.join("html").join(&html_rel), page.html.as_bytes())?;

            let extraction_error = if self.write_markdown {
                self.save_markdown(&url, &page.html, &profile, &mut report)?
            } else {
                None
            };

            if let Some(ref policy) = policy {
                enqueue_links(&page.html, &url, policy, &mut seen, &mut queue);
            }

            if let Some(ref cb) = progress {
                match extraction_error {
                    Some(ref reason) => cb.on_page_error(index, total, &url, reason),
                    None => cb.on_page_complete(index, total, &url, page.html_length),
                }
            }
            report.summary.success.push(SummaryEntry {
                url: url.clone(),
                path: to_slash(&html_rel),
                title: page.title.clone(),
                html_length: page.html_length,
            });
            report.pages.push(page);
        }

        let summary_path = self.out_dir.join(SUMMARY_FILE);
        report.summary.save(&summary_path)?;
        report.total_duration_ms = started.elapsed().as_millis() as u64;

        let success = report.summary.success.len();
        info!(
            success,
            failed = report.summary.failed.len(),
            extraction_failed = report.summary.extraction_failed.len(),
            duration_ms = report.total_duration_ms,
            "scrape run complete"
        );
        if let Some(ref cb) = progress {
            cb.on_run_complete(index, success);
        }
        Ok(report)
    }

    /// Extract and write the page's Markdown. Returns the reason when the
    /// page yielded no content; only write failures are fatal.
    fn save_markdown(
        &self,
        url: &str,
        html: &str,
        profile: &ContentProfile,
        report: &mut ScrapeReport,
    ) -> Result<Option<String>, Spa2MdError> {
        match extract_markdown(html, url, profile, &self.options) {
            Ok(markdown) => {
                let md_rel = relative_path_for(url, "md")?;
                write_atomic(&self.out_dir.join("markdown").join(md_rel), markdown.as_bytes())?;
                Ok(None)
            }
            Err(e) => {
                warn!("{e}");
                let reason = e.to_string();
                report.summary.extraction_failed.push(url.to_string());
                report.errors.push(e);
                Ok(Some(reason))
            }
        }
    }
}

fn enqueue_links(
    html: &str,
    page_url: &str,
    policy: &LinkPolicy,
    seen: &mut HashSet<String>,
    queue: &mut VecDeque<String>,
) {
    let Ok(base) = Url::parse(page_url) else {
        return;
    };
    let mut added = 0usize;
    for link in extract_links(html, &base) {
        if !policy.allows(&link, &base) {
            continue;
        }
        let link = link.to_string();
        if seen.insert(link.clone()) {
            queue.push_back(link);
            added += 1;
        }
    }
    debug!("{page_url}: queued {added} new links");
}

/// Convenience wrapper: run `config` over `driver`, writing under `out_dir`.
pub async fn run<D: PageDriver>(
    driver: D,
    config: ScrapeConfig,
    out_dir: impl Into<PathBuf>,
) -> Result<ScrapeReport, Spa2MdError> {
    Scraper::new(driver, config, out_dir).run().await
}

/// Load a previously written summary.
pub fn load_summary(path: &Path) -> Result<RunSummary, Spa2MdError> {
    let raw = std::fs::read_to_string(path).map_err(|source| Spa2MdError::InputReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| Spa2MdError::Internal(format!("invalid summary '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.md");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        write_atomic(&path, b"again").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "again");
    }

    #[test]
    fn links_resolve_and_drop_anchors() {
        let base = Url::parse("https://vant-ui.github.io/vant/").unwrap();
        let html = r##"<a href="#/zh-CN/button">b</a><a href="guide#install">g</a>
                       <a href="https://other.org/x">o</a><a>none</a>"##;
        let links: Vec<String> = extract_links(html, &base).iter().map(Url::to_string).collect();
        assert_eq!(
            links,
            vec![
                "https://vant-ui.github.io/vant/#/zh-CN/button",
                "https://vant-ui.github.io/vant/guide",
                "https://other.org/x",
            ]
        );
    }

    #[test]
    fn enqueue_respects_policy_and_dedup() {
        let policy = LinkPolicy {
            include: vec!["/docs/".into()],
            ..Default::default()
        };
        let html = r#"<a href="/docs/a">a</a><a href="/docs/a">again</a><a href="/blog/x">x</a>"#;
        let mut seen = HashSet::from(["https://s.io/docs/".to_string()]);
        let mut queue = VecDeque::new();
        enqueue_links(html, "https://s.io/docs/", &policy, &mut seen, &mut queue);
        assert_eq!(queue, VecDeque::from(["https://s.io/docs/a".to_string()]));
    }

    #[test]
    fn summary_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let summary = RunSummary {
            failed: vec!["https://a/x".into()],
            ..Default::default()
        };
        summary.save(&path).unwrap();
        assert_eq!(load_summary(&path).unwrap(), summary);
    }
}
