//! Integration tests for the public API: conversion scenarios, the retry
//! loop and complete scrape runs against an in-memory site.
//!
//! No browser or network is needed; a scripted [`PageDriver`] stands in for
//! the rendering engine and a recording [`Sleeper`] captures every pause.

use async_trait::async_trait;
use edgequake_spa2md::pipeline::normalize::normalize;
use edgequake_spa2md::scrape::{load_summary, SUMMARY_FILE};
use edgequake_spa2md::{
    backoff_delay, html_to_markdown, AttemptOutcome, DriverError, FetchConfig, Fetcher,
    LinkPolicy, PageDriver, RenderOptions, ScrapeConfig, ScrapeProgressCallback, Scraper,
    Sleeper, Spa2MdError, WaitStrategy,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs through the test harness; `RUST_LOG` overrides.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("edgequake_spa2md=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Records page-level progress events as `"<kind> <url>"`.
#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ScrapeProgressCallback for EventLog {
    fn on_page_complete(&self, _index: usize, _total: usize, url: &str, _len: usize) {
        self.0.lock().unwrap().push(format!("complete {url}"));
    }

    fn on_page_error(&self, _index: usize, _total: usize, url: &str, _error: &str) {
        self.0.lock().unwrap().push(format!("error {url}"));
    }
}

#[derive(Debug, Default)]
struct DriverLog {
    gotos: Vec<String>,
    reloads: usize,
    closes: usize,
}

/// Serves pages from a map. URLs containing `/broken` always time out;
/// unknown URLs fail navigation. The first `flaky` navigations time out.
struct SiteDriver {
    pages: HashMap<String, String>,
    current: Option<String>,
    flaky: usize,
    log: Arc<Mutex<DriverLog>>,
}

impl SiteDriver {
    fn new(pages: &[(&str, &str)]) -> (Self, Arc<Mutex<DriverLog>>) {
        let log = Arc::new(Mutex::new(DriverLog::default()));
        let driver = Self {
            pages: pages
                .iter()
                .map(|(u, h)| (u.to_string(), h.to_string()))
                .collect(),
            current: None,
            flaky: 0,
            log: log.clone(),
        };
        (driver, log)
    }

    fn flaky(mut self, n: usize) -> Self {
        self.flaky = n;
        self
    }
}

#[async_trait]
impl PageDriver for SiteDriver {
    async fn goto(&mut self, url: &str, _: WaitStrategy, _: Duration) -> Result<(), DriverError> {
        self.log.lock().unwrap().gotos.push(url.to_string());
        if self.flaky > 0 {
            self.flaky -= 1;
            return Err(DriverError::Timeout { ms: 60_000 });
        }
        if url.contains("/broken") {
            return Err(DriverError::Timeout { ms: 60_000 });
        }
        if !self.pages.contains_key(url) {
            return Err(DriverError::Navigation(format!("404 for {url}")));
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_timeout(&mut self, _: Duration) {}

    async fn title(&mut self) -> Result<String, DriverError> {
        Ok(self.current.clone().unwrap_or_default())
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.current
            .as_ref()
            .and_then(|u| self.pages.get(u))
            .cloned()
            .ok_or_else(|| DriverError::Content("no page loaded".into()))
    }

    async fn reload(&mut self, _: Duration) -> Result<(), DriverError> {
        self.log.lock().unwrap().reloads += 1;
        Err(DriverError::Timeout { ms: 60_000 })
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    fn pauses(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.0.lock().unwrap().push(d);
    }
}

const INTRO: &str = r#"<html><head><title>Intro</title></head><body>
<nav><a href="/guide/hidden">menu</a></nav>
<main>
  <h1>Intro</h1>
  <p>This guide walks through installing the toolkit and rendering a first page.</p>
  <a href="/guide/setup">Setup</a>
  <a href="/guide/empty">Empty</a>
  <a href="/blog/news">News</a>
  <a href="https://elsewhere.test/guide/x">Elsewhere</a>
</main></body></html>"#;

const SETUP: &str = r#"<main><h1>Setup</h1>
<pre><code class="language-bash">cargo install spa2md
spa2md --help</code></pre>
<p>Run the binary once to check that Chromium is discoverable.</p>
<a href="/guide/intro">Back</a></main>"#;

const EMPTY: &str = "<main><p>tiny</p></main>";

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

// ── Conversion scenarios ─────────────────────────────────────────────────────

#[test]
fn heading_and_inline_emphasis() {
    let md = html_to_markdown(
        "<h1>Title</h1><p>Hello <strong>world</strong></p>",
        &RenderOptions::default(),
    );
    assert_eq!(md, "# Title\n\nHello **world**\n");
}

#[test]
fn table_cell_pipes_are_escaped() {
    let md = html_to_markdown(
        "<table><tr><th>A</th><th>B</th></tr><tr><td>1|2</td><td>x</td></tr></table>",
        &RenderOptions::default(),
    );
    assert!(md.contains("| A | B |\n| --- | --- |\n"), "got: {md}");
    assert!(md.contains("| 1\\|2 | x |"), "got: {md}");
}

#[test]
fn ragged_table_rows_match_header_width() {
    let md = html_to_markdown(
        "<table><tr><th>Prop</th><th>Type</th><th>Default</th></tr>\
         <tr><td>size</td></tr>\
         <tr><td>a</td><td>b</td><td>c</td><td>d</td></tr></table>",
        &RenderOptions::default(),
    );
    for line in md.lines().filter(|l| l.starts_with('|')) {
        let cells = line.matches(" | ").count() + 1;
        assert_eq!(cells, 3, "row {line:?} in {md}");
    }
}

#[test]
fn percent_encoded_code_example_is_decoded() {
    let md = html_to_markdown(
        r#"<td-code-block lang="javascript"><pre>const%20x%20%3D%201%3B</pre></td-code-block>"#,
        &RenderOptions::default(),
    );
    assert!(md.contains("```javascript\nconst x = 1;\n```"), "got: {md}");
}

#[test]
fn malformed_percent_payload_is_kept_verbatim() {
    let md = html_to_markdown(
        r#"<td-code-block lang="js"><pre>100%25 done %E4%ZZ</pre></td-code-block>"#,
        &RenderOptions::default(),
    );
    assert!(md.contains("```js\n"), "got: {md}");
    assert!(!md.contains('\u{FFFD}'), "got: {md}");
}

#[test]
fn code_containing_fences_stays_one_block() {
    let md = html_to_markdown(
        r#"<td-code-block lang="md"><pre>```js%0Ax%0A```</pre></td-code-block><p>after</p>"#,
        &RenderOptions::default(),
    );
    assert_eq!(md, "````md\n```js\nx\n```\n````\n\nafter\n");
    assert_eq!(normalize(&md), md);
}

#[test]
fn skipped_elements_render_nothing() {
    let md = html_to_markdown(
        "<p>kept</p><script>alert(1)</script><style>p{}</style><nav>menu</nav>\
         <button>Click</button><iframe src=\"x\"></iframe>",
        &RenderOptions::default(),
    );
    assert_eq!(md, "kept\n");
}

#[test]
fn heading_anchor_symbols_are_stripped() {
    let md = html_to_markdown(
        "<h2>Getting Started <a href=\"#getting-started\">#</a></h2>",
        &RenderOptions::default(),
    );
    assert_eq!(md, "## GettingStarted\n");

    let collapse = RenderOptions {
        heading_spaces: edgequake_spa2md::HeadingSpaces::Collapse,
        ..RenderOptions::default()
    };
    let md = html_to_markdown("<h2>Getting   Started ¶</h2>", &collapse);
    assert_eq!(md, "## Getting Started\n");
}

#[test]
fn normalization_is_idempotent() {
    let md = html_to_markdown(
        "<h2>API</h2>\n\n\n<p>  text  </p><pre><code>  indented\n\n\n  block</code></pre>\
         <ul><li>one</li><li>two</li></ul><blockquote><p>q</p></blockquote>",
        &RenderOptions::default(),
    );
    assert_eq!(normalize(&md), md);
    assert!(md.contains("  indented\n\n\n  block"), "got: {md}");
}

// ── Retry loop ───────────────────────────────────────────────────────────────

#[test]
fn backoff_schedule_doubles_from_one_second() {
    let delays: Vec<u64> = (1..=4).map(|n| backoff_delay(n).as_secs()).collect();
    assert_eq!(delays, vec![1, 2, 4, 8]);
}

#[test]
fn timeout_then_success_reloads_and_backs_off_once() {
    let (driver, log) = SiteDriver::new(&[("https://docs.test/a", "<p>second try</p>")]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let config = FetchConfig {
        max_retries: 2,
        ..Default::default()
    };
    let mut fetcher = Fetcher::new(driver.flaky(1), config).with_sleeper(sleeper.clone());

    let outcome = tokio_test::block_on(fetcher.fetch("https://docs.test/a"));

    let page = outcome.result.expect("second attempt succeeds");
    assert_eq!(page.html, "<p>second try</p>");
    assert_eq!(log.lock().unwrap().reloads, 1);
    assert_eq!(sleeper.pauses(), vec![Duration::from_secs(1)]);
    assert!(matches!(
        outcome.attempts[0].outcome,
        AttemptOutcome::RetryableFailure {
            reload_attempted: true,
            ..
        }
    ));
    assert!(outcome.attempts[1].outcome.is_success());
}

#[tokio::test]
async fn navigation_errors_retry_without_reload() {
    let (driver, log) = SiteDriver::new(&[]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut fetcher = Fetcher::new(driver, FetchConfig::default()).with_sleeper(sleeper.clone());

    let outcome = fetcher.fetch("https://docs.test/missing").await;

    assert!(outcome.result.is_err());
    assert_eq!(outcome.attempts.len(), 3);
    assert_eq!(log.lock().unwrap().reloads, 0);
    assert_eq!(
        sleeper.pauses(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

// ── Scrape runs ──────────────────────────────────────────────────────────────

fn site() -> (SiteDriver, Arc<Mutex<DriverLog>>) {
    SiteDriver::new(&[
        ("https://docs.test/guide/intro", INTRO),
        ("https://docs.test/guide/setup", SETUP),
        ("https://docs.test/guide/empty", EMPTY),
    ])
}

#[tokio::test]
async fn scrape_writes_html_markdown_and_summary() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (driver, log) = site();
    let sleeper = Arc::new(RecordingSleeper::default());
    let config = ScrapeConfig::builder()
        .start_urls([
            "https://docs.test/guide/intro",
            "https://docs.test/guide/setup",
            "https://docs.test/guide/broken",
            "https://docs.test/guide/empty",
        ])
        .rate_limit_secs(0.25)
        .max_retries(2)
        .build()
        .unwrap();

    let report = Scraper::new(driver, config, dir.path())
        .with_sleeper(sleeper.clone())
        .run()
        .await
        .unwrap();

    let out = dir.path();
    assert_eq!(read(&out.join("html/guide/intro.html")), INTRO);
    let intro = read(&out.join("markdown/guide/intro.md"));
    assert!(intro.starts_with("# Intro\n\nThis guide walks through"), "got: {intro}");
    assert_eq!(intro.matches("# Intro").count(), 1);
    assert!(!intro.contains("menu"));

    let setup = read(&out.join("markdown/guide/setup.md"));
    assert!(
        setup.contains("```bash\ncargo install spa2md\nspa2md --help\n```"),
        "got: {setup}"
    );

    assert!(out.join("html/guide/empty.html").exists());
    assert!(!out.join("markdown/guide/empty.md").exists());
    assert!(!out.join("html/guide/broken.html").exists());

    let summary = load_summary(&out.join(SUMMARY_FILE)).unwrap();
    assert_eq!(summary, report.summary);
    let saved: Vec<&str> = summary.success.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        saved,
        vec!["guide/intro.html", "guide/setup.html", "guide/empty.html"]
    );
    assert_eq!(summary.success[0].html_length, INTRO.chars().count());
    assert_eq!(summary.failed, vec!["https://docs.test/guide/broken".to_string()]);
    assert_eq!(
        summary.extraction_failed,
        vec!["https://docs.test/guide/empty".to_string()]
    );

    // Rate limit between pages only; one backoff for the broken page.
    assert_eq!(
        sleeper.pauses(),
        vec![
            Duration::from_millis(250),
            Duration::from_millis(250),
            Duration::from_secs(1),
            Duration::from_millis(250),
        ]
    );
    let log = log.lock().unwrap();
    assert_eq!(log.closes, 1);
    assert_eq!(log.reloads, 1);
    assert_eq!(report.errors.len(), 2);
}

#[tokio::test]
async fn every_page_reports_exactly_one_outcome() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (driver, _log) = site();
    let events = Arc::new(EventLog::default());
    let config = ScrapeConfig::builder()
        .start_urls([
            "https://docs.test/guide/intro",
            "https://docs.test/guide/empty",
            "https://docs.test/guide/broken",
        ])
        .max_retries(1)
        .progress_callback(events.clone())
        .build()
        .unwrap();

    let report = Scraper::new(driver, config, dir.path())
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .run()
        .await
        .unwrap();

    assert_eq!(
        events.events(),
        vec![
            "complete https://docs.test/guide/intro",
            "error https://docs.test/guide/empty",
            "error https://docs.test/guide/broken",
        ]
    );
    assert_eq!(
        report.summary.extraction_failed,
        vec!["https://docs.test/guide/empty".to_string()]
    );
}

#[tokio::test]
async fn scrape_follows_links_breadth_first() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (driver, log) = site();
    let config = ScrapeConfig::builder()
        .start_urls(["https://docs.test/guide/intro"])
        .rate_limit_secs(0.0)
        .follow_links(LinkPolicy {
            include: vec!["/guide/".into()],
            ..Default::default()
        })
        .build()
        .unwrap();

    let report = Scraper::new(driver, config, dir.path())
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .run()
        .await
        .unwrap();

    // Links are discovered over the whole document, nav included. The back
    // link to intro is not revisited.
    let log = log.lock().unwrap();
    assert_eq!(
        log.gotos,
        vec![
            "https://docs.test/guide/intro",
            "https://docs.test/guide/hidden",
            "https://docs.test/guide/hidden",
            "https://docs.test/guide/hidden",
            "https://docs.test/guide/setup",
            "https://docs.test/guide/empty",
        ]
    );
    assert_eq!(report.summary.success.len(), 3);
    assert_eq!(report.summary.failed, vec!["https://docs.test/guide/hidden".to_string()]);
    assert_eq!(log.closes, 1);
}

#[tokio::test]
async fn page_limit_stops_the_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, _log) = site();
    let config = ScrapeConfig::builder()
        .start_urls(["https://docs.test/guide/intro"])
        .follow_links(LinkPolicy {
            include: vec!["/guide/".into()],
            max_pages: 1,
            ..Default::default()
        })
        .build()
        .unwrap();

    let report = Scraper::new(driver, config, dir.path())
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .run()
        .await
        .unwrap();
    assert_eq!(report.pages.len(), 1);
    assert!(report.summary.failed.is_empty());
}

#[tokio::test]
async fn html_only_skips_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, _log) = site();
    let config = ScrapeConfig::builder()
        .start_urls(["https://docs.test/guide/intro"])
        .build()
        .unwrap();

    Scraper::new(driver, config, dir.path())
        .with_sleeper(Arc::new(RecordingSleeper::default()))
        .html_only()
        .run()
        .await
        .unwrap();
    assert!(dir.path().join("html/guide/intro.html").exists());
    assert!(!dir.path().join("markdown").exists());
}

#[tokio::test]
async fn invalid_start_url_still_closes_driver() {
    let dir = tempfile::tempdir().unwrap();
    let (driver, log) = site();
    let config = ScrapeConfig::builder()
        .start_urls(["ftp://docs.test/file"])
        .build()
        .unwrap();

    let err = Scraper::new(driver, config, dir.path()).run().await.unwrap_err();
    assert!(matches!(err, Spa2MdError::InvalidUrl { .. }));
    let log = log.lock().unwrap();
    assert!(log.gotos.is_empty());
    assert_eq!(log.closes, 1);
}
