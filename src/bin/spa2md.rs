//! CLI binary for edgequake-spa2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScrapeConfig` / `RenderOptions` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_spa2md::{
    convert_dir, convert_file, extract_markdown, ChromeDriver, ContentProfile, Engine,
    HeadingSpaces, HttpDriver, PageDriver, ProfileSpec, ProgressCallback,
    RenderOptions, RunSummary, ScrapeConfig, ScrapeProgressCallback, Scraper, WaitStrategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. The bar length grows when link following discovers new pages.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Launching browser…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            retries: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scraping");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Shorten `s` to at most `max` characters, on a char boundary.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

impl ScrapeProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scraping {total} start URLs…"))
        ));
    }

    fn on_page_start(&self, index: usize, total: usize, url: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_length(total as u64);
        self.bar.set_message(truncate(url, 60));
    }

    fn on_retry(&self, url: &str, attempt: u32, max_retries: u32, error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} retry {attempt}/{max_retries}  {}  {}",
            yellow("↻"),
            truncate(url, 60),
            dim(&truncate(error, 60)),
        ));
    }

    fn on_page_complete(&self, index: usize, total: usize, url: &str, html_length: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}  {}  {}",
            green("✓"),
            index,
            total,
            truncate(url, 70),
            dim(&format!("{html_length:>7} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, index: usize, total: usize, url: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}  {}  {}",
            red("✗"),
            index,
            total,
            truncate(url, 70),
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        let retries = self.retries.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pages fetched  {}",
                green("✔"),
                bold(&success_count.to_string()),
                dim(&format!("({retries} retries)"))
            );
        } else {
            eprintln!(
                "{} {}/{} pages fetched  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scrape two Vant pages into ./output
  spa2md scrape --profile vant \
    'https://vant-ui.github.io/vant/#/zh-CN/button' \
    'https://vant-ui.github.io/vant/#/zh-CN/cell'

  # Use a JSON site config (rate_limit + playwright_config + start_urls)
  spa2md scrape --config tdesign.json --profile tdesign --out tdesign-docs

  # Crawl a documentation section, following in-section links
  spa2md scrape --follow --include /miniprogram/dev/ --exclude /community/ \
    --max-pages 200 https://developers.weixin.qq.com/miniprogram/dev/framework/

  # Static site: no browser needed
  spa2md scrape --engine http https://docs.rs/regex/latest/regex/

  # Re-run extraction over saved HTML
  spa2md convert output/html -o output/markdown --profile vant

  # Convert one saved page to stdout
  spa2md convert output/html/zh-CN/button.html

OUTPUT LAYOUT:
  <out>/html/<path>.html        rendered markup per page
  <out>/markdown/<path>.md      extracted Markdown
  <out>/scrape_summary.json     {success: [...], failed: [...]}

PROFILES:
  generic   first of .markdown-section, .content-area, article, .doc-content,
            .main-content, main, body
  vant      .van-doc-content, simulator removed, title from <h1>
  tdesign   td-doc-content sections (DOC, 示例, API), TOC removed

ENVIRONMENT VARIABLES:
  CHROME           Path to the Chrome/Chromium binary
  RUST_LOG         Override the log filter (e.g. edgequake_spa2md=debug)
"#;

/// Render JavaScript documentation sites and convert them to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "spa2md",
    version,
    about = "Render JavaScript documentation sites and convert them to Markdown",
    long_about = "Fetch single-page-application documentation with a headless browser, \
retrying flaky pages with exponential backoff, and convert the rendered pages to clean \
Markdown that keeps code samples, tables and headings intact.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SPA2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SPA2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch pages, save their HTML and Markdown, and write a run summary.
    Scrape(ScrapeArgs),
    /// Convert saved HTML (one file or a directory tree) to Markdown.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// URLs to fetch, in order. Appended to the config file's start_urls.
    urls: Vec<String>,

    /// JSON site config (rate_limit, playwright_config, start_urls, …).
    #[arg(short, long, env = "SPA2MD_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory.
    #[arg(short, long, env = "SPA2MD_OUT", default_value = "output")]
    out: PathBuf,

    /// Rendering engine.
    #[arg(long, env = "SPA2MD_ENGINE", value_enum, default_value = "chrome")]
    engine: EngineArg,

    #[command(flatten)]
    extract: ExtractArgs,

    /// Seconds between consecutive pages.
    #[arg(long, env = "SPA2MD_RATE_LIMIT")]
    rate_limit: Option<f64>,

    /// Total attempts per URL.
    #[arg(long, env = "SPA2MD_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Navigation timeout in milliseconds.
    #[arg(long, env = "SPA2MD_TIMEOUT")]
    timeout: Option<u64>,

    /// Fixed pause after navigation, in milliseconds.
    #[arg(long, env = "SPA2MD_EXTRA_WAIT")]
    extra_wait: Option<u64>,

    /// When navigation counts as finished.
    #[arg(long, env = "SPA2MD_WAIT_UNTIL", value_enum)]
    wait_until: Option<WaitArg>,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Follow links breadth-first from the start URLs.
    #[arg(long)]
    follow: bool,

    /// Only follow links whose path contains this (repeatable).
    #[arg(long, requires = "follow")]
    include: Vec<String>,

    /// Never follow links whose URL contains this (repeatable).
    #[arg(long, requires = "follow")]
    exclude: Vec<String>,

    /// Upper bound on pages fetched when following links.
    #[arg(long, requires = "follow")]
    max_pages: Option<usize>,

    /// Save raw HTML only; skip Markdown extraction.
    #[arg(long)]
    html_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "SPA2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// A saved HTML file or a directory of them.
    input: PathBuf,

    /// Output file or directory. Files default to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    extract: ExtractArgs,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Content profile: generic, vant, tdesign.
    #[arg(short, long, env = "SPA2MD_PROFILE")]
    profile: Option<String>,

    /// Heading whitespace handling.
    #[arg(long, value_enum, default_value = "remove")]
    heading_spaces: HeadingArg,

    /// Drop elements whose class contains this fragment (repeatable).
    #[arg(long)]
    skip_class: Vec<String>,

    /// Drop elements with this tag name (repeatable).
    #[arg(long)]
    skip_tag: Vec<String>,
}

impl ExtractArgs {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            heading_spaces: self.heading_spaces.into(),
            skip_tags: self.skip_tag.clone(),
            skip_classes: self.skip_class.clone(),
            ..RenderOptions::default()
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Chrome,
    Http,
}

impl From<EngineArg> for Engine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Chrome => Engine::Chrome,
            EngineArg::Http => Engine::Http,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum WaitArg {
    Networkidle,
    Load,
    Domcontentloaded,
}

impl From<WaitArg> for WaitStrategy {
    fn from(v: WaitArg) -> Self {
        match v {
            WaitArg::Networkidle => WaitStrategy::NetworkIdle,
            WaitArg::Load => WaitStrategy::Load,
            WaitArg::Domcontentloaded => WaitStrategy::DomContentLoaded,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum HeadingArg {
    Remove,
    Collapse,
}

impl From<HeadingArg> for HeadingSpaces {
    fn from(v: HeadingArg) -> Self {
        match v {
            HeadingArg::Remove => HeadingSpaces::Remove,
            HeadingArg::Collapse => HeadingSpaces::Collapse,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the progress bar is
    // active; the bar reports every page already.
    let show_progress = match &cli.command {
        Command::Scrape(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Convert(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Scrape(args) => scrape(args, cli.quiet, show_progress).await,
        Command::Convert(args) => convert(args, cli.quiet).await,
    }
}

async fn scrape(args: ScrapeArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ScrapeProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args, progress_cb)?;
    if config.start_urls.is_empty() {
        anyhow::bail!("No URLs to scrape: pass URLs or a --config with start_urls");
    }

    let driver: Box<dyn PageDriver> = match Engine::from(args.engine) {
        Engine::Chrome => Box::new(
            ChromeDriver::launch(config.fetch.headless, Some(&config.user_agent))
                .await
                .context("Failed to start Chromium")?,
        ),
        Engine::Http => Box::new(
            HttpDriver::new(Some(&config.user_agent)).context("Failed to build HTTP client")?,
        ),
    };

    let mut scraper = Scraper::new(driver, config, &args.out)
        .with_render_options(args.extract.render_options());
    if args.html_only {
        scraper = scraper.html_only();
    }
    let report = scraper.run().await.context("Scrape failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&report.summary)
            .context("Failed to serialise summary")?;
        println!("{json}");
    } else if !quiet {
        let summary = &report.summary;
        eprintln!(
            "{}  {} saved  {} failed  {} without content  {}ms  →  {}",
            if summary.failed.is_empty() && summary.extraction_failed.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            summary.success.len(),
            summary.failed.len(),
            summary.extraction_failed.len(),
            report.total_duration_ms,
            bold(&args.out.display().to_string()),
        );
        for line in problem_lines(summary) {
            eprintln!("{line}");
        }
    }
    Ok(())
}

/// One line per URL that failed to fetch or yielded no Markdown.
fn problem_lines(summary: &RunSummary) -> Vec<String> {
    let failed = summary
        .failed
        .iter()
        .map(|url| format!("   {} {}", red("✗"), url));
    let empty = summary
        .extraction_failed
        .iter()
        .map(|url| format!("   {} {}  {}", yellow("∅"), url, dim("(no content)")));
    failed.chain(empty).collect()
}

/// Map CLI args (over an optional config file) to `ScrapeConfig`.
fn build_config(args: &ScrapeArgs, progress: Option<ProgressCallback>) -> Result<ScrapeConfig> {
    let mut config = match args.config {
        Some(ref path) => ScrapeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ScrapeConfig::default(),
    };

    config.start_urls.extend(args.urls.iter().cloned());
    if let Some(secs) = args.rate_limit {
        config.rate_limit_secs = secs;
    }
    if let Some(n) = args.max_retries {
        config.fetch.max_retries = n;
    }
    if let Some(ms) = args.timeout {
        config.fetch.timeout_ms = ms;
    }
    if let Some(ms) = args.extra_wait {
        config.fetch.extra_wait_ms = ms;
    }
    if let Some(w) = args.wait_until {
        config.fetch.wait_until = w.into();
    }
    if args.headed {
        config.fetch.headless = false;
    }
    if let Some(ref name) = args.extract.profile {
        config.profile = ProfileSpec::Named(name.clone());
    }
    if args.follow {
        let mut policy = config.follow_links.take().unwrap_or_default();
        policy.include.extend(args.include.iter().cloned());
        policy.exclude.extend(args.exclude.iter().cloned());
        if let Some(n) = args.max_pages {
            policy.max_pages = n;
        }
        config.follow_links = Some(policy);
    }
    config.progress_callback = progress;

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn convert(args: ConvertArgs, quiet: bool) -> Result<()> {
    let profile = resolve_profile(args.extract.profile.as_deref())?;
    let options = args.extract.render_options();

    if args.input.is_dir() {
        let Some(ref dst) = args.output else {
            anyhow::bail!("Converting a directory needs --output <DIR>");
        };
        let started = Instant::now();
        let stats = convert_dir(&args.input, dst, &profile, &options)
            .await
            .context("Conversion failed")?;
        if !quiet {
            eprintln!(
                "{}  {} converted  {} failed  {}ms  →  {}",
                if stats.failed == 0 { green("✔") } else { cyan("⚠") },
                stats.converted,
                stats.failed,
                started.elapsed().as_millis(),
                bold(&dst.display().to_string()),
            );
        }
        return Ok(());
    }

    match args.output {
        Some(ref dst) => {
            convert_file(&args.input, dst, &profile, &options)
                .await
                .context("Conversion failed")?;
            if !quiet {
                eprintln!("{}  {}", green("✔"), bold(&dst.display().to_string()));
            }
        }
        None => {
            let markdown = convert_to_string(&args.input, &profile, &options).await?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(markdown.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

async fn convert_to_string(
    path: &Path,
    profile: &ContentProfile,
    options: &RenderOptions,
) -> Result<String> {
    let html = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let label = path.display().to_string();
    extract_markdown(&html, &label, profile, options).context("Conversion failed")
}

fn resolve_profile(name: Option<&str>) -> Result<ContentProfile> {
    let spec = ProfileSpec::Named(name.unwrap_or("generic").to_string());
    let profile = spec.resolve()?;
    profile.validate()?;
    Ok(profile)
}
