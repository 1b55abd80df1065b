//! Configuration types for scraping and Markdown rendering.
//!
//! All run behaviour is controlled through [`ScrapeConfig`], built via its
//! [`ScrapeConfigBuilder`] or loaded from the JSON layout used by the site
//! configs (`rate_limit` + `playwright_config`). Renderer knobs live in
//! [`RenderOptions`]. Every value is passed explicitly into the component
//! that needs it; nothing is read from process-wide state, so two runs with
//! different configs can share a process (and a test binary).

use crate::error::Spa2MdError;
use crate::pipeline::extract::ContentProfile;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Desktop Chrome user agent sent by both drivers.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for a scrape run.
///
/// # Example
/// ```rust
/// use edgequake_spa2md::{ScrapeConfig, WaitStrategy};
///
/// let config = ScrapeConfig::builder()
///     .rate_limit_secs(1.0)
///     .wait_until(WaitStrategy::Load)
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.fetch.max_retries, 2);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Fixed delay between two consecutive page fetches, in seconds. Default: 0.5.
    ///
    /// Applied between consecutive pages regardless of outcome, never before
    /// the first one. A failing site gets the same spacing as a healthy one.
    #[serde(rename = "rate_limit", default = "default_rate_limit")]
    pub rate_limit_secs: f64,

    /// Browser / page-load settings.
    #[serde(rename = "playwright_config", default)]
    pub fetch: FetchConfig,

    /// URLs to fetch, in order.
    #[serde(default)]
    pub start_urls: Vec<String>,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Follow links breadth-first from the start URLs. Default: off.
    #[serde(default)]
    pub follow_links: Option<LinkPolicy>,

    /// Content-root profile: a built-in name or an inline definition.
    #[serde(default)]
    pub profile: ProfileSpec,

    /// Progress events; never serialised.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

fn default_rate_limit() -> f64 {
    0.5
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            rate_limit_secs: default_rate_limit(),
            fetch: FetchConfig::default(),
            start_urls: Vec::new(),
            user_agent: default_user_agent(),
            follow_links: None,
            profile: ProfileSpec::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScrapeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeConfig")
            .field("rate_limit_secs", &self.rate_limit_secs)
            .field("fetch", &self.fetch)
            .field("start_urls", &self.start_urls)
            .field("user_agent", &self.user_agent)
            .field("follow_links", &self.follow_links)
            .field("profile", &self.profile)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ScrapeProgressCallback>"),
            )
            .finish()
    }
}

impl ScrapeConfig {
    /// Create a new builder for `ScrapeConfig`.
    pub fn builder() -> ScrapeConfigBuilder {
        ScrapeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a JSON config file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Spa2MdError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Spa2MdError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw).map_err(|source| Spa2MdError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Delay applied between two consecutive pages. Saturates at
    /// [`Duration::MAX`] for values too large to represent.
    pub fn rate_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Check the constraints the builder enforces.
    pub fn validate(&self) -> Result<(), Spa2MdError> {
        if !self.rate_limit_secs.is_finite()
            || self.rate_limit_secs < 0.0
            || Duration::try_from_secs_f64(self.rate_limit_secs).is_err()
        {
            return Err(Spa2MdError::InvalidConfig(format!(
                "rate_limit must be a non-negative number of seconds, got {}",
                self.rate_limit_secs
            )));
        }
        if self.fetch.max_retries == 0 {
            return Err(Spa2MdError::InvalidConfig(
                "max_retries must be ≥ 1".into(),
            ));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(Spa2MdError::InvalidConfig("timeout must be > 0 ms".into()));
        }
        if let Some(ref policy) = self.follow_links {
            if policy.max_pages == 0 {
                return Err(Spa2MdError::InvalidConfig(
                    "follow_links.max_pages must be ≥ 1".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`ScrapeConfig`].
#[derive(Debug)]
pub struct ScrapeConfigBuilder {
    config: ScrapeConfig,
}

impl ScrapeConfigBuilder {
    pub fn rate_limit_secs(mut self, secs: f64) -> Self {
        self.config.rate_limit_secs = secs;
        self
    }

    pub fn wait_until(mut self, strategy: WaitStrategy) -> Self {
        self.config.fetch.wait_until = strategy;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.fetch.timeout_ms = ms;
        self
    }

    pub fn extra_wait_ms(mut self, ms: u64) -> Self {
        self.config.fetch.extra_wait_ms = ms;
        self
    }

    pub fn headless(mut self, v: bool) -> Self {
        self.config.fetch.headless = v;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.fetch.max_retries = n;
        self
    }

    pub fn start_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.start_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn follow_links(mut self, policy: LinkPolicy) -> Self {
        self.config.follow_links = Some(policy);
        self
    }

    pub fn profile(mut self, profile: ProfileSpec) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScrapeConfig, Spa2MdError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Fetch settings ───────────────────────────────────────────────────────

/// Page-load settings, serialised under `playwright_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Page-load completion heuristic. Default: network idle.
    #[serde(default)]
    pub wait_until: WaitStrategy,

    /// Per-navigation timeout in milliseconds. Default: 60 000.
    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fixed pause after navigation, in milliseconds. Default: 2 000.
    ///
    /// Single-page applications often mount their content after the load
    /// event has fired; this pause lets that deferred rendering settle
    /// before the markup is captured.
    #[serde(rename = "extra_wait", default = "default_extra_wait_ms")]
    pub extra_wait_ms: u64,

    /// Run the browser without a window. Default: true.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Total attempts per URL (first try included). Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_extra_wait_ms() -> u64 {
    2_000
}

fn default_headless() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            wait_until: WaitStrategy::default(),
            timeout_ms: default_timeout_ms(),
            extra_wait_ms: default_extra_wait_ms(),
            headless: default_headless(),
            max_retries: default_max_retries(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn extra_wait(&self) -> Duration {
        Duration::from_millis(self.extra_wait_ms)
    }
}

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    /// No network activity for a short window. (default)
    #[default]
    #[serde(rename = "networkidle")]
    NetworkIdle,
    /// The `load` event has fired.
    Load,
    /// The `DOMContentLoaded` event has fired.
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaitStrategy::NetworkIdle => "networkidle",
            WaitStrategy::Load => "load",
            WaitStrategy::DomContentLoaded => "domcontentloaded",
        })
    }
}

impl std::str::FromStr for WaitStrategy {
    type Err = Spa2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "networkidle" | "network-idle" => Ok(WaitStrategy::NetworkIdle),
            "load" => Ok(WaitStrategy::Load),
            "domcontentloaded" | "dom-content-loaded" => Ok(WaitStrategy::DomContentLoaded),
            other => Err(Spa2MdError::InvalidConfig(format!(
                "unknown wait strategy '{other}' (expected networkidle, load or domcontentloaded)"
            ))),
        }
    }
}

// ── Link following ───────────────────────────────────────────────────────

/// Breadth-first link following from the start URLs.
///
/// A discovered link is queued when it matches at least one `include`
/// substring (or `include` is empty), matches no `exclude` substring, and
/// (with `same_host`) shares the host of the URL it was found on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPolicy {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_same_host")]
    pub same_host: bool,
    /// Upper bound on pages fetched, start URLs included. Default: 200.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_same_host() -> bool {
    true
}

fn default_max_pages() -> usize {
    200
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            same_host: default_same_host(),
            max_pages: default_max_pages(),
        }
    }
}

impl LinkPolicy {
    pub fn allows(&self, link: &url::Url, found_on: &url::Url) -> bool {
        if !matches!(link.scheme(), "http" | "https") {
            return false;
        }
        if self.same_host && link.host_str() != found_on.host_str() {
            return false;
        }
        let s = link.as_str();
        if self.exclude.iter().any(|p| s.contains(p.as_str())) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| link.path().contains(p.as_str()))
    }
}

// ── Profiles ─────────────────────────────────────────────────────────────

/// Either the name of a built-in [`ContentProfile`] or an inline one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileSpec {
    Named(String),
    Custom(Box<ContentProfile>),
}

impl Default for ProfileSpec {
    fn default() -> Self {
        ProfileSpec::Named("generic".into())
    }
}

impl ProfileSpec {
    /// Resolve to a concrete profile.
    pub fn resolve(&self) -> Result<ContentProfile, Spa2MdError> {
        match self {
            ProfileSpec::Named(name) => ContentProfile::by_name(name).ok_or_else(|| {
                Spa2MdError::InvalidConfig(format!(
                    "unknown profile '{name}' (expected one of: {})",
                    ContentProfile::BUILTIN.join(", ")
                ))
            }),
            ProfileSpec::Custom(profile) => Ok((**profile).clone()),
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// How whitespace inside heading text is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingSpaces {
    /// Remove every whitespace character. (default)
    ///
    /// Suits CJK documentation, where headings carry no meaningful spaces
    /// and the anchor decoration injects stray ones.
    #[default]
    Remove,
    /// Collapse whitespace runs to a single space.
    Collapse,
}

/// Knobs for the tag-dispatch renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    #[serde(default)]
    pub heading_spaces: HeadingSpaces,

    /// Extra tag names rendered to nothing, on top of the built-in skip set.
    #[serde(default)]
    pub skip_tags: Vec<String>,

    /// Elements whose `class` attribute contains any of these fragments
    /// render to nothing.
    #[serde(default)]
    pub skip_classes: Vec<String>,

    /// Custom container tags that hold percent-encoded code examples.
    #[serde(default = "default_code_example_tags")]
    pub code_example_tags: Vec<String>,
}

fn default_code_example_tags() -> Vec<String> {
    vec!["td-code-block".to_string()]
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            heading_spaces: HeadingSpaces::default(),
            skip_tags: Vec::new(),
            skip_classes: Vec::new(),
            code_example_tags: default_code_example_tags(),
        }
    }
}

impl RenderOptions {
    /// Options extended with a profile's skip lists and example tags.
    pub fn merged_with(&self, profile: &ContentProfile) -> RenderOptions {
        let mut merged = self.clone();
        extend_unique(&mut merged.skip_tags, &profile.skip_tags);
        extend_unique(&mut merged.skip_classes, &profile.skip_classes);
        extend_unique(&mut merged.code_example_tags, &profile.code_example_tags);
        merged
    }
}

fn extend_unique(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_configs() {
        let c = ScrapeConfig::default();
        assert_eq!(c.rate_limit_secs, 0.5);
        assert_eq!(c.fetch.wait_until, WaitStrategy::NetworkIdle);
        assert_eq!(c.fetch.timeout_ms, 60_000);
        assert_eq!(c.fetch.extra_wait_ms, 2_000);
        assert!(c.fetch.headless);
        assert_eq!(c.fetch.max_retries, 3);
    }

    #[test]
    fn parses_playwright_config_layout() {
        let json = r#"{
            "rate_limit": 1.0,
            "start_urls": ["https://vant-ui.github.io/vant/#/zh-CN/button"],
            "playwright_config": {
                "wait_until": "domcontentloaded",
                "timeout": 30000,
                "extra_wait": 1000,
                "headless": false,
                "max_retries": 2
            }
        }"#;
        let c = ScrapeConfig::from_json_str(json).unwrap();
        assert_eq!(c.rate_limit_secs, 1.0);
        assert_eq!(c.fetch.wait_until, WaitStrategy::DomContentLoaded);
        assert_eq!(c.fetch.timeout_ms, 30_000);
        assert_eq!(c.fetch.extra_wait_ms, 1_000);
        assert!(!c.fetch.headless);
        assert_eq!(c.fetch.max_retries, 2);
        assert_eq!(c.start_urls.len(), 1);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let c = ScrapeConfig::from_json_str("{}").unwrap();
        assert_eq!(c.fetch, FetchConfig::default());
        assert_eq!(c.profile, ProfileSpec::Named("generic".into()));
    }

    #[test]
    fn builder_rejects_zero_retries() {
        let err = ScrapeConfig::builder().max_retries(0).build().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn builder_rejects_negative_rate_limit() {
        assert!(ScrapeConfig::builder().rate_limit_secs(-1.0).build().is_err());
    }

    #[test]
    fn oversized_rate_limit_is_rejected_not_panicking() {
        let c = ScrapeConfig::from_json_str(r#"{"start_urls": [], "rate_limit": 1e20}"#).unwrap();
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("rate_limit"), "{err}");
        assert_eq!(c.rate_limit(), Duration::MAX);
        assert!(ScrapeConfig::builder().rate_limit_secs(1e20).build().is_err());
        assert!(ScrapeConfig::builder().rate_limit_secs(f64::NAN).build().is_err());
    }

    #[test]
    fn wait_strategy_from_str() {
        assert_eq!("networkidle".parse::<WaitStrategy>().unwrap(), WaitStrategy::NetworkIdle);
        assert_eq!("LOAD".parse::<WaitStrategy>().unwrap(), WaitStrategy::Load);
        assert!("eventually".parse::<WaitStrategy>().is_err());
    }

    #[test]
    fn unknown_profile_name_is_rejected() {
        let err = ProfileSpec::Named("nope".into()).resolve().unwrap_err();
        assert!(err.to_string().contains("generic"));
    }

    #[test]
    fn link_policy_filters() {
        let policy = LinkPolicy {
            include: vec!["/miniprogram/dev/".into()],
            exclude: vec!["/community/".into()],
            ..Default::default()
        };
        let base = url::Url::parse("https://developers.weixin.qq.com/miniprogram/dev/").unwrap();
        let ok = base.join("framework/").unwrap();
        let excluded = url::Url::parse("https://developers.weixin.qq.com/community/x").unwrap();
        let foreign = url::Url::parse("https://example.com/miniprogram/dev/").unwrap();
        assert!(policy.allows(&ok, &base));
        assert!(!policy.allows(&excluded, &base));
        assert!(!policy.allows(&foreign, &base));
    }

    #[test]
    fn merged_options_do_not_duplicate() {
        let profile = ContentProfile::tdesign();
        let merged = RenderOptions::default().merged_with(&profile);
        let count = merged
            .code_example_tags
            .iter()
            .filter(|t| t.as_str() == "td-code-block")
            .count();
        assert_eq!(count, 1);
        assert!(merged.skip_tags.iter().any(|t| t == "td-doc-phone"));
    }
}
