//! Content-root extraction: pick the documentation body out of a full page.
//!
//! A [`ContentProfile`] names CSS selectors for the content root, the page
//! title and optional sections. The selected subtree goes through the
//! renderer and the normalizer; everything outside it (site chrome, menus,
//! footers) never reaches the output.

use super::node::from_element_ref;
use super::normalize::{fenced_lines, normalize};
use super::render::{heading_text, Renderer};
use crate::config::RenderOptions;
use crate::error::{PageError, Spa2MdError};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One section of a page, rendered under an optional `## heading`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRule {
    /// CSS selector, evaluated inside the content root. First match wins.
    pub selector: String,
    #[serde(default)]
    pub heading: Option<String>,
}

impl SectionRule {
    pub fn new(selector: &str, heading: Option<&str>) -> Self {
        Self {
            selector: selector.to_string(),
            heading: heading.map(str::to_string),
        }
    }
}

/// Where a site keeps its documentation content, and what to leave out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentProfile {
    pub name: String,

    /// Tried in order; the first selector matching anything is the root.
    pub root_selectors: Vec<String>,

    /// Element whose text becomes the `# title` line.
    #[serde(default)]
    pub title_selector: Option<String>,

    /// When non-empty only these sections are rendered. If none of them
    /// match, the whole root is rendered instead.
    #[serde(default)]
    pub sections: Vec<SectionRule>,

    #[serde(default)]
    pub skip_tags: Vec<String>,

    #[serde(default)]
    pub skip_classes: Vec<String>,

    #[serde(default)]
    pub code_example_tags: Vec<String>,

    /// Pages whose Markdown is shorter than this (in chars) are rejected.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

fn default_min_content_chars() -> usize {
    50
}

impl Default for ContentProfile {
    fn default() -> Self {
        Self::generic()
    }
}

impl ContentProfile {
    /// Names accepted by [`ContentProfile::by_name`].
    pub const BUILTIN: &'static [&'static str] = &["generic", "vant", "tdesign"];

    pub fn by_name(name: &str) -> Option<ContentProfile> {
        match name.trim().to_ascii_lowercase().as_str() {
            "generic" => Some(Self::generic()),
            "vant" => Some(Self::vant()),
            "tdesign" => Some(Self::tdesign()),
            _ => None,
        }
    }

    /// Common documentation-site containers, falling back to `<body>`.
    pub fn generic() -> Self {
        Self {
            name: "generic".into(),
            root_selectors: strings(&[
                ".markdown-section",
                ".content-area",
                "article",
                ".doc-content",
                ".main-content",
                "main",
                "body",
            ]),
            title_selector: Some("h1".into()),
            sections: Vec::new(),
            skip_tags: Vec::new(),
            skip_classes: Vec::new(),
            code_example_tags: Vec::new(),
            min_content_chars: default_min_content_chars(),
        }
    }

    /// Vant (vant-ui.github.io) component docs.
    pub fn vant() -> Self {
        Self {
            name: "vant".into(),
            root_selectors: strings(&[
                "div.van-doc-content",
                "section.van-doc-markdown-body",
                "body",
            ]),
            title_selector: Some("h1".into()),
            sections: vec![SectionRule::new("section.van-doc-markdown-body", None)],
            skip_tags: strings(&["van-doc-simulator"]),
            skip_classes: strings(&["van-doc-header", "van-doc-nav", "van-doc-simulator"]),
            code_example_tags: Vec::new(),
            min_content_chars: default_min_content_chars(),
        }
    }

    /// TDesign mini-program docs: `DOC`, `DEMO` and `API` panes inside
    /// `<td-doc-content>`.
    pub fn tdesign() -> Self {
        Self {
            name: "tdesign".into(),
            root_selectors: strings(&["td-doc-content", "body"]),
            title_selector: Some("h1#__td_doc_title__".into()),
            sections: vec![
                SectionRule::new(r#"div[name="DOC"]"#, None),
                SectionRule::new(r#"div.td-doc-main div[name="DEMO"]"#, Some("示例")),
                SectionRule::new(r#"div[name="API"]"#, Some("API")),
            ],
            skip_tags: strings(&[
                "td-doc-phone",
                "td-contributors",
                "td-doc-footer",
                "td-doc-history",
                "td-theme-generator",
                "td-portal",
            ]),
            skip_classes: strings(&["tdesign-toc_container"]),
            code_example_tags: strings(&["td-code-block"]),
            min_content_chars: default_min_content_chars(),
        }
    }

    /// Check that every selector parses.
    pub fn validate(&self) -> Result<(), Spa2MdError> {
        if self.root_selectors.is_empty() {
            return Err(Spa2MdError::InvalidConfig(format!(
                "profile '{}' has no root selectors",
                self.name
            )));
        }
        let all = self
            .root_selectors
            .iter()
            .chain(self.title_selector.iter())
            .chain(self.sections.iter().map(|s| &s.selector));
        for sel in all {
            Selector::parse(sel).map_err(|e| {
                Spa2MdError::InvalidConfig(format!(
                    "profile '{}': bad selector '{sel}': {e}",
                    self.name
                ))
            })?;
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("ignoring invalid selector '{raw}': {e}");
            None
        }
    }
}

fn select_first<'a>(scope: ElementRef<'a>, raw: &str) -> Option<ElementRef<'a>> {
    let sel = selector(raw)?;
    scope.select(&sel).next()
}

/// Extract, render and normalize the documentation content of one page.
///
/// `url` only labels errors and logs. `options` is merged with the profile's
/// skip lists and code-example tags.
pub fn extract_markdown(
    html: &str,
    url: &str,
    profile: &ContentProfile,
    options: &RenderOptions,
) -> Result<String, PageError> {
    let doc = Html::parse_document(html);
    let options = options.merged_with(profile);
    let renderer = Renderer::new(&options);

    let doc_root = doc.root_element();
    let root = profile
        .root_selectors
        .iter()
        .find_map(|raw| {
            let sel = selector(raw)?;
            let found = doc.select(&sel).next()?;
            debug!(url, selector = raw.as_str(), "content root matched");
            Some(found)
        })
        .ok_or_else(|| PageError::NoContentRoot {
            url: url.to_string(),
        })?;

    let mut body = String::new();
    let mut matched_section = false;
    for rule in &profile.sections {
        let Some(section) = select_first(root, &rule.selector) else {
            continue;
        };
        matched_section = true;
        if let Some(heading) = rule.heading.as_deref() {
            body.push_str(&format!("\n## {heading}\n\n"));
        }
        renderer.render_children(&from_element_ref(section), &mut body);
    }
    if !matched_section {
        renderer.render_children(&from_element_ref(root), &mut body);
    }
    let body = normalize(&body);

    let title = profile
        .title_selector
        .as_deref()
        .and_then(|raw| select_first(root, raw).or_else(|| select_first(doc_root, raw)))
        .map(|el| {
            heading_text(
                &renderer.visible_text(&from_element_ref(el)),
                options.heading_spaces,
            )
        })
        .filter(|t| !t.is_empty());

    let markdown = match title {
        Some(title) => with_title(&body, &format!("# {title}")),
        None => body,
    };

    let chars = markdown.trim().chars().count();
    if chars < profile.min_content_chars {
        return Err(PageError::ContentTooShort {
            url: url.to_string(),
            chars,
            min: profile.min_content_chars,
        });
    }
    Ok(markdown)
}

/// Put `heading` on the first line. A matching heading already in the body
/// (outside code fences) is moved up rather than repeated.
fn with_title(body: &str, heading: &str) -> String {
    let lines: Vec<&str> = body.split('\n').collect();
    let existing = lines
        .iter()
        .zip(fenced_lines(body))
        .position(|(line, fenced)| !fenced && *line == heading);
    match existing {
        Some(0) => body.to_string(),
        Some(i) => {
            let rest: Vec<&str> = lines
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, l)| *l)
                .collect();
            normalize(&format!("{heading}\n\n{}", rest.join("\n")))
        }
        None => normalize(&format!("{heading}\n\n{body}")),
    }
}
