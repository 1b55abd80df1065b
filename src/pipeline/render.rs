//! Tag dispatch renderer: node tree → raw Markdown.
//!
//! Rendering is a single recursive walk with an exhaustive `match` on
//! [`Tag`]. Every element kind maps to a fixed Markdown shape; unknown and
//! structural elements pass their children through undecorated. Block
//! elements surround themselves with blank lines generously and leave the
//! cleanup to [`super::normalize`].
//!
//! The renderer is total: any tree produces some string, never an error.

use super::decode::{trim_blank_lines, CodePayload, PayloadEncoding};
use super::node::{Element, Node, Tag};
use super::table::convert_table_with;
use crate::config::{HeadingSpaces, RenderOptions};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Anchor decorations injected next to headings by doc generators.
const HEADING_ANCHOR_SYMBOLS: [char; 2] = ['#', '¶'];

/// Render `root` and all its descendants with the given options.
///
/// The output is raw: run it through [`super::normalize::normalize`] for
/// stable spacing.
pub fn render(root: &Element, options: &RenderOptions) -> String {
    Renderer::new(options).render(root)
}

/// Recursive renderer bound to one set of options.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    options: &'a RenderOptions,
}

impl<'a> Renderer<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    /// Render one element (including itself) to a fresh string.
    pub fn render(&self, el: &Element) -> String {
        let mut out = String::new();
        self.render_element(el, &mut out);
        out
    }

    pub fn render_node(&self, node: &Node, out: &mut String) {
        match node {
            Node::Text(t) => out.push_str(&collapse_whitespace(t)),
            Node::Element(el) => self.render_element(el, out),
        }
    }

    pub fn render_children(&self, el: &Element, out: &mut String) {
        for child in &el.children {
            self.render_node(child, out);
        }
    }

    fn children_to_string(&self, el: &Element) -> String {
        let mut out = String::new();
        self.render_children(el, &mut out);
        out
    }

    /// `true` when the element renders to nothing.
    pub fn is_skipped(&self, el: &Element) -> bool {
        el.tag == Tag::Skip
            || self.options.skip_tags.iter().any(|t| t.eq_ignore_ascii_case(&el.name))
            || self
                .options
                .skip_classes
                .iter()
                .any(|fragment| el.class_contains(fragment))
    }

    fn is_code_example(&self, el: &Element) -> bool {
        el.tag == Tag::CodeExample
            || self
                .options
                .code_example_tags
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&el.name))
    }

    fn render_element(&self, el: &Element, out: &mut String) {
        if self.is_skipped(el) {
            return;
        }
        if self.is_code_example(el) {
            self.render_code_example(el, out);
            return;
        }

        match el.tag {
            Tag::Skip => {}
            Tag::Heading(level) => self.render_heading(el, level, out),
            Tag::Paragraph => {
                let inner = self.children_to_string(el);
                let inner = inner.trim();
                if !inner.is_empty() {
                    out.push('\n');
                    out.push_str(inner);
                    out.push_str("\n\n");
                }
            }
            Tag::Code => render_inline_code(el, out),
            Tag::Pre => render_pre(el, out),
            Tag::Blockquote => self.render_blockquote(el, out),
            Tag::Anchor => self.render_anchor(el, out),
            Tag::Strong => self.render_wrapped(el, "**", out),
            Tag::Emphasis => self.render_wrapped(el, "*", out),
            Tag::UnorderedList => self.render_list(el, false, out),
            Tag::OrderedList => self.render_list(el, true, out),
            Tag::Table => out.push_str(&convert_table_with(el, &|e| self.is_skipped(e))),
            Tag::LineBreak => out.push('\n'),
            Tag::HorizontalRule => out.push_str("\n---\n\n"),
            // Outside their usual parents these carry no decoration.
            Tag::ListItem
            | Tag::TableHead
            | Tag::TableBody
            | Tag::TableFoot
            | Tag::TableRow
            | Tag::TableHeaderCell
            | Tag::TableCell
            | Tag::Container
            | Tag::CodeExample
            | Tag::Unknown => self.render_children(el, out),
        }
    }

    // ── Block elements ───────────────────────────────────────────────────

    fn render_heading(&self, el: &Element, level: u8, out: &mut String) {
        let text = heading_text(&self.visible_text(el), self.options.heading_spaces);
        if text.is_empty() {
            return;
        }
        out.push('\n');
        out.push_str(&"#".repeat(level as usize));
        out.push(' ');
        out.push_str(&text);
        out.push_str("\n\n");
    }

    fn render_blockquote(&self, el: &Element, out: &mut String) {
        let inner = self.children_to_string(el);
        let inner = inner.trim();
        if inner.is_empty() {
            return;
        }
        out.push('\n');
        let mut prev_blank = false;
        for line in inner.lines() {
            let line = line.trim_end();
            let blank = line.is_empty();
            if blank && prev_blank {
                continue;
            }
            prev_blank = blank;
            if blank {
                out.push_str(">\n");
            } else {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
    }

    fn render_list(&self, el: &Element, ordered: bool, out: &mut String) {
        let mut items = Vec::new();
        for li in el.child_elements().filter(|c| c.tag == Tag::ListItem) {
            if self.is_skipped(li) {
                continue;
            }
            let item = self.children_to_string(li);
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let marker = if ordered {
                format!("{}. ", items.len() + 1)
            } else {
                "- ".to_string()
            };
            items.push(format!("{marker}{item}"));
        }
        if items.is_empty() {
            return;
        }
        out.push('\n');
        out.push_str(&items.join("\n"));
        out.push_str("\n\n");
    }

    /// Every descendant `pre` becomes its own fenced block, decoded when its
    /// text is percent-encoded. The language comes from the `pre`'s `lang`
    /// attribute, its `language-*` class, then the container's `lang`. With
    /// both `slot` and `lang` a label line names the variant.
    fn render_code_example(&self, el: &Element, out: &mut String) {
        let blocks = el.find_all(&|e| e.tag == Tag::Pre);
        if blocks.is_empty() {
            self.render_children(el, out);
            return;
        }

        for pre in blocks {
            let (language, content) = pre_language_and_text(pre);
            let language = pre
                .attr("lang")
                .map(str::to_string)
                .or(language)
                .or_else(|| el.attr("lang").map(str::to_string));
            let payload = CodePayload::detect(language, content);
            let Some(fenced) = payload.to_fenced() else {
                continue;
            };
            match (pre.attr("slot"), payload.language.as_deref()) {
                (Some(slot), Some(lang)) if !slot.trim().is_empty() => {
                    out.push_str(&format!("\n**{}** (`{lang}`):\n{fenced}\n", slot.trim()));
                }
                _ => {
                    out.push('\n');
                    out.push_str(&fenced);
                    out.push_str("\n\n");
                }
            }
        }
    }

    // ── Inline elements ──────────────────────────────────────────────────

    fn render_anchor(&self, el: &Element, out: &mut String) {
        let text = self.children_to_string(el);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match el.attr("href").map(str::trim) {
            Some(href) if !href.is_empty() && !href.starts_with("javascript:") => {
                out.push_str(&format!("[{text}]({href})"));
            }
            _ => out.push_str(text),
        }
    }

    fn render_wrapped(&self, el: &Element, marker: &str, out: &mut String) {
        let inner = self.children_to_string(el);
        let inner = inner.trim();
        if inner.is_empty() {
            return;
        }
        out.push_str(marker);
        out.push_str(inner);
        out.push_str(marker);
    }

    /// Text of `el` excluding skipped subtrees.
    pub fn visible_text(&self, el: &Element) -> String {
        let mut out = String::new();
        for child in &el.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) if !self.is_skipped(e) => out.push_str(&self.visible_text(e)),
                Node::Element(_) => {}
            }
        }
        out
    }
}

// ── Free helpers ─────────────────────────────────────────────────────────────

fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").into_owned()
}

/// Heading text: whitespace handled per `mode`, then anchor symbols removed.
pub fn heading_text(raw: &str, mode: HeadingSpaces) -> String {
    match mode {
        HeadingSpaces::Remove => raw
            .chars()
            .filter(|c| !c.is_whitespace() && !HEADING_ANCHOR_SYMBOLS.contains(c))
            .collect(),
        HeadingSpaces::Collapse => {
            let stripped: String = raw
                .chars()
                .filter(|c| !HEADING_ANCHOR_SYMBOLS.contains(c))
                .collect();
            collapse_whitespace(stripped.trim())
        }
    }
}

fn render_inline_code(el: &Element, out: &mut String) {
    let text = el.text_content();
    if text.contains('\n') {
        let payload = CodePayload {
            language: el.language_class().map(str::to_string),
            content: text,
            encoding: PayloadEncoding::Raw,
        };
        if let Some(fenced) = payload.to_fenced() {
            out.push('\n');
            out.push_str(&fenced);
            out.push_str("\n\n");
        }
        return;
    }
    let text = text.trim();
    if !text.is_empty() {
        out.push('`');
        out.push_str(text);
        out.push('`');
    }
}

fn render_pre(el: &Element, out: &mut String) {
    let (language, content) = pre_language_and_text(el);
    let payload = CodePayload {
        language,
        content,
        encoding: PayloadEncoding::Raw,
    };
    if let Some(fenced) = payload.to_fenced() {
        out.push('\n');
        out.push_str(&fenced);
        out.push_str("\n\n");
    }
}

/// Language (`language-x` on the inner `code`, else on the `pre`) and the
/// literal text (of the inner `code`, else of the `pre`).
fn pre_language_and_text(pre: &Element) -> (Option<String>, String) {
    let code = pre.find_first(&|e| e.tag == Tag::Code);
    let language = code
        .and_then(Element::language_class)
        .or_else(|| pre.language_class())
        .map(str::to_string);
    let content = match code {
        Some(code) => code.text_content(),
        None => pre.text_content(),
    };
    (language, trim_blank_lines(&content).to_string())
}
