//! Node model: a typed, immutable view of a parsed HTML subtree.
//!
//! Parsing is delegated to `scraper` (html5ever underneath); this module
//! only maps its tree into [`Node`]/[`Element`] values whose tag identity is
//! already resolved into a closed [`Tag`] enumeration. The renderer then
//! dispatches with an exhaustive `match` instead of comparing tag names.

use scraper::{ElementRef, Html};
use std::collections::BTreeMap;

/// Semantic category of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `h1`–`h6`; the payload is the level.
    Heading(u8),
    Paragraph,
    Code,
    Pre,
    Blockquote,
    Anchor,
    Strong,
    Emphasis,
    UnorderedList,
    OrderedList,
    ListItem,
    Table,
    TableHead,
    TableBody,
    TableFoot,
    TableRow,
    TableHeaderCell,
    TableCell,
    LineBreak,
    HorizontalRule,
    /// Structural wrapper with no Markdown-visible formatting.
    Container,
    /// Custom container holding percent-encoded code examples.
    CodeExample,
    /// Carries no durable document value; renders to nothing.
    Skip,
    /// Anything else. Rendered like [`Tag::Container`].
    Unknown,
}

impl Tag {
    /// Classify a (case-insensitive) tag name.
    pub fn from_name(name: &str) -> Tag {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "p" => Tag::Paragraph,
            "code" => Tag::Code,
            "pre" => Tag::Pre,
            "blockquote" => Tag::Blockquote,
            "a" => Tag::Anchor,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Emphasis,
            "ul" => Tag::UnorderedList,
            "ol" => Tag::OrderedList,
            "li" => Tag::ListItem,
            "table" => Tag::Table,
            "thead" => Tag::TableHead,
            "tbody" => Tag::TableBody,
            "tfoot" => Tag::TableFoot,
            "tr" => Tag::TableRow,
            "th" => Tag::TableHeaderCell,
            "td" => Tag::TableCell,
            "br" => Tag::LineBreak,
            "hr" => Tag::HorizontalRule,
            "html" | "body" | "div" | "section" | "article" | "main" | "span" | "header"
            | "footer" | "aside" | "figure" | "figcaption" | "details" | "summary" | "dl"
            | "dt" | "dd" | "label" | "small" | "sup" | "sub" | "mark" | "u" | "font"
            | "center" | "td-doc-tabs" => Tag::Container,
            "td-code-block" => Tag::CodeExample,
            "script" | "style" | "nav" | "iframe" | "img" | "svg" | "button" | "noscript"
            | "template" | "head" | "canvas" | "video" | "audio" | "input" | "select"
            | "textarea" | "object" | "embed" => Tag::Skip,
            _ => Tag::Unknown,
        }
    }
}

/// A child of an element: another element or a raw text run.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Node {
        Node::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// All descendant text, concatenated without any separator.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => el.collect_text(out),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lower-cased tag name as written in the source.
    pub name: String,
    pub tag: Tag,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        Self {
            tag: Tag::from_name(&name),
            name,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    /// `true` when the raw `class` attribute contains `fragment` anywhere.
    pub fn class_contains(&self, fragment: &str) -> bool {
        self.attr("class").is_some_and(|c| c.contains(fragment))
    }

    /// The `x` in a `language-x` class, if any.
    pub fn language_class(&self) -> Option<&str> {
        self.classes()
            .find_map(|c| c.strip_prefix("language-"))
            .filter(|lang| !lang.is_empty())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// All descendant text, concatenated without any separator.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// First descendant (depth-first, document order) matching `pred`.
    pub fn find_first(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in self.child_elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_first(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant matching `pred`, in document order. Matching
    /// elements are not searched further.
    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&Element) -> bool) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.find_all_into(pred, &mut found);
        found
    }

    fn find_all_into<'a>(&'a self, pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if pred(child) {
                out.push(child);
            } else {
                child.find_all_into(pred, out);
            }
        }
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────

/// Parse a full HTML document and return its `<html>` element.
pub fn parse_document(html: &str) -> Element {
    let doc = Html::parse_document(html);
    from_element_ref(doc.root_element())
}

/// Parse an HTML fragment. The returned element is the synthetic `<html>`
/// wrapper html5ever creates around fragment content.
pub fn parse_fragment(html: &str) -> Element {
    let doc = Html::parse_fragment(html);
    from_element_ref(doc.root_element())
}

/// Map a `scraper` element (and its subtree) into the node model.
/// Comments, doctypes and processing instructions are dropped.
pub fn from_element_ref(el: ElementRef<'_>) -> Element {
    let value = el.value();
    let mut element = Element::new(value.name());
    for (name, attr_value) in value.attrs() {
        element
            .attributes
            .insert(name.to_ascii_lowercase(), attr_value.to_string());
    }
    for child in el.children() {
        match child.value() {
            scraper::Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    element.children.push(Node::Element(from_element_ref(child_ref)));
                }
            }
            scraper::Node::Text(text) => {
                let s: &str = &text.text;
                element.children.push(Node::Text(s.to_string()));
            }
            _ => {}
        }
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_headings_and_aliases() {
        assert_eq!(Tag::from_name("H3"), Tag::Heading(3));
        assert_eq!(Tag::from_name("b"), Tag::Strong);
        assert_eq!(Tag::from_name("i"), Tag::Emphasis);
        assert_eq!(Tag::from_name("script"), Tag::Skip);
        assert_eq!(Tag::from_name("td-code-block"), Tag::CodeExample);
        assert_eq!(Tag::from_name("van-cell"), Tag::Unknown);
    }

    #[test]
    fn parses_fragment_into_typed_tree() {
        let root = parse_fragment(r#"<p class="lead">Hello <strong>world</strong></p>"#);
        let p = root.find_first(&|e| e.tag == Tag::Paragraph).unwrap();
        assert_eq!(p.attr("class"), Some("lead"));
        assert_eq!(p.text_content(), "Hello world");
        assert_eq!(p.child_elements().next().unwrap().tag, Tag::Strong);
    }

    #[test]
    fn parse_document_drops_comments() {
        let root = parse_document("<html><body><!-- hidden --><p>x</p></body></html>");
        assert_eq!(root.name, "html");
        assert_eq!(root.text_content(), "x");
    }

    #[test]
    fn language_class_lookup() {
        let el = Element::new("code").with_attr("class", "hljs language-typescript");
        assert_eq!(el.language_class(), Some("typescript"));
        assert_eq!(Element::new("code").language_class(), None);
        let empty = Element::new("code").with_attr("class", "language-");
        assert_eq!(empty.language_class(), None);
    }

    #[test]
    fn find_all_stops_at_matches() {
        let tree = Element::new("div")
            .with_child(Element::new("pre").with_child(Element::new("pre")))
            .with_child(Element::new("section").with_child(Element::new("pre")));
        assert_eq!(tree.find_all(&|e| e.tag == Tag::Pre).len(), 2);
    }

    #[test]
    fn class_contains_matches_substrings() {
        let el = Element::new("div").with_attr("class", "van-doc-header sticky");
        assert!(el.class_contains("van-doc-header"));
        assert!(el.class_contains("doc-head"));
        assert!(!el.class_contains("nav"));
    }
}
