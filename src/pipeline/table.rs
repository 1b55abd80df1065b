//! Table converter: `<table>` subtree → GFM pipe table.
//!
//! Real documentation tables are frequently ragged (rows shorter or longer
//! than the header). Every emitted row is normalised to exactly the header's
//! column count so the pipe table stays well-formed.

use super::node::{Element, Node, Tag};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Headers plus body rows, already flattened to escaped cell strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableModel {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableModel {
    /// Build the model from a `<table>` element. `None` when the table has
    /// no rows at all.
    pub fn from_element(table: &Element) -> Option<TableModel> {
        Self::from_element_with(table, &|e| e.tag == Tag::Skip)
    }

    /// Like [`from_element`](Self::from_element), dropping every element in
    /// a cell for which `skip` returns `true`.
    pub fn from_element_with(table: &Element, skip: &dyn Fn(&Element) -> bool) -> Option<TableModel> {
        let rows = collect_rows(table);
        if rows.is_empty() {
            return None;
        }

        // First row of the first <thead>, else the first row of the table.
        let header_idx = rows.iter().position(|r| r.in_head).unwrap_or(0);

        let headers: Vec<String> = rows[header_idx].cells.iter().map(|c| flatten_cell(c, skip)).collect();
        let body: Vec<Vec<String>> = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != header_idx)
            .map(|(_, r)| r.cells.iter().map(|c| flatten_cell(c, skip)).collect())
            .collect();

        Some(TableModel {
            headers,
            rows: body,
        })
    }

    /// Column count. Falls back to the widest row when the header row has
    /// no cells.
    pub fn width(&self) -> usize {
        if !self.headers.is_empty() {
            return self.headers.len();
        }
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Render as a pipe table surrounded by blank lines. Every line has
    /// exactly [`width`](Self::width) fields.
    pub fn to_markdown(&self) -> String {
        let width = self.width();
        if width == 0 {
            return String::new();
        }

        let mut out = String::from("\n");
        out.push_str(&format_row(&fit_row(&self.headers, width)));
        out.push_str(&format_row(&vec!["---".to_string(); width]));

        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                debug!(
                    row = i + 1,
                    cells = row.len(),
                    columns = width,
                    "ragged table row normalised"
                );
            }
            out.push_str(&format_row(&fit_row(row, width)));
        }
        out.push('\n');
        out
    }
}

/// Convert a `<table>` element to Markdown; `""` when it has no rows.
pub fn convert_table(table: &Element) -> String {
    convert_table_with(table, &|e| e.tag == Tag::Skip)
}

/// Convert with a caller-supplied skip rule for cell contents.
pub fn convert_table_with(table: &Element, skip: &dyn Fn(&Element) -> bool) -> String {
    TableModel::from_element_with(table, skip)
        .map(|model| model.to_markdown())
        .unwrap_or_default()
}

// ── Row collection ───────────────────────────────────────────────────────────

struct RawRow<'a> {
    in_head: bool,
    cells: Vec<&'a Element>,
}

fn collect_rows(table: &Element) -> Vec<RawRow<'_>> {
    let mut rows = Vec::new();
    for child in table.child_elements() {
        match child.tag {
            Tag::TableRow => rows.push(raw_row(child, false)),
            Tag::TableHead => {
                for tr in child.child_elements().filter(|e| e.tag == Tag::TableRow) {
                    rows.push(raw_row(tr, true));
                }
            }
            Tag::TableBody | Tag::TableFoot => {
                for tr in child.child_elements().filter(|e| e.tag == Tag::TableRow) {
                    rows.push(raw_row(tr, false));
                }
            }
            _ => {}
        }
    }
    rows
}

fn raw_row(tr: &Element, in_head: bool) -> RawRow<'_> {
    RawRow {
        in_head,
        cells: tr
            .child_elements()
            .filter(|c| matches!(c.tag, Tag::TableCell | Tag::TableHeaderCell))
            .collect(),
    }
}

// ── Cells ────────────────────────────────────────────────────────────────────

/// Flatten one cell: inline code keeps backticks, `<br>` stays a literal
/// `<br>`, everything else becomes whitespace-collapsed text. The result is
/// single-line with `|` escaped.
fn flatten_cell(cell: &Element, skip: &dyn Fn(&Element) -> bool) -> String {
    let mut raw = String::new();
    flatten_children(cell, skip, &mut raw);
    raw.replace('\n', " ").trim().replace('|', "\\|")
}

fn flatten_children(el: &Element, skip: &dyn Fn(&Element) -> bool, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(&collapse(t)),
            Node::Element(e) if skip(e) => {}
            Node::Element(e) => match e.tag {
                Tag::Code => {
                    let code = collapse(&e.text_content());
                    let code = code.trim();
                    if !code.is_empty() {
                        out.push('`');
                        out.push_str(code);
                        out.push('`');
                    }
                }
                Tag::LineBreak => out.push_str("<br>"),
                _ => flatten_children(e, skip, out),
            },
        }
    }
}

fn collapse(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").into_owned()
}

fn fit_row(cells: &[String], width: usize) -> Vec<String> {
    let mut fitted: Vec<String> = cells.iter().take(width).cloned().collect();
    if cells.len() > width {
        let overflow: Vec<&str> = cells[width..]
            .iter()
            .map(String::as_str)
            .filter(|c| !c.is_empty())
            .collect();
        if let Some(last) = fitted.last_mut() {
            for extra in overflow {
                if !last.is_empty() {
                    last.push(' ');
                }
                last.push_str(extra);
            }
        }
    }
    fitted.resize(width, String::new());
    fitted
}

fn format_row(cells: &[String]) -> String {
    format!("| {} |\n", cells.join(" | "))
}
