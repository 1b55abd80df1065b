//! Text normalizer: deterministic whitespace cleanup of rendered Markdown.
//!
//! The renderer is deliberately generous with newlines (every block element
//! surrounds itself with blank lines), so its raw output has ragged spacing.
//! This pass turns it into stable text:
//!
//! 1. Normalise line endings (CRLF / CR → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 3. Trim every line; inside fenced code only trailing whitespace goes, so
//!    indentation and blank lines in code survive
//! 4. Collapse runs of blank lines (outside fences) to a single blank line
//! 5. Drop leading/trailing blank lines and end with exactly one newline
//!
//! The whole pass is idempotent: `normalize(normalize(x)) == normalize(x)`.

/// Apply every normalisation rule to a rendered document.
///
/// Empty (or whitespace-only) input yields an empty string.
pub fn normalize(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let lines = trim_lines(&s);
    let lines = collapse_blank_lines(lines);
    finish(&lines)
}

/// For each `\n`-separated line of `text`, whether it sits inside a fenced
/// code body. Fence marker lines themselves count as outside.
pub(crate) fn fenced_lines(text: &str) -> Vec<bool> {
    trim_lines(text).iter().map(|l| l.fenced).collect()
}

/// One output line, tagged with whether it sits inside a fenced code body.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Line<'a> {
    text: &'a str,
    fenced: bool,
}

impl Line<'_> {
    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Length of the backtick run opening a fence on this line, if any.
fn fence_run(line: &str) -> Option<usize> {
    let run = line.trim_start().chars().take_while(|c| *c == '`').count();
    (run >= 3).then_some(run)
}

/// A closing fence is backticks only, at least as many as the opener.
fn closes_fence(line: &str, open: usize) -> bool {
    let t = line.trim();
    t.len() >= open && t.chars().all(|c| c == '`')
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim lines, fence-aware ──────────────────────────────────────────

fn trim_lines(input: &str) -> Vec<Line<'_>> {
    // Backtick count of the open fence.
    let mut open: Option<usize> = None;
    input
        .split('\n')
        .map(|raw| match open {
            Some(run) if closes_fence(raw, run) => {
                open = None;
                Line {
                    text: raw.trim(),
                    fenced: false,
                }
            }
            Some(_) => Line {
                text: raw.trim_end(),
                fenced: true,
            },
            None => {
                open = fence_run(raw);
                Line {
                    text: raw.trim(),
                    fenced: false,
                }
            }
        })
        .collect()
}

// ── Rule 4: Collapse blank-line runs ─────────────────────────────────────────

fn collapse_blank_lines(lines: Vec<Line<'_>>) -> Vec<Line<'_>> {
    let mut out: Vec<Line<'_>> = Vec::with_capacity(lines.len());
    for line in lines {
        let prev_blank = out.last().is_some_and(|p| p.is_blank() && !p.fenced);
        if line.is_blank() && !line.fenced && prev_blank {
            continue;
        }
        out.push(line);
    }
    out
}

// ── Rule 5: Trim document edges, single final newline ───────────────────────

fn finish(lines: &[Line<'_>]) -> String {
    let start = lines.iter().position(|l| !l.is_blank());
    let end = lines.iter().rposition(|l| !l.is_blank());
    let (Some(start), Some(end)) = (start, end) else {
        return String::new();
    };

    let mut out = String::new();
    for line in &lines[start..=end] {
        out.push_str(line.text);
        out.push('\n');
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trims_every_line() {
        assert_eq!(normalize("  hello   \n\tworld  "), "hello\nworld\n");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(normalize("a\n\n\n\n\n\nb"), "a\n\nb\n");
        assert_eq!(normalize("a\n   \n \t \nb"), "a\n\nb\n");
    }

    #[test]
    fn test_trims_document_edges() {
        assert_eq!(normalize("\n\n\n# Title\n\nbody\n\n\n"), "# Title\n\nbody\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\n\t\n"), "");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(normalize("hello\u{200B}world\u{FEFF}"), "helloworld\n");
    }

    #[test]
    fn test_fenced_code_keeps_indentation_and_blank_lines() {
        let input = "\n```rust\nfn main() {\n    let x = 1;   \n\n\n    x\n}\n```\n\n\ntext  ";
        let expected = "```rust\nfn main() {\n    let x = 1;\n\n\n    x\n}\n```\n\ntext\n";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_longer_fence_shields_inner_fences() {
        let input = "````md\n```js\n  x\n\n\n```\n````\n\n\n  a\n\n\n\nb";
        let expected = "````md\n```js\n  x\n\n\n```\n````\n\na\n\nb\n";
        assert_eq!(normalize(input), expected);
        assert_eq!(normalize(expected), expected);
    }

    #[test]
    fn test_fence_closes_only_on_bare_backticks() {
        // "```js" inside an open fence is content, not a closer.
        let out = normalize("```\n```js\n    y\n```\n\n\n  z");
        assert_eq!(out, "```\n```js\n    y\n```\n\nz\n");
    }

    #[test]
    fn test_fenced_lines_mask() {
        assert_eq!(
            fenced_lines("# a\n```\n# b\n```\nc"),
            vec![false, false, true, false, false]
        );
    }

    #[test]
    fn test_unclosed_fence_is_stable() {
        let once = normalize("```js\n  a\n\n\n  b\n\n");
        assert_eq!(once, "```js\n  a\n\n\n  b\n");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "\n# Title\n\n\nHello **world**\n\n",
            "  - a\n  - b\n\n\n\n> quote\n>\n> more",
            "| A | B |\n| --- | --- |\n|  | x |\n",
            "```\n    indented\n\n\n```\n\n\n\nafter",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_scenario_document() {
        assert_eq!(
            normalize("\n# Title\n\n\nHello **world**\n\n"),
            "# Title\n\nHello **world**\n"
        );
    }
}
