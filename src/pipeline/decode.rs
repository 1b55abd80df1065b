//! Code/content decoder for percent-encoded code examples.
//!
//! Some documentation sites store demo source inside custom elements as a
//! URL-encoded string (`const%20x%20%3D%201%3B`). Decoding always fails
//! soft: malformed input comes back unchanged.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::debug;

static RE_PERCENT_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").unwrap());

/// Percent-decode `text`, validating the result as UTF-8.
///
/// Text without any `%XX` escape is returned as is, so decoding
/// already-decoded text is a no-op. `+` is kept literal. Invalid UTF-8 after
/// decoding returns the original input.
pub fn decode_percent(text: &str) -> String {
    if !RE_PERCENT_ESCAPE.is_match(text) {
        return text.to_string();
    }
    match percent_decode_str(text).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            debug!("percent-decoding failed, keeping raw text: {e}");
            text.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Raw,
    PercentEncoded,
}

/// A code sample pulled out of the DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePayload {
    pub language: Option<String>,
    pub content: String,
    pub encoding: PayloadEncoding,
}

impl CodePayload {
    /// Wrap raw content, marking it percent-encoded when it contains at
    /// least one `%XX` escape.
    pub fn detect(language: Option<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let encoding = if RE_PERCENT_ESCAPE.is_match(&content) {
            PayloadEncoding::PercentEncoded
        } else {
            PayloadEncoding::Raw
        };
        Self {
            language: language.filter(|l| !l.trim().is_empty()),
            content,
            encoding,
        }
    }

    pub fn decoded(&self) -> String {
        match self.encoding {
            PayloadEncoding::Raw => self.content.clone(),
            PayloadEncoding::PercentEncoded => decode_percent(&self.content),
        }
    }

    /// The decoded content as a fenced block, language right after the
    /// opening fence. Leading/trailing blank lines are dropped; `None` when
    /// nothing is left.
    ///
    /// The fence is one backtick longer than any backtick run that starts a
    /// line of the body, so embedded fences cannot close the block early.
    pub fn to_fenced(&self) -> Option<String> {
        let decoded = self.decoded();
        let body = trim_blank_lines(&decoded);
        if body.is_empty() {
            return None;
        }
        let lang = self.language.as_deref().unwrap_or("");
        let fence = "`".repeat(fence_len_for(body));
        Some(format!("{fence}{lang}\n{body}\n{fence}"))
    }
}

/// Shortest fence (at least three backticks) that no line of `body` can
/// close.
pub fn fence_len_for(body: &str) -> usize {
    body.lines()
        .map(|line| line.trim_start().chars().take_while(|c| *c == '`').count())
        .filter(|run| *run >= 3)
        .map(|run| run + 1)
        .max()
        .unwrap_or(3)
}

/// Remove blank lines at both ends without touching the indentation of the
/// first non-blank line.
pub fn trim_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    let start = text
        .char_indices()
        .take_while(|(_, c)| c.is_whitespace())
        .filter(|(_, c)| *c == '\n')
        .last()
        .map(|(i, _)| i + 1)
        .unwrap_or(0);
    &text[start..]
}
