//! Output layout: where a page's files go relative to the output directory.
//!
//! The path mirrors the URL: path segments become directories, the last one
//! the file stem. Hash routes used by single-page apps (`#/zh-CN/button`)
//! extend the path, and a `tab` query parameter becomes the stem under the
//! page's own directory:
//!
//! ```text
//! https://vant-ui.github.io/vant/#/zh-CN/button         → vant/zh-CN/button.html
//! https://tdesign.tencent.com/miniprogram/components/button?tab=api
//!                                                      → miniprogram/components/button/api.html
//! https://example.com/                                 → index.html
//! ```

use crate::error::Spa2MdError;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use url::Url;

const MAX_COMPONENT_LEN: usize = 100;

/// Parse `input` as an absolute HTTP(S) URL.
pub fn parse_http_url(input: &str) -> Result<Url, Spa2MdError> {
    let url = Url::parse(input.trim()).map_err(|e| Spa2MdError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Spa2MdError::InvalidUrl {
            input: input.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Relative output path for `url` with the given file extension.
pub fn relative_path_for(url: &str, extension: &str) -> Result<PathBuf, Spa2MdError> {
    let url = parse_http_url(url)?;
    let mut parts = url_components(&url);

    let tab = url
        .query_pairs()
        .find(|(k, _)| k == "tab")
        .map(|(_, v)| sanitize_component(&v))
        .filter(|v| !v.is_empty());
    if let Some(tab) = tab {
        parts.push(tab);
    }

    let stem = parts.pop().unwrap_or_else(|| "index".to_string());
    let mut path: PathBuf = parts.iter().collect();
    path.push(format!("{stem}.{extension}"));
    Ok(path)
}

/// The same relative path with `/` separators, as stored in the summary.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn url_components(url: &Url) -> Vec<String> {
    let mut raw: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    // SPA hash routing: `#/zh-CN/button`. Plain in-page anchors are ignored.
    if let Some(route) = url.fragment().and_then(|f| f.strip_prefix('/')) {
        raw.extend(route.split('/'));
    }

    let mut parts: Vec<String> = raw
        .into_iter()
        .map(|seg| percent_decode_str(seg).decode_utf8_lossy().into_owned())
        .map(|seg| sanitize_component(&seg))
        .filter(|seg| !seg.is_empty())
        .collect();

    if let Some(last) = parts.last_mut() {
        for ext in [".html", ".htm"] {
            if let Some(stem) = last.strip_suffix(ext) {
                if !stem.is_empty() {
                    *last = stem.to_string();
                }
                break;
            }
        }
    }
    parts
}

/// Keep alphanumerics, `-`, `_` and `.`; replace anything else with `_`,
/// strip leading dots and cap the length.
pub fn sanitize_component(component: &str) -> String {
    let cleaned: String = component
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned = cleaned.trim_matches('_');
    cleaned.chars().take(MAX_COMPONENT_LEN).collect()
}
