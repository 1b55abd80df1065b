//! Offline conversion of saved HTML into Markdown.
//!
//! Scrape runs keep the raw markup under `<out>/html/`, so the extraction
//! rules can be tuned and re-run without touching the network. These entry
//! points take that markup (a string, a file or a whole tree) and produce
//! the same Markdown a scrape run would.

use crate::config::RenderOptions;
use crate::error::Spa2MdError;
use crate::output::ConversionStats;
use crate::pipeline::extract::{extract_markdown, ContentProfile};
use crate::pipeline::node::parse_document;
use crate::pipeline::normalize::normalize;
use crate::pipeline::render::render;
use crate::scrape::write_atomic;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a whole HTML document to Markdown, without content-root
/// selection. `<head>` and the built-in skip set render to nothing.
///
/// # Example
/// ```rust
/// use edgequake_spa2md::{html_to_markdown, RenderOptions};
///
/// let md = html_to_markdown("<h1>Title</h1><p>Hello <strong>world</strong></p>", &RenderOptions::default());
/// assert_eq!(md, "# Title\n\nHello **world**\n");
/// ```
pub fn html_to_markdown(html: &str, options: &RenderOptions) -> String {
    normalize(&render(&parse_document(html), options))
}

/// Convert one saved page, writing the Markdown to `dst` atomically.
///
/// # Errors
/// * [`Spa2MdError::InputReadFailed`] / [`Spa2MdError::OutputWriteFailed`]
///   for I/O problems
/// * [`Spa2MdError::Extraction`] when the page has no usable content
pub async fn convert_file(
    src: &Path,
    dst: &Path,
    profile: &ContentProfile,
    options: &RenderOptions,
) -> Result<(), Spa2MdError> {
    let html = tokio::fs::read_to_string(src)
        .await
        .map_err(|source| Spa2MdError::InputReadFailed {
            path: src.to_path_buf(),
            source,
        })?;
    let label = src.display().to_string();
    let markdown = extract_markdown(&html, &label, profile, options)?;
    write_atomic(dst, markdown.as_bytes())?;
    debug!("{} → {}", src.display(), dst.display());
    Ok(())
}

/// Convert every `*.html` file under `src` into a mirrored `*.md` tree under
/// `dst`. Files that fail are logged and counted; the walk continues.
pub async fn convert_dir(
    src: &Path,
    dst: &Path,
    profile: &ContentProfile,
    options: &RenderOptions,
) -> Result<ConversionStats, Spa2MdError> {
    let started = Instant::now();
    profile.validate()?;
    let files = html_files(src)?;
    info!("Found {} HTML files under {}", files.len(), src.display());

    let mut stats = ConversionStats::default();
    for file in files {
        let rel = file.strip_prefix(src).unwrap_or(&file);
        let target = dst.join(rel).with_extension("md");
        match convert_file(&file, &target, profile, options).await {
            Ok(()) => stats.converted += 1,
            Err(e) => {
                warn!("{}: {e}", file.display());
                stats.failed += 1;
            }
        }
    }

    info!(
        "Conversion complete: {} converted, {} failed, {}ms",
        stats.converted,
        stats.failed,
        started.elapsed().as_millis()
    );
    Ok(stats)
}

/// Synchronous wrapper around [`convert_dir`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_dir_sync(
    src: &Path,
    dst: &Path,
    profile: &ContentProfile,
    options: &RenderOptions,
) -> Result<ConversionStats, Spa2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Spa2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_dir(src, dst, profile, options))
}

/// All `*.html` files below `root`, sorted for a stable processing order.
fn html_files(root: &Path) -> Result<Vec<PathBuf>, Spa2MdError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|source| Spa2MdError::InputReadFailed {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| Spa2MdError::InputReadFailed {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
