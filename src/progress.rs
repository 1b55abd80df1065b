//! Progress-callback trait for per-page scrape events.
//!
//! Inject an [`Arc<dyn ScrapeProgressCallback>`] via
//! [`crate::config::ScrapeConfigBuilder::progress_callback`] to receive
//! events as the run processes each URL.
//!
//! # Example
//!
//! ```rust
//! use edgequake_spa2md::{ScrapeConfig, ScrapeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fetched: AtomicUsize,
//! }
//!
//! impl ScrapeProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, index: usize, total: usize, url: &str, html_length: usize) {
//!         self.fetched.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{index}/{total}] {url} ({html_length} chars)");
//!     }
//! }
//!
//! let config = ScrapeConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { fetched: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the scrape run as it processes each URL.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed sequentially, so events for
/// one page never interleave with another's.
pub trait ScrapeProgressCallback: Send + Sync {
    /// Called once before the first URL is fetched.
    ///
    /// `total` is the number of queued URLs; it can grow when links are
    /// followed (see `on_page_start`).
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before the first attempt for a URL.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the run
    /// * `total`: pages known so far (start URLs plus queued links)
    /// * `url`  : the URL about to be fetched
    fn on_page_start(&self, index: usize, total: usize, url: &str) {
        let _ = (index, total, url);
    }

    /// Called after a failed attempt that will be retried.
    fn on_retry(&self, url: &str, attempt: u32, max_retries: u32, error: &str) {
        let _ = (url, attempt, max_retries, error);
    }

    /// Called when a page was fetched.
    fn on_page_complete(&self, index: usize, total: usize, url: &str, html_length: usize) {
        let _ = (index, total, url, html_length);
    }

    /// Called when a page failed after all retries, or produced no content.
    fn on_page_error(&self, index: usize, total: usize, url: &str, error: &str) {
        let _ = (index, total, url, error);
    }

    /// Called once after the queue is exhausted.
    fn on_run_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScrapeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScrapeConfig`].
pub type ProgressCallback = Arc<dyn ScrapeProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        retries: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ScrapeProgressCallback for TrackingCallback {
        fn on_page_start(&self, _index: usize, _total: usize, _url: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, _url: &str, _attempt: u32, _max: u32, _error: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _index: usize, _total: usize, _url: &str, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _index: usize, _total: usize, _url: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_page_start(1, 2, "https://a");
        cb.on_retry("https://a", 1, 3, "timeout");
        cb.on_page_complete(1, 2, "https://a", 42);
        cb.on_page_error(2, 2, "https://b", "gone");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2, "https://a");
        tracker.on_retry("https://a", 1, 3, "timeout");
        tracker.on_page_complete(1, 2, "https://a", 10);
        tracker.on_page_start(2, 2, "https://b");
        tracker.on_page_error(2, 2, "https://b", "gone");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.retries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_page_complete(1, 10, "https://a", 512);
    }
}
