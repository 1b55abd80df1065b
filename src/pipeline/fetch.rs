//! Resilient fetcher: navigate, wait, capture, retry.
//!
//! ## Retry Strategy
//!
//! Every failure is retryable until `max_retries` attempts have been made.
//! Between attempts the fetcher waits `2^(attempt-1)` seconds (1 s, 2 s, 4 s…)
//! and, when the failure was a timeout, then issues a best-effort reload.
//! The reload's own outcome never changes the loop: it is logged, recorded
//! as `reload_attempted`, and the next attempt navigates from scratch.
//!
//! Pauses go through a [`Sleeper`] so tests can observe the schedule
//! without waiting for it.

use crate::browser::{PageDriver, Sleeper, TokioSleeper};
use crate::config::FetchConfig;
use crate::error::{DriverError, PageError};
use crate::output::{AttemptOutcome, FetchAttempt, FetchResult};
use crate::progress::ProgressCallback;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Pause after failed attempt number `attempt` (1-indexed).
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_secs(1u64 << exp)
}

/// The result of fetching one URL, with every attempt it took.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<FetchResult, PageError>,
    pub attempts: Vec<FetchAttempt>,
}

/// Drives one [`PageDriver`] through the retry loop.
pub struct Fetcher<D: PageDriver> {
    driver: D,
    config: FetchConfig,
    sleeper: Arc<dyn Sleeper>,
    progress: Option<ProgressCallback>,
}

impl<D: PageDriver> Fetcher<D> {
    pub fn new(driver: D, config: FetchConfig) -> Self {
        Self {
            driver,
            config,
            sleeper: Arc::new(TokioSleeper),
            progress: None,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub(crate) fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    /// Fetch `url`, retrying per the configured policy.
    pub async fn fetch(&mut self, url: &str) -> FetchOutcome {
        let max = self.config.max_retries.max(1);
        let mut attempts = Vec::with_capacity(max as usize);
        let mut last_error = String::new();

        for attempt in 1..=max {
            let started = Instant::now();
            match self.attempt(url).await {
                Ok(page) => {
                    info!(
                        url,
                        attempt,
                        html_length = page.html_length,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "page fetched"
                    );
                    attempts.push(FetchAttempt {
                        url: url.to_string(),
                        attempt_number: attempt,
                        outcome: AttemptOutcome::Success {
                            title: page.title.clone(),
                            html_length: page.html_length,
                        },
                    });
                    return FetchOutcome {
                        url: url.to_string(),
                        result: Ok(page),
                        attempts,
                    };
                }
                Err(err) => {
                    let detail = err.to_string();
                    if attempt < max {
                        let delay = backoff_delay(attempt);
                        warn!(
                            "{url}: attempt {attempt}/{max} failed: {detail}; retrying in {}s",
                            delay.as_secs()
                        );
                        if let Some(ref cb) = self.progress {
                            cb.on_retry(url, attempt, max, &detail);
                        }
                        self.sleeper.sleep(delay).await;
                        let reload_attempted = self.reload_after(&err).await;
                        attempts.push(FetchAttempt {
                            url: url.to_string(),
                            attempt_number: attempt,
                            outcome: AttemptOutcome::RetryableFailure {
                                kind: err.kind(),
                                detail: detail.clone(),
                                reload_attempted,
                            },
                        });
                    } else {
                        error!("{url}: giving up after {max} attempts: {detail}");
                        attempts.push(FetchAttempt {
                            url: url.to_string(),
                            attempt_number: attempt,
                            outcome: AttemptOutcome::TerminalFailure {
                                kind: err.kind(),
                                detail: detail.clone(),
                            },
                        });
                    }
                    last_error = detail;
                }
            }
        }

        FetchOutcome {
            url: url.to_string(),
            result: Err(PageError::FetchFailed {
                url: url.to_string(),
                attempts: max,
                detail: last_error,
            }),
            attempts,
        }
    }

    /// Fetch every URL in order, pausing `rate_limit` between consecutive
    /// URLs whatever their outcome.
    pub async fn fetch_all(&mut self, urls: &[String], rate_limit: Duration) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            if i > 0 {
                self.sleeper.sleep(rate_limit).await;
            }
            outcomes.push(self.fetch(url).await);
        }
        outcomes
    }

    /// Close the underlying driver.
    pub async fn close(&mut self) -> Result<(), DriverError> {
        self.driver.close().await
    }

    async fn attempt(&mut self, url: &str) -> Result<FetchResult, DriverError> {
        let timeout = self.config.timeout();
        tokio::time::timeout(
            timeout,
            self.driver.goto(url, self.config.wait_until, timeout),
        )
        .await
        .map_err(|_| DriverError::Timeout {
            ms: self.config.timeout_ms,
        })??;

        self.driver.wait_for_timeout(self.config.extra_wait()).await;

        let title = self.driver.title().await?;
        let html = self.driver.content().await?;
        Ok(FetchResult::new(url, title, html))
    }

    /// Best-effort reload before retrying a timed-out navigation. Returns
    /// whether one was issued; its outcome is ignored.
    async fn reload_after(&mut self, err: &DriverError) -> bool {
        if !err.is_timeout() {
            return false;
        }
        match self.driver.reload(self.config.timeout()).await {
            Ok(()) => debug!("reload after timeout succeeded"),
            Err(e) => debug!("reload after timeout failed (ignored): {e}"),
        }
        true
    }
}
