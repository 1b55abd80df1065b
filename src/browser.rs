//! Page drivers: the rendering engines the fetcher talks to.
//!
//! [`PageDriver`] is the seam between the retry loop and a concrete engine.
//! Two engines ship with the crate:
//!
//! * [`ChromeDriver`]: headless Chromium over CDP (`chromiumoxide`). Runs the
//!   page's JavaScript, so single-page applications render fully.
//! * [`HttpDriver`]: a plain `reqwest` GET. No JavaScript; suitable for
//!   server-rendered sites and saved snapshots.
//!
//! A driver owns one page/session and is used serially for a whole run.

use crate::config::{WaitStrategy, DEFAULT_USER_AGENT};
use crate::error::{DriverError, Spa2MdError};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One browser tab (or equivalent) driven serially by the fetcher.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait until `wait_until` is satisfied, at most
    /// `timeout`.
    async fn goto(
        &mut self,
        url: &str,
        wait_until: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Fixed pause letting deferred client-side rendering settle.
    async fn wait_for_timeout(&mut self, duration: Duration);

    async fn title(&mut self) -> Result<String, DriverError>;

    /// Serialised markup of the current page.
    async fn content(&mut self) -> Result<String, DriverError>;

    /// Reload the current page.
    async fn reload(&mut self, timeout: Duration) -> Result<(), DriverError>;

    /// Release the session. Called once at the end of a run.
    async fn close(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
impl<D: PageDriver + ?Sized> PageDriver for Box<D> {
    async fn goto(
        &mut self,
        url: &str,
        wait_until: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        (**self).goto(url, wait_until, timeout).await
    }

    async fn wait_for_timeout(&mut self, duration: Duration) {
        (**self).wait_for_timeout(duration).await
    }

    async fn title(&mut self) -> Result<String, DriverError> {
        (**self).title().await
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        (**self).content().await
    }

    async fn reload(&mut self, timeout: Duration) -> Result<(), DriverError> {
        (**self).reload(timeout).await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        (**self).close().await
    }
}

/// Source of the backoff and rate-limit pauses.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real pauses on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Which engine the CLI should launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    #[default]
    Chrome,
    Http,
}

impl std::str::FromStr for Engine {
    type Err = Spa2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Engine::Chrome),
            "http" => Ok(Engine::Http),
            other => Err(Spa2MdError::InvalidConfig(format!(
                "unknown engine '{other}' (expected chrome or http)"
            ))),
        }
    }
}

// ── Chromium ─────────────────────────────────────────────────────────────────

/// Quiet window that counts as "network idle".
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Headless Chromium through the DevTools protocol.
pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromeDriver {
    /// Launch Chromium with a 1920×1080 viewport and the given user agent.
    pub async fn launch(headless: bool, user_agent: Option<&str>) -> Result<Self, Spa2MdError> {
        let ua = user_agent.unwrap_or(DEFAULT_USER_AGENT);
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .arg(format!("--user-agent={ua}"));
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Spa2MdError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Spa2MdError::BrowserLaunch(e.to_string()))?;

        // The CDP event loop must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Spa2MdError::BrowserLaunch(e.to_string()))?;

        info!(headless, "Chromium launched");
        Ok(Self {
            browser,
            page,
            handler,
            closed: false,
        })
    }

    async fn eval_string(&self, expr: &str) -> Result<String, DriverError> {
        self.page
            .evaluate(expr)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .into_value::<String>()
            .map_err(|e| DriverError::Content(e.to_string()))
    }

    async fn eval_u64(&self, expr: &str) -> Result<u64, DriverError> {
        self.page
            .evaluate(expr)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .into_value::<u64>()
            .map_err(|e| DriverError::Content(e.to_string()))
    }

    /// Poll until the page satisfies `wait_until`.
    async fn settle(&self, wait_until: WaitStrategy) -> Result<(), DriverError> {
        loop {
            let state = self.eval_string("document.readyState").await?;
            let ready = match wait_until {
                WaitStrategy::DomContentLoaded => state != "loading",
                WaitStrategy::Load | WaitStrategy::NetworkIdle => state == "complete",
            };
            if ready {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        if wait_until == WaitStrategy::NetworkIdle {
            let expr = "performance.getEntriesByType('resource').length";
            let mut last = self.eval_u64(expr).await?;
            let mut quiet_since = Instant::now();
            while quiet_since.elapsed() < NETWORK_IDLE_WINDOW {
                tokio::time::sleep(POLL_INTERVAL).await;
                let now = self.eval_u64(expr).await?;
                if now != last {
                    last = now;
                    quiet_since = Instant::now();
                }
            }
        }
        Ok(())
    }

    async fn navigate(
        &mut self,
        url: Option<&str>,
        wait_until: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let work = async {
            match url {
                Some(url) => {
                    self.page
                        .goto(url)
                        .await
                        .map_err(|e| DriverError::Navigation(e.to_string()))?;
                }
                None => {
                    self.page
                        .reload()
                        .await
                        .map_err(|e| DriverError::Navigation(e.to_string()))?;
                }
            }
            self.settle(wait_until).await
        };
        tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| DriverError::Timeout {
                ms: timeout.as_millis() as u64,
            })?
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn goto(
        &mut self,
        url: &str,
        wait_until: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.navigate(Some(url), wait_until, timeout).await
    }

    async fn wait_for_timeout(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn title(&mut self) -> Result<String, DriverError> {
        self.page
            .get_title()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| DriverError::Content(e.to_string()))
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::Content(e.to_string()))
    }

    async fn reload(&mut self, timeout: Duration) -> Result<(), DriverError> {
        self.navigate(None, WaitStrategy::Load, timeout).await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            debug!("browser process wait: {e}");
        }
        self.handler.abort();
        result
            .map(|_| ())
            .map_err(|e| DriverError::Navigation(format!("browser close: {e}")))
    }
}

// ── Plain HTTP ───────────────────────────────────────────────────────────────

/// Fetches raw server markup with `reqwest`. Wait strategies and the extra
/// wait are meaningless without a JavaScript engine and are ignored.
pub struct HttpDriver {
    client: reqwest::Client,
    current_url: Option<String>,
    body: Option<String>,
}

impl HttpDriver {
    pub fn new(user_agent: Option<&str>) -> Result<Self, Spa2MdError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Spa2MdError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            current_url: None,
            body: None,
        })
    }

    async fn get(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                DriverError::Timeout {
                    ms: timeout.as_millis() as u64,
                }
            } else {
                DriverError::Navigation(e.to_string())
            }
        };

        self.current_url = Some(url.to_string());
        self.body = None;
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Navigation(format!(
                "request to {url} failed with status: {status}"
            )));
        }
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                classify(e)
            } else {
                DriverError::Content(e.to_string())
            }
        })?;
        self.body = Some(body);
        Ok(())
    }

    fn loaded_body(&self) -> Result<&str, DriverError> {
        self.body
            .as_deref()
            .ok_or_else(|| DriverError::Content("no page loaded".into()))
    }
}

/// Text of the document's `<title>`, trimmed; empty when absent.
pub fn document_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    doc.select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl PageDriver for HttpDriver {
    async fn goto(
        &mut self,
        url: &str,
        _wait_until: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.get(url, timeout).await
    }

    async fn wait_for_timeout(&mut self, _duration: Duration) {}

    async fn title(&mut self) -> Result<String, DriverError> {
        Ok(document_title(self.loaded_body()?))
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.loaded_body().map(str::to_string)
    }

    async fn reload(&mut self, timeout: Duration) -> Result<(), DriverError> {
        let url = self
            .current_url
            .clone()
            .ok_or_else(|| DriverError::Navigation("nothing to reload".into()))?;
        self.get(&url, timeout).await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.current_url = None;
        self.body = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_markup() {
        assert_eq!(
            document_title("<html><head><title> Button 按钮 </title></head></html>"),
            "Button 按钮"
        );
        assert_eq!(document_title("<p>no title</p>"), "");
    }

    #[test]
    fn engine_from_str() {
        assert_eq!("chrome".parse::<Engine>().unwrap(), Engine::Chrome);
        assert_eq!("HTTP".parse::<Engine>().unwrap(), Engine::Http);
        assert!("gecko".parse::<Engine>().is_err());
    }

    #[tokio::test]
    async fn http_driver_without_page_reports_content_error() {
        let mut driver = HttpDriver::new(None).unwrap();
        let err = driver.content().await.unwrap_err();
        assert!(matches!(err, DriverError::Content(_)));
        let err = driver.reload(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, DriverError::Navigation(_)));
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn tokio_sleeper_zero_is_immediate() {
        let started = Instant::now();
        TokioSleeper.sleep(Duration::ZERO).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
