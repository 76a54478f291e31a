//! Chromium-based renderer using chromiumoxide.
//!
//! Each `render` call launches its own headless browser with a throw-away
//! profile directory, opens one page, captures the DOM and tears the whole
//! session down again. No state is shared between calls.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{RenderedPage, Renderer};
use crate::error::{ScrapeError, ScrapeResult};

/// Environment variable pointing at a Chromium/Chrome binary.
pub const CHROMIUM_PATH_ENV: &str = "EVENT_SCRAPER_CHROMIUM_PATH";

/// Fixed viewport for every rendered page.
pub const VIEWPORT_WIDTH: u32 = 1280;
pub const VIEWPORT_HEIGHT: u32 = 800;

/// Network is considered quiet once the resource count holds still this long.
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const QUIET_POLL: Duration = Duration::from_millis(250);

/// Upper bound for each browser teardown step.
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Number of loaded resources, or -1 while the document is still loading.
const RESOURCE_PROBE: &str = "document.readyState === 'complete' \
     ? performance.getEntriesByType('resource').length : -1";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Explicit path from the caller
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    // 2. EVENT_SCRAPER_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. Per-user cache install
    if let Some(cache) = dirs::cache_dir() {
        let base = cache.join("event-scraper/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                base.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            ]
        } else {
            vec![base.join("chrome-linux64/chrome"), base.join("chrome")]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launch options for [`ChromiumRenderer`].
#[derive(Debug, Clone, Default)]
pub struct ChromiumOptions {
    /// Browser binary; discovered with [`find_chromium`] when `None`.
    pub executable: Option<PathBuf>,
    /// Disable the Chromium sandbox (needed in some containers).
    pub no_sandbox: bool,
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    options: ChromiumOptions,
}

impl ChromiumRenderer {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self, executable: PathBuf, profile: &Path) -> ScrapeResult<BrowserConfig> {
        let viewport = Viewport {
            width: VIEWPORT_WIDTH,
            height: VIEWPORT_HEIGHT,
            ..Viewport::default()
        };
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile)
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .viewport(viewport)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--ignore-certificate-errors");
        if self.options.no_sandbox {
            builder = builder.no_sandbox();
        }
        builder
            .build()
            .map_err(|e| ScrapeError::Render(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> ScrapeResult<RenderedPage> {
        let executable = find_chromium(self.options.executable.as_deref()).ok_or_else(|| {
            ScrapeError::RenderUnavailable(format!(
                "Chromium not found; install Chrome/Chromium or set {CHROMIUM_PATH_ENV}"
            ))
        })?;
        let profile = tempfile::Builder::new()
            .prefix("event-scraper-profile-")
            .tempdir()
            .map_err(|e| ScrapeError::Render(format!("failed to create profile dir: {e}")))?;

        let config = self.browser_config(executable, profile.path())?;
        let mut session = BrowserSession::launch(config).await?;
        tracing::info!("browser launched, rendering {url}");

        let result = session.capture(url, timeout).await;
        session.close().await;
        result
    }
}

/// One launched browser plus its CDP event loop.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig) -> ScrapeResult<Self> {
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Render(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            handler,
            page: None,
        })
    }

    /// Open a page, navigate, wait for the network to settle and serialize
    /// the DOM, all within `timeout`.
    async fn capture(&mut self, url: &str, timeout: Duration) -> ScrapeResult<RenderedPage> {
        let start = Instant::now();
        let work = async {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| ScrapeError::Render(format!("failed to create new page: {e}")))?;
            self.page = Some(page.clone());

            page.goto(url)
                .await
                .map_err(|e| ScrapeError::Render(format!("navigation failed: {e}")))?;
            let _ = page.wait_for_navigation().await;
            wait_for_network_quiet(&page).await;

            let html: String = page
                .evaluate("document.documentElement.outerHTML")
                .await
                .map_err(|e| ScrapeError::Render(format!("failed to get HTML: {e}")))?
                .into_value()
                .map_err(|e| ScrapeError::Render(format!("failed to convert HTML result: {e}")))?;

            let final_url = page
                .url()
                .await
                .ok()
                .flatten()
                .map(|u| u.to_string())
                .unwrap_or_else(|| url.to_string());

            Ok(RenderedPage {
                final_url,
                html,
                load_time_ms: start.elapsed().as_millis() as u64,
            })
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::RenderTimeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// Close page and browser, each step bounded by `TEARDOWN_GRACE`. If the
    /// browser does not exit cleanly its process is killed. Failures are
    /// logged, never returned.
    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            bounded_step("close page", TEARDOWN_GRACE, page.close()).await;
        }
        let exited = bounded_step("close browser", TEARDOWN_GRACE, self.browser.close()).await
            && bounded_step("reap browser process", TEARDOWN_GRACE, self.browser.wait()).await;
        if !exited {
            match tokio::time::timeout(TEARDOWN_GRACE, self.browser.kill()).await {
                Ok(Some(Err(e))) => tracing::warn!("failed to kill browser process: {e}"),
                Ok(_) => tracing::debug!("browser process killed"),
                Err(_) => tracing::warn!(
                    "killing browser process timed out after {}s",
                    TEARDOWN_GRACE.as_secs()
                ),
            }
        }
        self.handler.abort();
        tracing::debug!("browser session closed");
    }
}

/// Await one teardown step for at most `grace`. Returns whether it
/// completed successfully; failures and timeouts are logged at warn.
async fn bounded_step<T, E, F>(what: &str, grace: Duration, step: F) -> bool
where
    E: std::fmt::Display,
    F: std::future::Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(grace, step).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::warn!("failed to {what}: {e}");
            false
        }
        Err(_) => {
            tracing::warn!("{what} timed out after {}ms", grace.as_millis());
            false
        }
    }
}

/// Poll until the page's resource count stops changing for `QUIET_WINDOW`.
/// Bounded by the caller's timeout; probe errors end the wait early.
async fn wait_for_network_quiet(page: &Page) {
    let mut last: Option<i64> = None;
    let mut quiet_since = Instant::now();
    loop {
        let sample = match page.evaluate(RESOURCE_PROBE).await {
            Ok(v) => v.into_value::<i64>().unwrap_or(-1),
            Err(e) => {
                tracing::debug!("network probe failed: {e}");
                return;
            }
        };
        if sample >= 0 && last == Some(sample) {
            if quiet_since.elapsed() >= QUIET_WINDOW {
                return;
            }
        } else {
            last = Some(sample);
            quiet_since = Instant::now();
        }
        tokio::time::sleep(QUIET_POLL).await;
    }
}
