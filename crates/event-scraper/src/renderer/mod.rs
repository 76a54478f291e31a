//! Renderer abstraction for browser-based page rendering.
//!
//! The pipeline only needs one capability from a browser: turn a URL into
//! the HTML of the fully rendered page within a time bound. Keeping that
//! behind the `Renderer` trait lets the static path run and be tested
//! without any browser installed.

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ScrapeError, ScrapeResult};

/// A page after client-side scripts have run.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Serialized DOM (`document.documentElement.outerHTML`).
    pub html: String,
    /// Time from navigation start to capture, in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can render one URL at a time.
///
/// Implementations own the whole browser session for the duration of one
/// call and must release it before returning, on success and failure alike.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigate to `url` and return the rendered HTML, giving up with
    /// [`ScrapeError::RenderTimeout`] after `timeout`.
    async fn render(&self, url: &str, timeout: Duration) -> ScrapeResult<RenderedPage>;
}

/// A no-op renderer used when Chromium is unavailable or disabled.
///
/// Every call fails with [`ScrapeError::RenderUnavailable`], which the
/// pipeline treats as "no fallback possible".
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn render(&self, _url: &str, _timeout: Duration) -> ScrapeResult<RenderedPage> {
        Err(ScrapeError::RenderUnavailable(
            "browser rendering disabled, static fetch only".to_string(),
        ))
    }
}
