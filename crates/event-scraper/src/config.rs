//! Runtime configuration for one scraper invocation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::policy::ExtractionPolicy;
use crate::renderer::chromium::{ChromiumOptions, ChromiumRenderer};
use crate::renderer::{NoopRenderer, Renderer};

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;

/// Everything the pipeline needs besides the target URL.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub policy: ExtractionPolicy,
    pub http_timeout: Duration,
    pub render_timeout: Duration,
    /// When false the rendered fallback is never attempted.
    pub render_fallback: bool,
    pub chromium: ChromiumOptions,
}

impl ScraperConfig {
    pub fn new(policy: ExtractionPolicy) -> Self {
        Self {
            policy,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            render_timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
            render_fallback: true,
            chromium: ChromiumOptions::default(),
        }
    }

    /// Defaults with the compiled-in policy.
    pub fn embedded() -> anyhow::Result<Self> {
        Ok(Self::new(ExtractionPolicy::embedded()?))
    }

    pub fn with_chromium_path(mut self, path: Option<PathBuf>) -> Self {
        self.chromium.executable = path;
        self
    }

    /// The renderer this configuration asks for.
    pub fn renderer(&self) -> Arc<dyn Renderer> {
        if self.render_fallback {
            Arc::new(ChromiumRenderer::new(self.chromium.clone()))
        } else {
            Arc::new(NoopRenderer)
        }
    }
}
