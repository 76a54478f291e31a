//! Fetcher combining the static HTTP client and the browser renderer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use super::http_client::HttpClient;
use crate::error::ScrapeResult;
use crate::renderer::Renderer;
use crate::types::{FetchMode, RawDocument};

/// Obtains raw documents for the pipeline.
#[derive(Clone)]
pub struct PageFetcher {
    http: HttpClient,
    renderer: Arc<dyn Renderer>,
    render_timeout: Duration,
}

impl PageFetcher {
    pub fn new(http: HttpClient, renderer: Arc<dyn Renderer>, render_timeout: Duration) -> Self {
        Self {
            http,
            renderer,
            render_timeout,
        }
    }

    /// Single GET with the configured user agent. Non-2xx is a failure.
    pub async fn fetch_static(&self, url: &str) -> ScrapeResult<RawDocument> {
        info!("fetching {url} (static)");
        let start = Instant::now();
        let resp = self.http.get(url).await?;
        info!(
            "static fetch done: status {}, {} bytes in {}ms",
            resp.status,
            resp.body.len(),
            start.elapsed().as_millis()
        );
        Ok(RawDocument {
            html: resp.body,
            mode: FetchMode::Static,
            final_url: resp.final_url,
        })
    }

    /// Load the page in a headless browser and capture the rendered DOM.
    pub async fn fetch_rendered(&self, url: &str) -> ScrapeResult<RawDocument> {
        info!(
            "fetching {url} (rendered, timeout {}s)",
            self.render_timeout.as_secs()
        );
        let page = self.renderer.render(url, self.render_timeout).await?;
        info!(
            "rendered fetch done: {} bytes in {}ms",
            page.html.len(),
            page.load_time_ms
        );
        Ok(RawDocument {
            html: page.html,
            mode: FetchMode::Rendered,
            final_url: page.final_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::renderer::NoopRenderer;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> PageFetcher {
        let http = HttpClient::new("test-agent", Duration::from_secs(5)).unwrap();
        PageFetcher::new(http, Arc::new(NoopRenderer), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_fetch_static_tags_mode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>A</title>"))
            .mount(&server)
            .await;

        let doc = fetcher().fetch_static(&server.uri()).await.unwrap();
        assert_eq!(doc.mode, FetchMode::Static);
        assert_eq!(doc.html, "<title>A</title>");
    }

    #[tokio::test]
    async fn test_fetch_rendered_propagates_renderer_error() {
        let err = fetcher()
            .fetch_rendered("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::RenderUnavailable(_)));
    }
}
