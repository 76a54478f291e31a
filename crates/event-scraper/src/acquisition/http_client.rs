//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, just one GET per page. Target sites are untrusted but
//! benign, so certificate errors are ignored rather than aborting the fetch.

use std::time::Duration;

use crate::error::{ScrapeError, ScrapeResult};

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

/// HTTP client for the static fetch path.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
}

impl HttpClient {
    /// Create a client sending `user_agent` and giving up after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> ScrapeResult<Self> {
        let build = |h1_only: bool| {
            let builder = reqwest::Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(5))
                .user_agent(user_agent)
                .danger_accept_invalid_certs(true);
            let builder = if h1_only {
                builder.http1_only()
            } else {
                builder
            };
            builder
                .build()
                .map_err(|e| ScrapeError::fetch(format!("failed to build HTTP client: {e}")))
        };

        Ok(Self {
            client: build(false)?,
            h1_client: build(true)?,
        })
    }

    /// Perform a GET request. Non-2xx responses are returned as
    /// [`ScrapeError::FetchFailure`] carrying the status.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str) -> ScrapeResult<HttpResponse> {
        let resp = match self.get_inner(&self.client, url).await {
            Ok(resp) => resp,
            Err(e) if looks_like_protocol_error(&e) => {
                tracing::debug!("retrying {url} over HTTP/1.1 after: {e}");
                self.get_inner(&self.h1_client, url).await?
            }
            Err(e) => return Err(e),
        };

        if !(200..300).contains(&resp.status) {
            return Err(ScrapeError::status(resp.status));
        }
        Ok(resp)
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> ScrapeResult<HttpResponse> {
        let r = client.get(url).send().await?;
        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let content_type = r
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = r.text().await?;

        Ok(HttpResponse {
            final_url,
            status,
            content_type,
            body,
        })
    }
}

fn looks_like_protocol_error(e: &ScrapeError) -> bool {
    match e {
        ScrapeError::FetchFailure {
            status: None,
            message,
        } => {
            let lowered = message.to_lowercase();
            lowered.contains("http2")
                || lowered.contains("protocol")
                || lowered.contains("connection closed")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "Mozilla/5.0 (test) Chrome/131.0.0.0";

    #[test]
    fn test_http_client_creation() {
        assert!(HttpClient::new(UA, Duration::from_secs(10)).is_ok());
    }

    #[tokio::test]
    async fn test_get_sends_user_agent_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/event"))
            .and(header("user-agent", UA))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<title>ok</title>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(UA, Duration::from_secs(5)).unwrap();
        let resp = client.get(&format!("{}/event", server.uri())).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "<title>ok</title>");
        assert_eq!(
            resp.content_type.as_deref(),
            Some("text/html; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(UA, Duration::from_secs(5)).unwrap();
        let err = client.get(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::FetchFailure {
                status: Some(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_fetch_failure() {
        let client = HttpClient::new(UA, Duration::from_secs(2)).unwrap();
        let err = client.get("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, ScrapeError::FetchFailure { status: None, .. }));
    }

    #[test]
    fn test_protocol_error_detection() {
        assert!(looks_like_protocol_error(&ScrapeError::fetch(
            "http2 error: stream reset"
        )));
        assert!(!looks_like_protocol_error(&ScrapeError::status(500)));
        assert!(!looks_like_protocol_error(&ScrapeError::fetch("dns error")));
    }
}
