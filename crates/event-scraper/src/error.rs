//! Error taxonomy for the extraction pipeline.

/// All errors the pipeline can raise internally.
///
/// Only [`ScrapeError::is_recoverable`] == `false` errors ever reach the
/// caller; the rest are absorbed at the component boundary.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("Invalid URL: {url} ({reason})")]
    InvalidUrl { url: String, reason: String },

    /// Network/transport error or a non-2xx response.
    #[error("Failed to fetch page: {message}")]
    FetchFailure {
        status: Option<u16>,
        message: String,
    },

    /// The document has no usable `<title>`.
    #[error("Failed to extract title")]
    TitleMissing,

    /// An embedded data blob was found but could not be parsed.
    #[error("Failed to parse embedded data: {0}")]
    ParseFailure(String),

    #[error("Rendering timed out after {timeout_secs}s")]
    RenderTimeout { timeout_secs: u64 },

    /// No browser backend is configured or installed.
    #[error("Browser rendering unavailable: {0}")]
    RenderUnavailable(String),

    #[error("Rendering failed: {0}")]
    Render(String),
}

impl ScrapeError {
    pub fn fetch(message: impl Into<String>) -> Self {
        ScrapeError::FetchFailure {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        ScrapeError::FetchFailure {
            status: Some(status),
            message: format!("HTTP status {status}"),
        }
    }

    /// Whether the pipeline may absorb this error and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScrapeError::FetchFailure { .. }
                | ScrapeError::ParseFailure(_)
                | ScrapeError::RenderUnavailable(_)
        )
    }

    /// Short human-readable message used as the `error` field of the
    /// terminal error record.
    pub fn headline(&self) -> String {
        match self {
            ScrapeError::InvalidUrl { .. } => "Invalid URL".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ScrapeError::FetchFailure {
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ScrapeError::status(404).is_recoverable());
        assert!(ScrapeError::ParseFailure("eof".into()).is_recoverable());
        assert!(ScrapeError::RenderUnavailable("none".into()).is_recoverable());
        assert!(!ScrapeError::TitleMissing.is_recoverable());
        assert!(!ScrapeError::RenderTimeout { timeout_secs: 30 }.is_recoverable());
    }

    #[test]
    fn test_headlines() {
        assert_eq!(ScrapeError::TitleMissing.headline(), "Failed to extract title");
        assert_eq!(
            ScrapeError::status(503).headline(),
            "Failed to fetch page: HTTP status 503"
        );
        let invalid = ScrapeError::InvalidUrl {
            url: "x".into(),
            reason: "relative URL without a base".into(),
        };
        assert_eq!(invalid.headline(), "Invalid URL");
    }
}
