//! Core data types flowing through the extraction pipeline.

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// A single extraction request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    url: url::Url,
}

impl ExtractionRequest {
    /// Validate and wrap a target URL.
    pub fn new(raw: &str) -> Result<Self, ScrapeError> {
        let url = url::Url::parse(raw.trim()).map_err(|e| ScrapeError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self { url }),
            other => Err(ScrapeError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            }),
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

/// How a raw document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Single non-rendering HTTP GET.
    Static,
    /// Serialized DOM after client-side scripts ran in a browser.
    Rendered,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Static => f.write_str("static"),
            FetchMode::Rendered => f.write_str("rendered"),
        }
    }
}

/// Raw HTML text plus the method that produced it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub html: String,
    pub mode: FetchMode,
    /// Final URL after redirects, when the fetcher knows it.
    pub final_url: String,
}

/// Fields a strategy may contribute to the final record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldName {
    EventDate,
    Description,
}

/// Which kind of strategy produced a candidate. Ordered so that
/// `Structured > Heuristic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    Heuristic,
    Structured,
}

/// A tentatively extracted value, tagged by its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateField {
    pub field: FieldName,
    pub value: String,
    pub confidence: Confidence,
}

impl CandidateField {
    pub fn structured(field: FieldName, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            confidence: Confidence::Structured,
        }
    }

    pub fn heuristic(field: FieldName, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            confidence: Confidence::Heuristic,
        }
    }
}

/// The canonical extraction output.
///
/// Missing optional values serialize as `null`, never as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_name: String,
    pub image_url: Option<String>,
    pub event_date: Option<String>,
    pub description: Option<String>,
    pub url: String,
}

/// Terminal failure shape. Exactly one of [`EventRecord`] or this is produced
/// per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ExtractionError {
    /// The error emitted when the binary is invoked without a target.
    pub fn no_url() -> Self {
        Self {
            error: "No URL provided".to_string(),
            details: None,
            url: None,
        }
    }
}
