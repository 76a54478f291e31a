//! Extraction controller.
//!
//! One invocation walks a small state machine:
//!
//! ```text
//! START -> STATIC_FETCHED -> STRUCTURED_{OK,EMPTY} -> HEURISTIC_{OK,EMPTY} -> ASSEMBLED -> DONE
//!                  \-- insufficient --> RENDERED_FETCHED -> (extraction again, once)
//! ```
//!
//! Fetch failures and a missing title end in `FAILED`. Everything else is
//! absorbed and ends in `DONE` with a record, possibly with null fields.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::acquisition::fetcher::PageFetcher;
use crate::acquisition::http_client::HttpClient;
use crate::assemble::ResultAssembler;
use crate::config::ScraperConfig;
use crate::document::DocumentTree;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::page_meta::{extract_image, extract_title};
use crate::extract::{CandidateSet, StrategyChain};
use crate::policy::ImagePolicy;
use crate::renderer::Renderer;
use crate::types::{
    Confidence, EventRecord, ExtractionError, ExtractionRequest, FetchMode, FieldName, RawDocument,
};

/// Controller states, recorded in order for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    StaticFetched,
    StructuredOk,
    StructuredEmpty,
    HeuristicOk,
    HeuristicEmpty,
    RenderedFetched,
    Assembled,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Start => "START",
            PipelineState::StaticFetched => "STATIC_FETCHED",
            PipelineState::StructuredOk => "STRUCTURED_OK",
            PipelineState::StructuredEmpty => "STRUCTURED_EMPTY",
            PipelineState::HeuristicOk => "HEURISTIC_OK",
            PipelineState::HeuristicEmpty => "HEURISTIC_EMPTY",
            PipelineState::RenderedFetched => "RENDERED_FETCHED",
            PipelineState::Assembled => "ASSEMBLED",
            PipelineState::Done => "DONE",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Visited states plus every error that was absorbed on the way.
#[derive(Debug, Clone)]
pub struct PipelineTrace {
    states: Vec<PipelineState>,
    absorbed: Vec<String>,
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self {
            states: vec![PipelineState::Start],
            absorbed: Vec::new(),
        }
    }
}

impl PipelineTrace {
    pub fn push(&mut self, state: PipelineState) {
        debug!("pipeline state -> {state}");
        self.states.push(state);
    }

    pub fn absorb(&mut self, err: &ScrapeError) {
        self.absorbed.push(err.to_string());
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }
}

impl fmt::Display for PipelineTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.states.iter().map(|s| s.to_string()).collect();
        write!(f, "state trace: {}", path.join(" -> "))?;
        for note in &self.absorbed {
            write!(f, "\nabsorbed: {note}")?;
        }
        Ok(())
    }
}

/// Result of extracting one raw document, before assembly.
#[derive(Debug, Clone)]
pub struct DocumentExtraction {
    pub mode: FetchMode,
    pub title: Option<String>,
    pub image: Option<String>,
    pub candidates: CandidateSet,
    /// Strategies that ran, with their candidate counts.
    pub ran: Vec<(&'static str, usize)>,
}

impl DocumentExtraction {
    /// A document is good enough to skip the rendered fallback when it has a
    /// title and at least one body field.
    pub fn is_sufficient(&self) -> bool {
        self.title.is_some()
            && (self.candidates.contains(FieldName::EventDate)
                || self.candidates.contains(FieldName::Description))
    }

    /// Combine a rendered extraction with the static one it replaces. The
    /// rendered title and image win when present; static candidates are
    /// folded in under the usual precedence, so at equal confidence the
    /// rendered value is kept.
    pub fn merged_with(mut self, fallback: DocumentExtraction) -> Self {
        self.title = self.title.or(fallback.title);
        self.image = self.image.or(fallback.image);
        self.candidates.merge(fallback.candidates);
        self.ran.extend(fallback.ran);
        self
    }
}

/// Terminal output of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(EventRecord),
    Failure(ExtractionError),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success(_) => 0,
            Outcome::Failure(_) => 1,
        }
    }

    pub fn record(&self) -> Option<&EventRecord> {
        match self {
            Outcome::Success(record) => Some(record),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ExtractionError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(err) => Some(err),
        }
    }
}

/// The extraction pipeline. Holds no per-request state; one instance can
/// serve any number of sequential or concurrent `run` calls.
pub struct Pipeline {
    fetcher: PageFetcher,
    chain: StrategyChain,
    assembler: ResultAssembler,
    image_policy: ImagePolicy,
}

impl Pipeline {
    /// Build a pipeline with an explicit renderer.
    pub fn new(config: &ScraperConfig, renderer: Arc<dyn Renderer>) -> ScrapeResult<Self> {
        let http = HttpClient::new(&config.policy.user_agent, config.http_timeout)?;
        Ok(Self {
            fetcher: PageFetcher::new(http, renderer, config.render_timeout),
            chain: StrategyChain::from_policy(&config.policy),
            assembler: ResultAssembler::new(config.policy.title_prefix.clone()),
            image_policy: config.policy.image.clone(),
        })
    }

    /// Build a pipeline using the renderer the configuration selects.
    pub fn from_config(config: &ScraperConfig) -> ScrapeResult<Self> {
        Self::new(config, config.renderer())
    }

    /// Run one extraction. Never returns an error: every failure is folded
    /// into [`Outcome::Failure`].
    pub async fn run(&self, raw_url: &str) -> Outcome {
        let start = Instant::now();
        let mut trace = PipelineTrace::default();
        let result = self.execute(raw_url, &mut trace).await;
        let outcome = match result {
            Ok(record) => {
                trace.push(PipelineState::Done);
                Outcome::Success(record)
            }
            Err(err) => {
                trace.push(PipelineState::Failed);
                warn!("extraction failed: {err}");
                Outcome::Failure(ExtractionError {
                    error: err.headline(),
                    details: Some(format!("{err}\n{trace}")),
                    url: Some(raw_url.to_string()),
                })
            }
        };
        info!(
            "extraction finished in {}ms ({})",
            start.elapsed().as_millis(),
            trace
                .states()
                .last()
                .map(|s| s.to_string())
                .unwrap_or_default()
        );
        outcome
    }

    async fn execute(&self, raw_url: &str, trace: &mut PipelineTrace) -> ScrapeResult<EventRecord> {
        let request = ExtractionRequest::new(raw_url)?;
        let url = request.url();
        let output_url = raw_url.trim();

        let mut static_error = None;
        let static_extraction = match self.fetcher.fetch_static(url).await {
            Ok(doc) => {
                trace.push(PipelineState::StaticFetched);
                Some(self.extract_document(&doc, trace))
            }
            Err(err) if err.is_recoverable() => {
                warn!("static fetch failed, trying rendered fetch: {err}");
                trace.absorb(&err);
                static_error = Some(err);
                None
            }
            Err(err) => return Err(err),
        };

        if let Some(extraction) = &static_extraction {
            if extraction.is_sufficient() {
                return self.finish(extraction, output_url, trace);
            }
            info!(
                "static document insufficient (title: {}, fields: {}), falling back to rendered fetch",
                extraction.title.is_some(),
                extraction.candidates.len()
            );
        }

        // Rendered fallback, taken at most once.
        match self.fetcher.fetch_rendered(url).await {
            Ok(doc) => {
                trace.push(PipelineState::RenderedFetched);
                let rendered = self.extract_document(&doc, trace);
                let extraction = match static_extraction {
                    Some(fallback) => rendered.merged_with(fallback),
                    None => rendered,
                };
                self.finish(&extraction, output_url, trace)
            }
            Err(render_err) => {
                warn!("rendered fetch failed: {render_err}");
                match (static_extraction, static_error) {
                    (Some(extraction), _) if extraction.title.is_some() => {
                        trace.absorb(&render_err);
                        self.finish(&extraction, output_url, trace)
                    }
                    (Some(_), _) if render_err.is_recoverable() => Err(ScrapeError::TitleMissing),
                    (None, Some(fetch_err)) if render_err.is_recoverable() => Err(fetch_err),
                    _ => Err(render_err),
                }
            }
        }
    }

    /// Parse one raw document and run every extractor over it.
    ///
    /// Synchronous on purpose: the parsed tree is not `Send` and must not be
    /// held across an await point.
    pub fn extract_document(
        &self,
        doc: &RawDocument,
        trace: &mut PipelineTrace,
    ) -> DocumentExtraction {
        let tree = DocumentTree::parse(&doc.html);
        let title = extract_title(&tree).ok();
        let image = extract_image(&tree, &self.image_policy);
        let outcome = self.chain.run(&tree);

        let has = |confidence: Confidence| {
            outcome
                .candidates
                .iter()
                .any(|c| c.confidence == confidence)
        };
        trace.push(if has(Confidence::Structured) {
            PipelineState::StructuredOk
        } else {
            PipelineState::StructuredEmpty
        });
        trace.push(if has(Confidence::Heuristic) {
            PipelineState::HeuristicOk
        } else {
            PipelineState::HeuristicEmpty
        });
        debug!(
            "{} document from {}: title={:?} image={} strategies={:?}",
            doc.mode,
            doc.final_url,
            title,
            image.is_some(),
            outcome.ran
        );

        DocumentExtraction {
            mode: doc.mode,
            title,
            image,
            candidates: outcome.candidates,
            ran: outcome.ran,
        }
    }

    fn finish(
        &self,
        extraction: &DocumentExtraction,
        url: &str,
        trace: &mut PipelineTrace,
    ) -> ScrapeResult<EventRecord> {
        let title = extraction.title.as_deref().ok_or(ScrapeError::TitleMissing)?;
        let record = self.assembler.assemble(
            title,
            extraction.image.clone(),
            &extraction.candidates,
            url,
        );
        trace.push(PipelineState::Assembled);
        info!(
            "assembled record from {} document (strategies: {:?})",
            extraction.mode, extraction.ran
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NoopRenderer;

    fn pipeline() -> Pipeline {
        let config = ScraperConfig::embedded().unwrap();
        Pipeline::new(&config, Arc::new(NoopRenderer)).unwrap()
    }

    fn raw(html: &str) -> RawDocument {
        RawDocument {
            html: html.to_string(),
            mode: FetchMode::Static,
            final_url: "https://example.com/e".to_string(),
        }
    }

    const BLOB_PAGE: &str = r#"<html><head><title>כרטיסים Summer Fest</title>
        <meta property="og:image" content="https://cdn.example.com/fest.jpg"></head>
        <body><p>Doors 23:30 at the venue</p>
        <script>window.__NEXT_DATA__ = {"props":{"pageProps":{"event":{
            "StartingDate":"2024-07-01","Adress":"Park X","MusicType":["House","Techno"],
            "Description":"Big party"}}}}</script></body></html>"#;

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::StaticFetched.to_string(), "STATIC_FETCHED");
        assert_eq!(PipelineState::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_trace_display_lists_path_and_absorbed_errors() {
        let mut trace = PipelineTrace::default();
        trace.push(PipelineState::StaticFetched);
        trace.absorb(&ScrapeError::status(500));
        trace.push(PipelineState::Failed);
        assert_eq!(
            trace.to_string(),
            "state trace: START -> STATIC_FETCHED -> FAILED\n\
             absorbed: Failed to fetch page: HTTP status 500"
        );
    }

    #[test]
    fn test_structured_candidates_beat_heuristic() {
        let mut trace = PipelineTrace::default();
        let extraction = pipeline().extract_document(&raw(BLOB_PAGE), &mut trace);
        assert!(extraction.is_sufficient());
        assert_eq!(extraction.title.as_deref(), Some("כרטיסים Summer Fest"));
        assert_eq!(
            extraction.image.as_deref(),
            Some("https://cdn.example.com/fest.jpg")
        );
        assert_eq!(
            extraction.candidates.value(FieldName::EventDate),
            Some("2024-07-01")
        );
        assert_eq!(
            extraction.candidates.value(FieldName::Description),
            Some("מיקום: Park X\n\nסוגי מוזיקה: House, Techno\n\nBig party")
        );
        assert_eq!(
            trace.states(),
            &[
                PipelineState::Start,
                PipelineState::StructuredOk,
                PipelineState::HeuristicEmpty
            ]
        );
    }

    #[test]
    fn test_shell_page_is_insufficient() {
        let mut trace = PipelineTrace::default();
        let extraction = pipeline().extract_document(
            &raw(r#"<html><body><div id="root"></div></body></html>"#),
            &mut trace,
        );
        assert!(!extraction.is_sufficient());
        assert!(extraction.title.is_none());
        assert!(extraction.candidates.is_empty());
    }

    #[test]
    fn test_title_without_body_fields_is_insufficient() {
        let mut trace = PipelineTrace::default();
        let extraction =
            pipeline().extract_document(&raw("<title>Only a title</title><p>hi</p>"), &mut trace);
        assert!(extraction.title.is_some());
        assert!(!extraction.is_sufficient());
    }

    #[test]
    fn test_merged_extraction_prefers_rendered_but_keeps_static_gaps() {
        let p = pipeline();
        let mut trace = PipelineTrace::default();
        let fallback = p.extract_document(
            &raw(r#"<title>Static Title</title>
                <meta property="og:image" content="https://cdn.example.com/s.jpg">
                <p>Doors 23:30</p>"#),
            &mut trace,
        );
        let rendered = p.extract_document(
            &RawDocument {
                html: r#"<div id="root"></div>"#.to_string(),
                mode: FetchMode::Rendered,
                final_url: "https://example.com/e".to_string(),
            },
            &mut trace,
        );

        let merged = rendered.merged_with(fallback);
        assert_eq!(merged.mode, FetchMode::Rendered);
        assert_eq!(merged.title.as_deref(), Some("Static Title"));
        assert_eq!(merged.image.as_deref(), Some("https://cdn.example.com/s.jpg"));
        assert_eq!(merged.candidates.value(FieldName::EventDate), Some("Doors 23:30"));
        assert!(merged.is_sufficient());
    }

    #[test]
    fn test_merged_extraction_keeps_structured_over_heuristic() {
        let p = pipeline();
        let mut trace = PipelineTrace::default();
        let fallback = p.extract_document(&raw("<title>Old</title><p>Doors 23:30</p>"), &mut trace);
        let rendered = p.extract_document(&raw(BLOB_PAGE), &mut trace);

        let merged = rendered.merged_with(fallback);
        assert_eq!(merged.title.as_deref(), Some("כרטיסים Summer Fest"));
        assert_eq!(merged.candidates.value(FieldName::EventDate), Some("2024-07-01"));
        assert!(merged.ran.contains(&("embedded_data", 2)));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let p = pipeline();
        let a = p.extract_document(&raw(BLOB_PAGE), &mut PipelineTrace::default());
        let b = p.extract_document(&raw(BLOB_PAGE), &mut PipelineTrace::default());
        assert_eq!(a.candidates, b.candidates);
        assert_eq!(a.title, b.title);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_fetching() {
        let outcome = pipeline().run("not a url").await;
        assert_eq!(outcome.exit_code(), 1);
        let err = outcome.error().unwrap();
        assert_eq!(err.error, "Invalid URL");
        assert_eq!(err.url.as_deref(), Some("not a url"));
        let details = err.details.as_deref().unwrap();
        assert!(details.contains("START -> FAILED"));
    }

    #[test]
    fn test_outcome_exit_codes() {
        let ok = Outcome::Success(EventRecord {
            event_name: "x".into(),
            image_url: None,
            event_date: None,
            description: None,
            url: "https://example.com".into(),
        });
        assert_eq!(ok.exit_code(), 0);
        assert!(ok.record().is_some());
        assert_eq!(Outcome::Failure(ExtractionError::no_url()).exit_code(), 1);
    }
}
