//! Embedded data blob extraction.
//!
//! Page-generation frameworks ship the page's data model inside a script
//! tag, either as a global assignment (`window.__NEXT_DATA__ = {...}`) or as
//! a JSON script with a well-known id. When the blob carries an event
//! object at the configured path, its fields are the most reliable source
//! for the date and description.

use serde_json::Value;

use super::{CandidateSet, ExtractionStrategy};
use crate::document::DocumentTree;
use crate::error::ScrapeError;
use crate::policy::StructuredPolicy;
use crate::types::{CandidateField, FieldName};

/// Reads the event object out of an embedded data blob.
pub struct EmbeddedDataStrategy {
    policy: StructuredPolicy,
}

impl EmbeddedDataStrategy {
    pub fn new(policy: StructuredPolicy) -> Self {
        Self { policy }
    }

    /// Find the first script carrying a blob and parse it.
    ///
    /// `None` means no script carried a marker. `Some(Err(_))` means the
    /// first marked script could not be parsed.
    pub fn locate_blob(&self, tree: &DocumentTree) -> Option<Result<Value, ScrapeError>> {
        tree.script_texts().into_iter().find_map(|script| {
            if let Some(payload) = self.assignment_payload(&script.text) {
                return Some(parse_blob(payload));
            }
            let by_id = script
                .id
                .is_some_and(|id| self.policy.script_ids.iter().any(|s| s == id));
            by_id.then(|| parse_blob(&script.text))
        })
    }

    /// Text after the first `=` following an assignment marker.
    fn assignment_payload<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.policy.assignment_markers.iter().find_map(|marker| {
            let start = text.find(marker.as_str())? + marker.len();
            let (_, rhs) = text[start..].split_once('=')?;
            Some(rhs)
        })
    }

    /// Walk the configured path down to the event object.
    fn event_object<'v>(&self, root: &'v Value) -> Option<&'v serde_json::Map<String, Value>> {
        self.policy
            .event_path
            .iter()
            .try_fold(root, |node, key| node.get(key))?
            .as_object()
    }

    /// Build candidates from an event object. Description parts are added in
    /// a fixed order: location, genres, event type, minimum age, free text.
    fn candidates_from_event(&self, event: &serde_json::Map<String, Value>) -> CandidateSet {
        let keys = &self.policy.fields;
        let labels = &self.policy.labels;
        let mut set = CandidateSet::new();

        if let Some(date) = event.get(&keys.date).and_then(scalar_text) {
            set.insert(CandidateField::structured(FieldName::EventDate, date));
        }

        let mut parts: Vec<String> = Vec::new();
        if let Some(address) = event.get(&keys.address).and_then(scalar_text) {
            parts.push(format!("{}: {address}", labels.address));
        }
        if let Some(genres) = event.get(&keys.genres).and_then(Value::as_array) {
            let names: Vec<String> = genres.iter().filter_map(scalar_text).collect();
            if !names.is_empty() {
                parts.push(format!(
                    "{}: {}",
                    labels.genres,
                    names.join(&self.policy.list_separator)
                ));
            }
        }
        if let Some(kind) = event.get(&keys.event_type).and_then(scalar_text) {
            parts.push(format!("{}: {kind}", labels.event_type));
        }
        if let Some(age) = event.get(&keys.minimum_age).and_then(scalar_text) {
            parts.push(format!("{}: {age}", labels.minimum_age));
        }
        if let Some(text) = event.get(&keys.description).and_then(scalar_text) {
            parts.push(text);
        }

        if !parts.is_empty() {
            set.insert(CandidateField::structured(
                FieldName::Description,
                parts.join(&self.policy.part_separator),
            ));
        }
        set
    }
}

impl ExtractionStrategy for EmbeddedDataStrategy {
    fn name(&self) -> &'static str {
        "embedded_data"
    }

    fn provides(&self) -> &'static [FieldName] {
        &[FieldName::EventDate, FieldName::Description]
    }

    fn extract(&self, tree: &DocumentTree) -> CandidateSet {
        let blob = match self.locate_blob(tree) {
            None => {
                tracing::debug!("no embedded data blob found");
                return CandidateSet::new();
            }
            Some(Err(e)) => {
                tracing::warn!("{e}; falling back to text heuristics");
                return CandidateSet::new();
            }
            Some(Ok(blob)) => blob,
        };
        match self.event_object(&blob) {
            Some(event) => self.candidates_from_event(event),
            None => {
                tracing::debug!(
                    "embedded data blob has no object at {}",
                    self.policy.event_path.join(".")
                );
                CandidateSet::new()
            }
        }
    }
}

/// Parse the first JSON value in `payload`, ignoring anything after it
/// (a trailing `;` or further statements).
fn parse_blob(payload: &str) -> Result<Value, ScrapeError> {
    serde_json::Deserializer::from_str(payload.trim())
        .into_iter::<Value>()
        .next()
        .unwrap_or_else(|| Err(<serde_json::Error as serde::de::Error>::custom("empty payload")))
        .map_err(|e| ScrapeError::ParseFailure(e.to_string()))
}

/// Display text of a scalar JSON value. Strings pass through verbatim;
/// numbers and booleans use their JSON form. Blank strings, null, arrays and
/// objects yield `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ExtractionPolicy;

    fn strategy() -> EmbeddedDataStrategy {
        EmbeddedDataStrategy::new(ExtractionPolicy::embedded().unwrap().structured)
    }

    fn page(script: &str) -> DocumentTree {
        DocumentTree::parse(&format!(
            "<html><head><title>t</title></head><body><script>{script}</script></body></html>"
        ))
    }

    #[test]
    fn test_full_event_object() {
        let tree = page(
            r#"window.__NEXT_DATA__ = {"props":{"pageProps":{"event":{
                "StartingDate":"2024-07-01T21:00:00",
                "Adress":"Park X",
                "MusicType":["Techno","House"],
                "EventType":"Party",
                "MinimumAge":18,
                "Description":"Best night of the summer"
            }}}};"#,
        );
        let set = strategy().extract(&tree);
        assert_eq!(set.value(FieldName::EventDate), Some("2024-07-01T21:00:00"));
        assert_eq!(
            set.value(FieldName::Description),
            Some(
                "מיקום: Park X\n\nסוגי מוזיקה: Techno, House\n\nסוג אירוע: Party\n\nגיל מינימלי: 18\n\nBest night of the summer"
            )
        );
    }

    #[test]
    fn test_partial_event_keeps_order() {
        let tree = page(
            r#"window.__NEXT_DATA__={"props":{"pageProps":{"event":{"Description":"free text","Adress":"Hall 2"}}}}"#,
        );
        let set = strategy().extract(&tree);
        assert!(!set.contains(FieldName::EventDate));
        assert_eq!(
            set.value(FieldName::Description),
            Some("מיקום: Hall 2\n\nfree text")
        );
    }

    #[test]
    fn test_non_list_genres_are_ignored() {
        let tree = page(
            r#"window.__NEXT_DATA__ = {"props":{"pageProps":{"event":{"MusicType":"Techno","EventType":"Rave"}}}}"#,
        );
        let set = strategy().extract(&tree);
        assert_eq!(set.value(FieldName::Description), Some("סוג אירוע: Rave"));
    }

    #[test]
    fn test_json_script_by_id() {
        let tree = DocumentTree::parse(
            r#"<title>t</title><script id="__NEXT_DATA__" type="application/json">
               {"props":{"pageProps":{"event":{"StartingDate":"2024-08-15"}}}}</script>"#,
        );
        let set = strategy().extract(&tree);
        assert_eq!(set.value(FieldName::EventDate), Some("2024-08-15"));
    }

    #[test]
    fn test_missing_marker_yields_nothing() {
        let tree = page("var config = {\"a\": 1};");
        assert!(strategy().locate_blob(&tree).is_none());
        assert!(strategy().extract(&tree).is_empty());
    }

    #[test]
    fn test_malformed_blob_yields_nothing() {
        let tree = page("window.__NEXT_DATA__ = {props: oops");
        assert!(matches!(
            strategy().locate_blob(&tree),
            Some(Err(ScrapeError::ParseFailure(_)))
        ));
        assert!(strategy().extract(&tree).is_empty());
    }

    #[test]
    fn test_marker_without_assignment_yields_nothing() {
        let tree = page("console.log(window.__NEXT_DATA__)");
        assert!(strategy().locate_blob(&tree).is_none());
    }

    #[test]
    fn test_missing_event_path_yields_nothing() {
        let tree = page(r#"window.__NEXT_DATA__ = {"props":{"pageProps":{"venue":{}}}}"#);
        assert!(matches!(strategy().locate_blob(&tree), Some(Ok(_))));
        assert!(strategy().extract(&tree).is_empty());
    }

    #[test]
    fn test_equals_inside_prefix_is_skipped() {
        let tree = page(
            r#"var a=1; window.__NEXT_DATA__ = {"props":{"pageProps":{"event":{"StartingDate":"2024-01-02"}}}}"#,
        );
        let set = strategy().extract(&tree);
        assert_eq!(set.value(FieldName::EventDate), Some("2024-01-02"));
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&Value::from("x")), Some("x".to_string()));
        assert_eq!(scalar_text(&Value::from(21)), Some("21".to_string()));
        assert_eq!(scalar_text(&Value::from("  ")), None);
        assert_eq!(scalar_text(&Value::Null), None);
        assert_eq!(scalar_text(&serde_json::json!(["a"])), None);
    }
}
