//! Extraction policy: every marker, keyword list and threshold the
//! extractors consult.
//!
//! The defaults live in `policy.json`, embedded at compile time so there is
//! no runtime file I/O unless an override file is given. An override file
//! only needs the keys it changes; it is deep-merged over the defaults.

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Raw JSON of the default policy.
const POLICY_JSON: &str = include_str!("policy.json");

/// A list of substrings matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct KeywordSet(Vec<String>);

impl From<Vec<String>> for KeywordSet {
    fn from(words: Vec<String>) -> Self {
        Self(
            words
                .into_iter()
                .map(|w| w.to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        )
    }
}

impl KeywordSet {
    /// True if `text` contains any keyword, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        if self.0.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.0.iter().any(|k| lowered.contains(k.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Complete extraction policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionPolicy {
    /// `User-Agent` sent by the static fetcher.
    pub user_agent: String,
    /// Storefront prefix stripped from page titles.
    pub title_prefix: String,
    pub structured: StructuredPolicy,
    pub image: ImagePolicy,
    pub heuristic: HeuristicPolicy,
}

/// Where the embedded data blob lives and how to read it.
#[derive(Debug, Clone, Deserialize)]
pub struct StructuredPolicy {
    /// Global-assignment prefixes, e.g. `window.__NEXT_DATA__`.
    pub assignment_markers: Vec<String>,
    /// `id` attributes of JSON script tags carrying the same blob.
    pub script_ids: Vec<String>,
    /// Object path from the blob root to the event object.
    pub event_path: Vec<String>,
    pub fields: EventFieldKeys,
    pub labels: EventFieldLabels,
    /// Joins list-valued fields.
    pub list_separator: String,
    /// Joins description parts.
    pub part_separator: String,
}

/// Keys of the event object in the source site's data model.
#[derive(Debug, Clone, Deserialize)]
pub struct EventFieldKeys {
    pub date: String,
    pub address: String,
    pub genres: String,
    pub event_type: String,
    pub minimum_age: String,
    pub description: String,
}

/// Localized line labels for folded-in description parts.
#[derive(Debug, Clone, Deserialize)]
pub struct EventFieldLabels {
    pub address: String,
    pub genres: String,
    pub event_type: String,
    pub minimum_age: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagePolicy {
    /// `<meta property=...>` names checked first, in order.
    pub meta_properties: Vec<String>,
    /// Substrings an `<img src>` must contain to be used as a fallback.
    pub src_hints: Vec<String>,
}

/// Sub-strategies for the heuristic description, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionStrategyKind {
    MarkerBounded,
    KeywordBlocks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeuristicPolicy {
    /// Time-of-day substrings that mark the event date line.
    pub date_markers: Vec<String>,
    pub start_markers: KeywordSet,
    pub stop_markers: KeywordSet,
    /// Marker-bounded nodes must be longer than this (in characters).
    pub min_text_len: usize,
    /// Block-level tags scanned by the keyword strategy.
    pub block_tags: Vec<String>,
    /// Blocks starting with any of these are script/JSON noise.
    pub skip_prefixes: Vec<String>,
    pub deny_keywords: KeywordSet,
    pub allow_keywords: KeywordSet,
    /// Keyword-strategy lines must be longer than this (in characters).
    pub min_line_len: usize,
    pub description_strategies: Vec<DescriptionStrategyKind>,
}

impl ExtractionPolicy {
    /// The compiled-in default policy.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        serde_json::from_str(POLICY_JSON)
    }

    /// Load an override file and merge it over the embedded defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy {}", path.display()))?;
        Self::with_overrides(&text)
    }

    /// Merge a JSON override document over the embedded defaults.
    pub fn with_overrides(overrides: &str) -> anyhow::Result<Self> {
        let mut base: Value = serde_json::from_str(POLICY_JSON)?;
        let overlay: Value =
            serde_json::from_str(overrides).context("policy override is not valid JSON")?;
        merge_json(&mut base, overlay);
        Ok(serde_json::from_value(base)?)
    }
}

/// Recursively merge `overlay` into `base`. Objects merge key by key; any
/// other value replaces the base value wholesale.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
