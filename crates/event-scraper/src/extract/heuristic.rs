//! Text-scanning strategies for pages without an embedded data blob.
//!
//! These are tuned to how the target venue pages are written, not general
//! parsers: the date is whatever line carries a known opening-hour marker,
//! and the description is either the run of text after a start marker or
//! the event-flavoured lines of block elements.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{CandidateSet, ExtractionStrategy};
use crate::document::{element_lines, DocumentTree};
use crate::policy::{HeuristicPolicy, KeywordSet};
use crate::types::{CandidateField, FieldName};

const PARAGRAPH_BREAK: &str = "\n\n";

static URL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.\-]*://|mailto:|tel:|www\.)").expect("url regex is valid")
});

static PUNCTUATION_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{P}\p{S}\s]+$").expect("punctuation regex is valid"));

/// Remove repeated strings, keeping the first occurrence of each.
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn description_set(pieces: Vec<String>) -> CandidateSet {
    let mut set = CandidateSet::new();
    let unique = dedup_preserving_order(pieces);
    if !unique.is_empty() {
        set.insert(CandidateField::heuristic(
            FieldName::Description,
            unique.join(PARAGRAPH_BREAK),
        ));
    }
    set
}

// ── Date ────────────────────────────────────────────────────────────────────

/// First text node containing an opening-hour marker, verbatim.
pub struct DateMarkerStrategy {
    markers: Vec<String>,
}

impl DateMarkerStrategy {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl ExtractionStrategy for DateMarkerStrategy {
    fn name(&self) -> &'static str {
        "date_marker"
    }

    fn provides(&self) -> &'static [FieldName] {
        &[FieldName::EventDate]
    }

    fn extract(&self, tree: &DocumentTree) -> CandidateSet {
        let mut set = CandidateSet::new();
        let hit = tree
            .text_nodes()
            .into_iter()
            .find(|text| self.markers.iter().any(|m| text.contains(m.as_str())));
        if let Some(text) = hit {
            set.insert(CandidateField::heuristic(FieldName::EventDate, text.trim()));
        }
        set
    }
}

// ── Description: marker-bounded block ──────────────────────────────────────

/// Text between the first start marker and the next stop marker.
pub struct MarkerBoundedStrategy {
    start: KeywordSet,
    stop: KeywordSet,
    min_len: usize,
}

impl MarkerBoundedStrategy {
    pub fn new(start: KeywordSet, stop: KeywordSet, min_len: usize) -> Self {
        Self {
            start,
            stop,
            min_len,
        }
    }

    pub fn from_policy(policy: &HeuristicPolicy) -> Self {
        Self::new(
            policy.start_markers.clone(),
            policy.stop_markers.clone(),
            policy.min_text_len,
        )
    }

    fn keeps(&self, text: &str) -> bool {
        !text.is_empty() && text.chars().count() > self.min_len && !URL_PREFIX.is_match(text)
    }
}

impl ExtractionStrategy for MarkerBoundedStrategy {
    fn name(&self) -> &'static str {
        "marker_bounded"
    }

    fn provides(&self) -> &'static [FieldName] {
        &[FieldName::Description]
    }

    fn extract(&self, tree: &DocumentTree) -> CandidateSet {
        let nodes = tree.text_nodes();
        let Some(start) = nodes.iter().position(|t| self.start.matches(t)) else {
            return CandidateSet::new();
        };

        let mut pieces = Vec::new();
        for (offset, raw) in nodes[start..].iter().enumerate() {
            // stop markers only count after the start node
            if offset > 0 && self.stop.matches(raw) {
                break;
            }
            let text = raw.trim();
            if self.keeps(text) {
                pieces.push(text.to_string());
            }
        }
        description_set(pieces)
    }
}

// ── Description: keyword-filtered blocks ───────────────────────────────────

/// Lines of block elements that mention the event and no page chrome.
pub struct KeywordBlockStrategy {
    block_tags: Vec<String>,
    skip_prefixes: Vec<String>,
    deny: KeywordSet,
    allow: KeywordSet,
    min_line_len: usize,
}

impl KeywordBlockStrategy {
    pub fn from_policy(policy: &HeuristicPolicy) -> Self {
        Self {
            block_tags: policy.block_tags.clone(),
            skip_prefixes: policy.skip_prefixes.clone(),
            deny: policy.deny_keywords.clone(),
            allow: policy.allow_keywords.clone(),
            min_line_len: policy.min_line_len,
        }
    }

    fn block_is_relevant(&self, block: &str) -> bool {
        !block.is_empty()
            && !self.skip_prefixes.iter().any(|p| block.starts_with(p.as_str()))
            && !self.deny.matches(block)
            && self.allow.matches(block)
    }

    fn line_is_kept(&self, line: &str) -> bool {
        line.chars().count() > self.min_line_len && !PUNCTUATION_ONLY.is_match(line)
    }
}

impl ExtractionStrategy for KeywordBlockStrategy {
    fn name(&self) -> &'static str {
        "keyword_blocks"
    }

    fn provides(&self) -> &'static [FieldName] {
        &[FieldName::Description]
    }

    fn extract(&self, tree: &DocumentTree) -> CandidateSet {
        let mut lines = Vec::new();
        for el in tree.find_all(&self.block_tags) {
            let block = element_lines(&el);
            let block = block.trim();
            if !self.block_is_relevant(block) {
                continue;
            }
            lines.extend(
                block
                    .lines()
                    .map(str::trim)
                    .filter(|l| self.line_is_kept(l))
                    .map(str::to_string),
            );
        }
        description_set(lines)
    }
}
