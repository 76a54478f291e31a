//! Final record assembly.

use crate::extract::CandidateSet;
use crate::types::{EventRecord, FieldName};

/// Builds the [`EventRecord`] from the page-level fields and the winning
/// candidates.
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    title_prefix: String,
}

impl ResultAssembler {
    pub fn new(title_prefix: impl Into<String>) -> Self {
        Self {
            title_prefix: title_prefix.into(),
        }
    }

    /// Strip the storefront prefix from a page title. A title that is
    /// nothing but the prefix is kept as-is rather than emptied.
    pub fn clean_event_name(&self, title: &str) -> String {
        let cleaned = if self.title_prefix.is_empty() {
            title.trim().to_string()
        } else {
            title.replace(&self.title_prefix, "").trim().to_string()
        };
        if cleaned.is_empty() {
            title.trim().to_string()
        } else {
            cleaned
        }
    }

    pub fn assemble(
        &self,
        title: &str,
        image: Option<String>,
        candidates: &CandidateSet,
        url: &str,
    ) -> EventRecord {
        EventRecord {
            event_name: self.clean_event_name(title),
            image_url: non_blank(image),
            event_date: non_blank(candidates.value(FieldName::EventDate).map(str::to_string)),
            description: non_blank(
                candidates
                    .value(FieldName::Description)
                    .map(str::to_string),
            ),
            url: url.to_string(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
