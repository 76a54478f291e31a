//! Title and image, read independently of the body strategies.

use crate::document::DocumentTree;
use crate::error::ScrapeError;
use crate::policy::ImagePolicy;

/// The document title. A page without one cannot produce a record.
pub fn extract_title(tree: &DocumentTree) -> Result<String, ScrapeError> {
    tree.title().ok_or(ScrapeError::TitleMissing)
}

/// Social-preview image if declared, otherwise the first `<img>` whose
/// source contains one of the configured hints. `None` is a valid result.
pub fn extract_image(tree: &DocumentTree, policy: &ImagePolicy) -> Option<String> {
    preview_image(tree, policy).or_else(|| hinted_image(tree, policy))
}

fn preview_image(tree: &DocumentTree, policy: &ImagePolicy) -> Option<String> {
    policy.meta_properties.iter().find_map(|prop| {
        let el = tree.find_first("meta", |e| {
            e.attr("property").or_else(|| e.attr("name")) == Some(prop.as_str())
                && e.attr("content").is_some_and(|c| !c.trim().is_empty())
        })?;
        el.value().attr("content").map(|c| c.trim().to_string())
    })
}

fn hinted_image(tree: &DocumentTree, policy: &ImagePolicy) -> Option<String> {
    let el = tree.find_first("img", |e| {
        e.attr("src")
            .is_some_and(|src| policy.src_hints.iter().any(|h| src.contains(h.as_str())))
    })?;
    el.value().attr("src").map(str::to_string)
}
