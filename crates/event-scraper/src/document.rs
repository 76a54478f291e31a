//! Read-only document tree over raw HTML.
//!
//! Wraps `scraper::Html` (html5ever), which recovers from malformed and
//! unclosed markup the way browsers do, so parsing never fails. All
//! traversal is in document order.
//!
//! `scraper` types are `!Send`: a `DocumentTree` must be built, queried and
//! dropped without crossing an `.await`.

use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text content is never visible page text.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// A parsed HTML document.
pub struct DocumentTree {
    html: Html,
}

/// Text content of a single `<script>` element.
#[derive(Debug, Clone)]
pub struct ScriptText<'a> {
    pub id: Option<&'a str>,
    pub text: String,
}

impl DocumentTree {
    /// Parse raw HTML. Never fails; invalid markup is recovered best-effort.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Trimmed text of the first `<title>` element, if non-empty.
    pub fn title(&self) -> Option<String> {
        let sel = Selector::parse("title").ok()?;
        let el = self.html.select(&sel).next()?;
        let text = el.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// First element named `tag` (case-insensitive) whose attributes satisfy
    /// `filter`.
    pub fn find_first<F>(&self, tag: &str, filter: F) -> Option<ElementRef<'_>>
    where
        F: Fn(&Element) -> bool,
    {
        self.elements()
            .find(|el| el.value().name().eq_ignore_ascii_case(tag) && filter(el.value()))
    }

    /// Every element whose tag is one of `tags`, in document order.
    pub fn find_all<S: AsRef<str>>(&self, tags: &[S]) -> Vec<ElementRef<'_>> {
        self.elements()
            .filter(|el| {
                let name = el.value().name();
                tags.iter().any(|t| t.as_ref().eq_ignore_ascii_case(name))
            })
            .collect()
    }

    /// All visible text nodes in document order, untrimmed. Text inside
    /// `script`, `style`, `noscript` and `template` is skipped.
    pub fn text_nodes(&self) -> Vec<&str> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(|node| match node.value() {
                Node::Text(text) if is_visible(node.ancestors().filter_map(ElementRef::wrap)) => {
                    Some(&**text)
                }
                _ => None,
            })
            .collect()
    }

    /// Raw contents of every `<script>` element in document order.
    pub fn script_texts(&self) -> Vec<ScriptText<'_>> {
        self.find_all(&["script"])
            .into_iter()
            .map(|el| ScriptText {
                id: el.value().attr("id"),
                text: el.text().collect(),
            })
            .collect()
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.tree.root().descendants().filter_map(ElementRef::wrap)
    }
}

/// Visible text of an element with text-node boundaries kept as line
/// breaks, so callers can split a block back into its lines.
pub fn element_lines(el: &ElementRef<'_>) -> String {
    el.descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) if is_visible(node.ancestors().filter_map(ElementRef::wrap)) => {
                Some(&**text)
            }
            _ => None,
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_visible<'a>(mut ancestors: impl Iterator<Item = ElementRef<'a>>) -> bool {
    !ancestors.any(|a| INVISIBLE_TAGS.contains(&a.value().name()))
}
