//! Page extraction for story documents
//!
//! This module turns one fetched document into a canonical [`Page`]:
//! - Title from the top-level `h1`, falling back to `h2`
//! - Body text from paragraphs, minus site boilerplate and the timestamp line
//! - Publish date, author and tags
//! - The choice map: reader-visible choice text to absolute target URL
//!
//! Extraction never fails. A malformed or unexpected document yields a page
//! with empty fields rather than an error.

mod body;
mod choices;
mod document;
mod tags;

pub use body::{is_boilerplate, parse_publish_date, DATE_FORMAT, TEXT_SEPARATOR};
pub use choices::is_choice_text;
pub use document::Document;
pub use tags::normalize_tag;

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};

/// A story page as stored in the graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Canonical absolute URL; the node identity
    pub url: String,

    /// Page heading, possibly empty
    pub title: String,

    /// Paragraph fragments joined with [`TEXT_SEPARATOR`]
    pub text: String,

    /// Publish timestamp, if a paragraph carried one
    pub date: Option<NaiveDateTime>,

    /// Free-text attribution
    pub author: Option<String>,

    /// Normalized tag labels
    pub tags: BTreeSet<String>,

    /// Choice text -> absolute target URL
    pub choices: BTreeMap<String, String>,
}

impl Page {
    /// Creates an empty page for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Returns the distinct target URLs of this page's choices
    pub fn choice_targets(&self) -> Vec<String> {
        let targets: BTreeSet<&String> = self.choices.values().collect();
        targets.into_iter().cloned().collect()
    }
}

/// Extracts a [`Page`] from a parsed document
///
/// # Example
///
/// ```
/// use storygraph::extract::{extract_page, Document};
/// use url::Url;
///
/// let html = r#"<html><body><h1>The Cave</h1>
///     <p>It is dark.</p>
///     <ul><li>* <a href="3.html">Light a torch</a></li></ul>
/// </body></html>"#;
/// let url = Url::parse("https://example.com/docs/000/2.html").unwrap();
/// let page = extract_page(&Document::parse(url, html));
///
/// assert_eq!(page.title, "The Cave");
/// assert_eq!(page.choices.len(), 1);
/// ```
pub fn extract_page(document: &Document) -> Page {
    let root = document.body();
    let (text, date) = body::extract_text_and_date(root);

    Page {
        url: document.url().to_string(),
        title: body::extract_title(root),
        text,
        date,
        author: body::extract_author(root),
        tags: tags::extract_tags(root),
        choices: choices::extract_choices(document, root),
    }
}
