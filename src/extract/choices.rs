//! Choice map extraction

use crate::extract::Document;
use scraper::{ElementRef, Selector};
use std::collections::BTreeMap;

/// Returns true if a list item's text marks it as a reader choice
///
/// Choices either contain a `*` or start with `>`.
pub fn is_choice_text(text: &str) -> bool {
    text.contains('*') || text.starts_with('>')
}

/// Collects every choice list item into a map of choice text to target URL
///
/// A repeated choice text gets ` - <index>` appended, where index is the
/// item's position among all list items on the page.
pub(crate) fn extract_choices(document: &Document, body: ElementRef<'_>) -> BTreeMap<String, String> {
    let mut choices = BTreeMap::new();

    let (Ok(item_selector), Ok(anchor_selector)) = (Selector::parse("li"), Selector::parse("a[href]"))
    else {
        return choices;
    };

    for (index, item) in body.select(&item_selector).enumerate() {
        let raw = item.text().collect::<String>();
        let label = raw.trim();

        if !is_choice_text(label) {
            continue;
        }

        let Some(href) = item
            .select(&anchor_selector)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
        else {
            tracing::debug!("Choice '{}' on {} has no link", label, document.url());
            continue;
        };

        let Some(target) = document.absolute_url(href) else {
            tracing::debug!("Choice '{}' on {} has unfollowable link {}", label, document.url(), href);
            continue;
        };

        let key = if choices.contains_key(label) {
            format!("{} - {}", label, index)
        } else {
            label.to_string()
        };

        choices.insert(key, target.to_string());
    }

    choices
}
