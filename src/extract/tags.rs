//! Tag extraction
//!
//! Tags are only recognized in one exact layout:
//!
//! ```html
//! <b>Tags:</b><font color="red">tag-one tag_two</font>
//! ```
//!
//! The first `font` element in the body holds the tags. Its bold siblings
//! must read `Tags:` and the first of them must sit directly before it.
//! Anything else yields no tags.

use scraper::{ElementRef, Selector};
use std::collections::BTreeSet;

const TAGS_LABEL: &str = "Tags:";
const TAGS_COLOR: &str = "red";

pub(crate) fn extract_tags(body: ElementRef<'_>) -> BTreeSet<String> {
    let Some(holder) = Selector::parse("font")
        .ok()
        .and_then(|selector| body.select(&selector).next())
    else {
        return BTreeSet::new();
    };

    if !is_labeled_tag_holder(holder) {
        return BTreeSet::new();
    }

    let is_red = holder
        .value()
        .attr("color")
        .is_some_and(|color| color.eq_ignore_ascii_case(TAGS_COLOR));
    if !is_red {
        return BTreeSet::new();
    }

    holder
        .text()
        .collect::<String>()
        .split_whitespace()
        .map(normalize_tag)
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Checks that the bold siblings of `holder` read `Tags:` and that the first
/// of them immediately precedes it
fn is_labeled_tag_holder(holder: ElementRef<'_>) -> bool {
    let Some(parent) = holder.parent() else {
        return false;
    };

    let siblings: Vec<ElementRef<'_>> = parent.children().filter_map(ElementRef::wrap).collect();

    let Some(holder_index) = siblings.iter().position(|e| e.id() == holder.id()) else {
        return false;
    };

    let bold: Vec<(usize, &ElementRef<'_>)> = siblings
        .iter()
        .enumerate()
        .filter(|(_, e)| e.id() != holder.id() && e.value().name() == "b")
        .collect();

    let Some((first_bold_index, _)) = bold.first() else {
        return false;
    };

    let label: String = bold
        .iter()
        .map(|(_, e)| e.text().collect::<String>())
        .collect();

    label.trim() == TAGS_LABEL && holder_index == first_bold_index + 1
}

/// Makes a tag usable as a graph label
///
/// Anything that is not alphanumeric or `_` becomes `_`.
pub fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Document;
    use url::Url;

    fn tags_of(html: &str) -> BTreeSet<String> {
        let doc = Document::parse(Url::parse("https://example.com/1.html").unwrap(), html);
        extract_tags(doc.body())
    }

    #[test]
    fn test_normalize_hyphen() {
        assert_eq!(normalize_tag("sci-fi"), "sci_fi");
        assert_eq!(normalize_tag("plain"), "plain");
        assert_eq!(normalize_tag("a.b:c"), "a_b_c");
    }

    #[test]
    fn test_tags_extracted_and_normalized() {
        let tags = tags_of(r#"<body><p>x</p><b>Tags:</b><font color="red">sci-fi  horror</font></body>"#);
        let expected: BTreeSet<String> = ["sci_fi", "horror"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn test_no_font_no_tags() {
        assert!(tags_of("<body><p>Just a story.</p></body>").is_empty());
    }

    #[test]
    fn test_wrong_color_no_tags() {
        assert!(tags_of(r#"<body><b>Tags:</b><font color="blue">fantasy</font></body>"#).is_empty());
    }

    #[test]
    fn test_wrong_label_no_tags() {
        assert!(tags_of(r#"<body><b>Genre:</b><font color="red">fantasy</font></body>"#).is_empty());
    }

    #[test]
    fn test_not_adjacent_no_tags() {
        assert!(
            tags_of(r#"<body><b>Tags:</b><i>spacer</i><font color="red">fantasy</font></body>"#)
                .is_empty()
        );
    }

    #[test]
    fn test_only_first_font_considered() {
        let html = r#"<body><font size="2">intro</font><b>Tags:</b><font color="red">fantasy</font></body>"#;
        assert!(tags_of(html).is_empty());
    }
}
