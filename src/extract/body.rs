//! Title, body text, publish date and author extraction

use chrono::{NaiveDateTime, Weekday};
use scraper::{ElementRef, Selector};

/// Timestamp format of the publish line after its weekday, e.g. `Jan 2 15:04:05 2006`
///
/// The full line reads `Mon Jan 2 15:04:05 2006`. The leading weekday must be
/// a weekday name but is not checked against the date.
pub const DATE_FORMAT: &str = "%b %e %H:%M:%S %Y";

/// Marker inserted between accumulated paragraph fragments
pub const TEXT_SEPARATOR: &str = "<br>";

/// Site chrome that shows up as paragraphs but is not story text
const BOILERPLATE_MARKERS: &[&str] = &[
    "edit tags",
    "add comment",
    "comments",
    "last updated",
    "linking enabled",
];

/// Returns the first non-empty top-level `h1`, falling back to `h2`
pub(crate) fn extract_title(body: ElementRef<'_>) -> String {
    ["h1", "h2"]
        .iter()
        .find_map(|tag| {
            body.children()
                .filter_map(ElementRef::wrap)
                .filter(|element| element.value().name() == *tag)
                .map(|element| element.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())
        })
        .unwrap_or_default()
}

/// Walks paragraphs in document order, splitting them into story text and
/// the publish timestamp
///
/// The first paragraph that parses as a timestamp sets the date; any later
/// timestamp paragraphs are dropped as well but do not override it.
pub(crate) fn extract_text_and_date(body: ElementRef<'_>) -> (String, Option<NaiveDateTime>) {
    let Ok(selector) = Selector::parse("p") else {
        return (String::new(), None);
    };

    let mut fragments = Vec::new();
    let mut date = None;

    for paragraph in body.select(&selector) {
        let raw = paragraph.text().collect::<String>().replace('\n', "");
        let fragment = raw.trim();

        if let Some(published) = parse_publish_date(fragment) {
            if date.is_none() {
                date = Some(published);
            }
            continue;
        }

        if is_boilerplate(fragment) {
            continue;
        }

        fragments.push(fragment.to_string());
    }

    (fragments.join(TEXT_SEPARATOR), date)
}

/// Returns the text of the first `address` element, if any
pub(crate) fn extract_author(body: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("address").ok()?;

    body.select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|author| !author.is_empty())
}

/// Parses a paragraph as a publish timestamp
pub fn parse_publish_date(fragment: &str) -> Option<NaiveDateTime> {
    let (weekday, rest) = fragment.trim_start().split_once(' ')?;
    weekday.parse::<Weekday>().ok()?;
    NaiveDateTime::parse_from_str(rest.trim_start(), DATE_FORMAT).ok()
}

/// Returns true if a paragraph fragment is empty or site chrome
pub fn is_boilerplate(fragment: &str) -> bool {
    if fragment.is_empty() {
        return true;
    }

    let lowered = fragment.to_lowercase();
    BOILERPLATE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
