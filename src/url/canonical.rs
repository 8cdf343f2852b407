use crate::UrlError;
use url::Url;

/// Canonicalizes an absolute URL for use as a node key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https` schemes
/// 3. Require a host (the parser lowercases it)
/// 4. Remove the fragment
/// 5. Remove an empty query string (trailing `?`)
///
/// Paths are kept as-is apart from dot-segment resolution done by the parser,
/// so the canonical URL is always fetchable.
///
/// # Examples
///
/// ```
/// use storygraph::url::canonicalize_url;
///
/// let url = canonicalize_url("https://EXAMPLE.com/docs/000/2.html#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs/000/2.html");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

/// Resolves an `href` against the URL of the page it appears on
///
/// Returns `None` for empty, fragment-only, or non-HTTP targets.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:") || href.starts_with("mailto:") || href.starts_with("tel:") {
        return None;
    }

    let joined = base.join(href).ok()?;
    canonicalize(joined).ok()
}

fn canonicalize(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}
