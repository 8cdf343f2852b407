use crate::url::resolve_href;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A fetched HTML document together with the URL it was requested from
///
/// `scraper::Html` is not `Send`, so a `Document` lives and dies on the
/// blocking task that handles it.
pub struct Document {
    url: Url,
    html: Html,
}

impl Document {
    /// Parses HTML text fetched from `url`
    pub fn parse(url: Url, html: &str) -> Self {
        Self {
            url,
            html: Html::parse_document(html),
        }
    }

    /// The URL this document was requested from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The document's `<body>` element
    ///
    /// The HTML parser always synthesizes a body, so the root element is only
    /// a fallback for pathological input.
    pub fn body(&self) -> ElementRef<'_> {
        Selector::parse("body")
            .ok()
            .and_then(|selector| self.html.select(&selector).next())
            .unwrap_or_else(|| self.html.root_element())
    }

    /// Resolves an `href` found in this document to a canonical absolute URL
    pub fn absolute_url(&self, href: &str) -> Option<Url> {
        resolve_href(&self.url, href)
    }
}
