//! Catalog results-page parsing.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;
use url::{Url, form_urlencoded};

use super::hit::{HitSource, SearchHit};
use crate::fetch::FetchError;

/// Path fragments that identify track, film and album pages.
pub const HIT_PATH_KEYWORDS: [&str; 3] = ["/songs/", "/movie/", "/album/"];

#[allow(clippy::expect_used)]
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Selector::parse("a[href]").expect("anchor selector is valid")
});

/// Builds `{base}/?s={query}` with form encoding.
///
/// # Errors
///
/// [`FetchError::InvalidUrl`] if the result does not parse.
///
/// ```
/// use trackfetch_core::search::search_url;
///
/// let url = search_url("https://catalog.example.com/", "rowdy baby").unwrap();
/// assert_eq!(url.as_str(), "https://catalog.example.com/?s=rowdy+baby");
/// ```
pub fn search_url(base: &str, query: &str) -> Result<Url, FetchError> {
    let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
    let raw = format!("{}/?s={encoded}", base.trim_end_matches('/'));
    Url::parse(&raw).map_err(|_| FetchError::invalid_url(raw))
}

/// Extracts hits from a catalog results page, in document order.
///
/// Only anchors whose `href` contains one of [`HIT_PATH_KEYWORDS`] count; the
/// link text (whitespace-collapsed) must be longer than 5 characters.
#[must_use]
pub fn parse_search_results(html: &str, base: &Url, source: HitSource) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let lower = href.to_ascii_lowercase();
        if !HIT_PATH_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
            continue;
        }

        let title = anchor.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.chars().count() <= 5 {
            continue;
        }

        match base.join(href.trim()) {
            Ok(url) => hits.push(SearchHit::new(url, title, source)),
            Err(error) => debug!(href, error = %error, "unresolvable result link"),
        }
    }

    hits
}
