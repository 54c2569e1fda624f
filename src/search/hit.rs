//! Search hits and the dedup/junk filter applied to every stage's output.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::trace;
use url::Url;

/// Titles shorter than this many characters are junk.
pub const MIN_TITLE_CHARS: usize = 5;

/// Whole words that mark promotional entries.
const PROMO_MARKERS: [&str; 5] = ["advertisement", "ad", "ads", "promo", "sponsored"];

/// Which cascade stage produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    /// Primary catalog, direct fetch.
    Primary,
    /// Backup catalog, direct fetch.
    Backup,
    /// Dynamic-rendering channel.
    Dynamic,
}

impl fmt::Display for HitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "primary",
            Self::Backup => "backup",
            Self::Dynamic => "dynamic",
        })
    }
}

/// A catalog page that may hold download links for a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Absolute page URL.
    pub url: String,
    /// Link text from the results page.
    pub title: String,
    /// Stage that found it.
    pub source: HitSource,
}

impl SearchHit {
    /// Creates a hit.
    pub fn new(url: impl Into<String>, title: impl Into<String>, source: HitSource) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            source,
        }
    }

    /// URL form used for duplicate detection.
    #[must_use]
    pub fn normalized_url(&self) -> String {
        normalize_url(&self.url)
    }

    /// Title form used for duplicate detection.
    #[must_use]
    pub fn normalized_title(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => raw.trim().trim_end_matches('/').to_string(),
    }
}

/// Returns true for titles that are too short or promotional.
///
/// Markers match whole words, so `"Radha Krishna"` is kept while
/// `"Ad - Free Trial"` is dropped.
#[must_use]
pub fn is_junk_title(title: &str) -> bool {
    let title = title.trim();
    if title.chars().count() < MIN_TITLE_CHARS {
        return true;
    }
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| {
            PROMO_MARKERS
                .iter()
                .any(|marker| word.eq_ignore_ascii_case(marker))
        })
}

/// Drops duplicate and junk hits, keeping discovery order, then caps at `cap`.
///
/// A hit is a duplicate when its normalized URL or its normalized title was
/// already kept. Running the filter on its own output changes nothing.
#[must_use]
pub fn filter_and_deduplicate(hits: Vec<SearchHit>, cap: usize) -> Vec<SearchHit> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for hit in hits {
        if kept.len() == cap {
            break;
        }

        let url = hit.normalized_url();
        let title = hit.normalized_title();
        if seen_urls.contains(&url) || seen_titles.contains(&title) {
            trace!(url = %hit.url, "duplicate hit");
            continue;
        }
        if is_junk_title(&hit.title) {
            trace!(title = %hit.title, "junk hit");
            continue;
        }

        seen_urls.insert(url);
        seen_titles.insert(title);
        kept.push(hit);
    }

    kept
}
