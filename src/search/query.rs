//! Search query normalization.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Bracketed or parenthesized segments such as `(From "Film")` or `[Remastered]`.
#[allow(clippy::expect_used)]
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("bracket regex is valid")
});

/// Anything that is neither a word character nor whitespace.
#[allow(clippy::expect_used)]
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r"[^\w\s]").expect("non-word regex is valid")
});

/// Words that describe a release rather than identify a track.
pub const STOP_WORDS: [&str; 8] = [
    "original",
    "soundtrack",
    "ost",
    "feat",
    "featuring",
    "ft",
    "remix",
    "version",
];

/// Normalized search text, plus the raw text it came from.
///
/// ```
/// use trackfetch_core::search::Query;
///
/// let query = Query::from_track("Vaathi Coming (From \"Master\")", "Anirudh Ravichander");
/// assert_eq!(query.as_str(), "vaathi coming anirudh ravichander");
/// assert_eq!(query.raw(), "Vaathi Coming (From \"Master\") Anirudh Ravichander");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    raw: String,
}

impl Query {
    /// Normalizes free text.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            text: normalize(raw),
            raw: raw.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }

    /// Builds a query from a title/artist pair.
    #[must_use]
    pub fn from_track(title: &str, artist: &str) -> Self {
        Self::new(&format!("{title} {artist}"))
    }

    /// The normalized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The whitespace-collapsed raw text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when normalization left nothing to search for.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn normalize(raw: &str) -> String {
    let without_brackets = BRACKETED.replace_all(raw, " ");
    let words_only = NON_WORD.replace_all(&without_brackets, " ");
    words_only
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}
