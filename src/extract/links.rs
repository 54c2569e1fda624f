//! Candidate link discovery in page markup.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;
use url::Url;

use super::CandidateLink;
use crate::fetch::AudioFormat;

#[allow(clippy::expect_used)]
static ANCHORS: LazyLock<Selector> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Selector::parse("a[href]").expect("anchor selector is valid")
});

#[allow(clippy::expect_used)]
static AUDIO_SOURCES: LazyLock<Selector> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Selector::parse("audio[src], audio source[src]").expect("audio selector is valid")
});

#[allow(clippy::expect_used)]
static ONCLICK: LazyLock<Selector> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Selector::parse("[onclick]").expect("onclick selector is valid")
});

#[allow(clippy::expect_used)]
static SCRIPTS: LazyLock<Selector> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Selector::parse("script").expect("script selector is valid")
});

/// Absolute audio URLs inside script text.
#[allow(clippy::expect_used)]
static AUDIO_URL_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r#"(?i)https?://[^\s"'<>\\]+\.(?:mp3|m4a|wav|flac|aac)"#)
        .expect("audio URL regex is valid")
});

/// Extracts candidate download links from `html`, resolving relative paths
/// against `page_url`.
///
/// Sources, in output order:
/// 1. anchors whose path or full target ends in an audio extension, or that
///    mention `download`
/// 2. `<audio>` and `<audio><source>` sources ending in an audio extension
/// 3. audio URLs in `onclick` handlers
/// 4. audio URLs in inline script text
///
/// Duplicates (after resolution) are dropped; non-http(s) targets such as
/// `javascript:` or `mailto:` are ignored.
#[must_use]
pub fn extract_links(html: &str, page_url: &Url) -> Vec<CandidateLink> {
    let document = Html::parse_document(html);
    let mut collector = Collector::new(page_url);

    for anchor in document.select(&ANCHORS) {
        if let Some(href) = anchor.value().attr("href") {
            collector.offer_anchor(href);
        }
    }

    for audio in document.select(&AUDIO_SOURCES) {
        if let Some(src) = audio.value().attr("src") {
            collector.offer_audio(src);
        }
    }

    for element in document.select(&ONCLICK) {
        if let Some(handler) = element.value().attr("onclick") {
            collector.offer_text(handler);
        }
    }

    for script in document.select(&SCRIPTS) {
        let text: String = script.text().collect();
        collector.offer_text(&text);
    }

    collector.links
}

struct Collector<'a> {
    page_url: &'a Url,
    seen: HashSet<String>,
    links: Vec<CandidateLink>,
}

impl<'a> Collector<'a> {
    fn new(page_url: &'a Url) -> Self {
        Self {
            page_url,
            seen: HashSet::new(),
            links: Vec::new(),
        }
    }

    fn offer_anchor(&mut self, href: &str) {
        let Some(url) = self.resolve(href) else {
            return;
        };
        if is_audio_path(&url) || href.to_ascii_lowercase().contains("download") {
            self.push(url);
        }
    }

    fn offer_audio(&mut self, src: &str) {
        if let Some(url) = self.resolve(src)
            && is_audio_path(&url)
        {
            self.push(url);
        }
    }

    fn offer_text(&mut self, text: &str) {
        for found in AUDIO_URL_IN_TEXT.find_iter(text) {
            if let Some(url) = self.resolve(found.as_str()) {
                self.push(url);
            }
        }
    }

    fn resolve(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            return None;
        }
        let url = self.page_url.join(raw).ok()?;
        matches!(url.scheme(), "http" | "https").then_some(url)
    }

    fn push(&mut self, url: Url) {
        let link = String::from(url);
        if self.seen.insert(link.clone()) {
            trace!(link = %link, "candidate link");
            self.links.push(CandidateLink::new(link));
        }
    }
}

fn is_audio_path(url: &Url) -> bool {
    AudioFormat::from_url(url.as_str()).is_some()
}
