//! Download-link extraction from catalog pages.
//!
//! [`extract_links`] is the shared parser. [`LinkExtractor`] implementations
//! differ only in how they obtain the markup: [`StaticPageExtractor`] fetches
//! it directly, [`RenderedPageExtractor`] goes through the rendering channel.
//! [`FallbackExtractor`] tries the second only when the first finds nothing.

mod links;

pub use links::extract_links;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch::{FetchError, HttpClient};
use crate::render::RenderedPageSource;

/// An extracted, not yet validated, absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateLink(String);

impl CandidateLink {
    /// Wraps a URL string.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the link.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a catalog page URL into candidate download links.
#[async_trait]
pub trait LinkExtractor: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Fetches `page_url` and returns its candidate links, de-duplicated and
    /// in discovery order.
    async fn extract(&self, page_url: &str) -> Result<Vec<CandidateLink>, FetchError>;
}

fn parse_page_url(page_url: &str) -> Result<Url, FetchError> {
    Url::parse(page_url).map_err(|_| FetchError::invalid_url(page_url))
}

/// Reads the page as served.
#[derive(Debug, Clone)]
pub struct StaticPageExtractor {
    client: HttpClient,
}

impl StaticPageExtractor {
    /// Creates an extractor on the shared client.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LinkExtractor for StaticPageExtractor {
    fn name(&self) -> &str {
        "static"
    }

    #[instrument(skip(self), fields(extractor = "static"))]
    async fn extract(&self, page_url: &str) -> Result<Vec<CandidateLink>, FetchError> {
        let url = parse_page_url(page_url)?;
        let html = self.client.fetch_page(page_url).await?;
        let links = extract_links(&html, &url);
        debug!(count = links.len(), "static extraction finished");
        Ok(links)
    }
}

/// Reads the page after client-side scripts have run.
#[derive(Clone)]
pub struct RenderedPageExtractor {
    renderer: Arc<dyn RenderedPageSource>,
}

impl RenderedPageExtractor {
    /// Creates an extractor over a rendering source.
    #[must_use]
    pub fn new(renderer: Arc<dyn RenderedPageSource>) -> Self {
        Self { renderer }
    }
}

impl fmt::Debug for RenderedPageExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedPageExtractor")
            .field("renderer", &self.renderer.name())
            .finish()
    }
}

#[async_trait]
impl LinkExtractor for RenderedPageExtractor {
    fn name(&self) -> &str {
        "rendered"
    }

    #[instrument(skip(self), fields(extractor = "rendered"))]
    async fn extract(&self, page_url: &str) -> Result<Vec<CandidateLink>, FetchError> {
        let url = parse_page_url(page_url)?;
        let html = self.renderer.render(page_url).await?;
        let links = extract_links(&html, &url);
        debug!(count = links.len(), "rendered extraction finished");
        Ok(links)
    }
}

/// Tries `primary`; when it errors or finds nothing, tries `fallback`.
#[derive(Clone)]
pub struct FallbackExtractor {
    primary: Arc<dyn LinkExtractor>,
    fallback: Option<Arc<dyn LinkExtractor>>,
}

impl FallbackExtractor {
    /// Creates the chain.
    #[must_use]
    pub fn new(
        primary: Arc<dyn LinkExtractor>,
        fallback: Option<Arc<dyn LinkExtractor>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Static extraction on `client`, rendered extraction when `renderer` is set.
    #[must_use]
    pub fn standard(client: HttpClient, renderer: Option<Arc<dyn RenderedPageSource>>) -> Self {
        let rendered = renderer
            .map(|r| Arc::new(RenderedPageExtractor::new(r)) as Arc<dyn LinkExtractor>);
        Self::new(Arc::new(StaticPageExtractor::new(client)), rendered)
    }
}

impl fmt::Debug for FallbackExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackExtractor")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|e| e.name()))
            .finish()
    }
}

#[async_trait]
impl LinkExtractor for FallbackExtractor {
    fn name(&self) -> &str {
        "fallback-chain"
    }

    async fn extract(&self, page_url: &str) -> Result<Vec<CandidateLink>, FetchError> {
        let first = self.primary.extract(page_url).await;
        let Some(fallback) = &self.fallback else {
            return first;
        };

        match first {
            Ok(links) if !links.is_empty() => return Ok(links),
            Ok(_) => info!(page = page_url, "no links found, trying fallback"),
            Err(error) => {
                warn!(page = page_url, error = %error, "page extraction failed, trying fallback");
            }
        }
        fallback.extract(page_url).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Fixed {
        links: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(links: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                links,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LinkExtractor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract(&self, _page_url: &str) -> Result<Vec<CandidateLink>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.links.iter().map(|l| CandidateLink::new(*l)).collect())
        }
    }

    fn dyn_extractor(fixed: &Arc<Fixed>) -> Arc<dyn LinkExtractor> {
        Arc::clone(fixed) as Arc<dyn LinkExtractor>
    }

    struct Broken;

    #[async_trait]
    impl LinkExtractor for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn extract(&self, page_url: &str) -> Result<Vec<CandidateLink>, FetchError> {
            Err(FetchError::timeout(page_url))
        }
    }

    #[tokio::test]
    async fn test_fallback_not_used_when_primary_finds_links() {
        let primary = Fixed::new(vec!["https://cdn.example.net/a.mp3"]);
        let fallback = Fixed::new(vec!["https://cdn.example.net/b.mp3"]);
        let chain = FallbackExtractor::new(primary, Some(dyn_extractor(&fallback)));

        let links = chain.extract("https://catalog.example.com/songs/a").await.unwrap();

        assert_eq!(links, vec![CandidateLink::new("https://cdn.example.net/a.mp3")]);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_empty() {
        let primary = Fixed::new(vec![]);
        let fallback = Fixed::new(vec!["https://cdn.example.net/b.mp3"]);
        let chain = FallbackExtractor::new(primary, Some(dyn_extractor(&fallback)));

        let links = chain.extract("https://catalog.example.com/songs/a").await.unwrap();

        assert_eq!(links.len(), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let fallback = Fixed::new(vec!["https://cdn.example.net/b.mp3"]);
        let chain = FallbackExtractor::new(Arc::new(Broken), Some(dyn_extractor(&fallback)));
        let links = chain.extract("https://catalog.example.com/songs/a").await.unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn test_without_fallback_primary_result_passes_through() {
        let chain = FallbackExtractor::new(Arc::new(Broken), None);
        let result = chain.extract("https://catalog.example.com/songs/a").await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }

    #[test]
    fn test_candidate_link_display() {
        let link = CandidateLink::new("https://cdn.example.net/a.mp3");
        assert_eq!(link.to_string(), "https://cdn.example.net/a.mp3");
        assert_eq!(link.into_string(), "https://cdn.example.net/a.mp3");
    }
}
