//! Concrete cascade stages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::SearchStrategy;
use super::hit::{HitSource, SearchHit, filter_and_deduplicate};
use super::results::{parse_search_results, search_url};
use super::variations::variations;
use crate::fetch::{FetchError, HttpClient, Pacing};
use crate::render::RenderedPageSource;

/// Plain HTTP search against one catalog.
#[derive(Debug, Clone)]
pub struct DirectSearch {
    client: HttpClient,
    base: String,
    source: HitSource,
    pacing: Pacing,
}

impl DirectSearch {
    /// Creates a stage for the catalog at `base`.
    pub fn new(
        client: HttpClient,
        base: impl Into<String>,
        source: HitSource,
        pacing: Pacing,
    ) -> Self {
        Self {
            client,
            base: base.into(),
            source,
            pacing,
        }
    }
}

#[async_trait]
impl SearchStrategy for DirectSearch {
    fn name(&self) -> &str {
        match self.source {
            HitSource::Primary => "primary",
            HitSource::Backup => "backup",
            HitSource::Dynamic => "dynamic",
        }
    }

    #[instrument(skip(self), fields(stage = self.name()))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError> {
        let url = search_url(&self.base, query)?;
        self.pacing.pause().await;

        let html = self.client.fetch_page(url.as_str()).await?;
        let hits = parse_search_results(&html, &url, self.source);
        debug!(count = hits.len(), "direct search parsed");
        Ok(hits)
    }
}

/// Search through the dynamic-rendering channel.
#[derive(Clone)]
pub struct RenderedSearch {
    renderer: Arc<dyn RenderedPageSource>,
    base: String,
}

impl RenderedSearch {
    /// Creates a stage rendering the results page of the catalog at `base`.
    pub fn new(renderer: Arc<dyn RenderedPageSource>, base: impl Into<String>) -> Self {
        Self {
            renderer,
            base: base.into(),
        }
    }
}

impl std::fmt::Debug for RenderedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedSearch")
            .field("renderer", &self.renderer.name())
            .field("base", &self.base)
            .finish()
    }
}

#[async_trait]
impl SearchStrategy for RenderedSearch {
    fn name(&self) -> &str {
        "rendered"
    }

    #[instrument(skip(self), fields(stage = "rendered"))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError> {
        let url = search_url(&self.base, query)?;
        let html = self.renderer.render(url.as_str()).await?;
        let hits = parse_search_results(&html, &url, HitSource::Dynamic);
        debug!(count = hits.len(), "rendered search parsed");
        Ok(hits)
    }
}

/// Runs an inner stage over query variations until one finds something.
#[derive(Clone)]
pub struct VariationSearch {
    inner: Arc<dyn SearchStrategy>,
    limit: usize,
}

impl VariationSearch {
    /// Wraps `inner`, trying at most `limit` variations.
    pub fn new(inner: Arc<dyn SearchStrategy>, limit: usize) -> Self {
        Self { inner, limit }
    }
}

impl std::fmt::Debug for VariationSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariationSearch")
            .field("inner", &self.inner.name())
            .field("limit", &self.limit)
            .finish()
    }
}

#[async_trait]
impl SearchStrategy for VariationSearch {
    fn name(&self) -> &str {
        "variations"
    }

    #[instrument(skip(self), fields(stage = "variations"))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError> {
        for variation in variations(query, self.limit) {
            debug!(variation = %variation, "trying query variation");
            let hits = match self.inner.search(&variation).await {
                Ok(hits) => hits,
                Err(error) => {
                    warn!(variation = %variation, error = %error, "variation search failed");
                    continue;
                }
            };
            let hits = filter_and_deduplicate(hits, usize::MAX);
            if !hits.is_empty() {
                return Ok(hits);
            }
        }
        Ok(Vec::new())
    }
}
