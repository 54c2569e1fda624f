//! Ordered fallback over search stages.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::SearchStrategy;
use super::hit::{HitSource, SearchHit, filter_and_deduplicate};
use super::query::Query;
use super::stages::{DirectSearch, RenderedSearch, VariationSearch};
use crate::config::{ConfigError, FetchConfig};
use crate::fetch::HttpClient;
use crate::render::RenderedPageSource;

/// Stages evaluated in order; the first stage whose filtered output is
/// non-empty wins.
///
/// A stage failure counts as zero hits. The cascade itself never errors.
#[derive(Clone)]
pub struct SearchCascade {
    stages: Vec<Arc<dyn SearchStrategy>>,
    fallback_channel: Option<Arc<dyn SearchStrategy>>,
    max_hits: usize,
}

impl std::fmt::Debug for SearchCascade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCascade")
            .field("stages", &self.stage_names())
            .field("has_fallback_channel", &self.fallback_channel.is_some())
            .field("max_hits", &self.max_hits)
            .finish()
    }
}

impl SearchCascade {
    /// Creates a cascade over `stages`, capping output at `max_hits`.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn SearchStrategy>>, max_hits: usize) -> Self {
        Self {
            stages,
            fallback_channel: None,
            max_hits,
        }
    }

    /// Sets the stage used by [`search_fallback_channel`](Self::search_fallback_channel).
    #[must_use]
    pub fn with_fallback_channel(mut self, stage: Arc<dyn SearchStrategy>) -> Self {
        self.fallback_channel = Some(stage);
        self
    }

    /// Builds the standard cascade: primary, backup (if configured), rendered
    /// (if a renderer is given), then query variations against the primary.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingPrimaryEndpoint`] when no primary endpoint is set.
    pub fn from_config(
        client: &HttpClient,
        config: &FetchConfig,
        renderer: Option<Arc<dyn RenderedPageSource>>,
    ) -> Result<Self, ConfigError> {
        let primary_base = config
            .endpoints
            .primary
            .clone()
            .ok_or(ConfigError::MissingPrimaryEndpoint)?;

        let primary: Arc<dyn SearchStrategy> = Arc::new(DirectSearch::new(
            client.clone(),
            primary_base.clone(),
            HitSource::Primary,
            config.search_pacing,
        ));
        let mut stages = vec![Arc::clone(&primary)];

        if let Some(backup) = &config.endpoints.backup {
            stages.push(Arc::new(DirectSearch::new(
                client.clone(),
                backup.clone(),
                HitSource::Backup,
                config.search_pacing,
            )));
        }

        let rendered = renderer.map(|renderer| {
            Arc::new(RenderedSearch::new(renderer, primary_base)) as Arc<dyn SearchStrategy>
        });
        if let Some(rendered) = &rendered {
            stages.push(Arc::clone(rendered));
        }

        stages.push(Arc::new(VariationSearch::new(primary, config.max_variations)));

        let cascade = Self::new(stages, config.max_hits);
        Ok(match rendered {
            Some(rendered) => cascade.with_fallback_channel(rendered),
            None => cascade,
        })
    }

    /// Stage names in evaluation order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// True when a fallback channel is configured.
    #[must_use]
    pub fn has_fallback_channel(&self) -> bool {
        self.fallback_channel.is_some()
    }

    /// Runs the stages in order and returns the first non-empty filtered hit list.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn search(&self, query: &Query) -> Vec<SearchHit> {
        if query.is_empty() {
            debug!("normalized query is empty, skipping cascade");
            return Vec::new();
        }

        for stage in &self.stages {
            let hits = self.run_stage(stage.as_ref(), query.as_str()).await;
            if !hits.is_empty() {
                info!(stage = stage.name(), count = hits.len(), "search found hits");
                return hits;
            }
            debug!(stage = stage.name(), "stage found nothing");
        }

        info!("search exhausted every stage");
        Vec::new()
    }

    /// Runs only the fallback channel with unnormalized text.
    ///
    /// Empty when no fallback channel is configured.
    #[instrument(skip(self))]
    pub async fn search_fallback_channel(&self, raw_query: &str) -> Vec<SearchHit> {
        let Some(stage) = &self.fallback_channel else {
            return Vec::new();
        };
        if raw_query.trim().is_empty() {
            return Vec::new();
        }
        let hits = self.run_stage(stage.as_ref(), raw_query.trim()).await;
        info!(count = hits.len(), "fallback channel search finished");
        hits
    }

    async fn run_stage(&self, stage: &dyn SearchStrategy, query: &str) -> Vec<SearchHit> {
        match stage.search(query).await {
            Ok(hits) => filter_and_deduplicate(hits, self.max_hits),
            Err(error) => {
                warn!(stage = stage.name(), error = %error, "search stage failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::FetchError;

    /// Scripted stage that records the queries it receives.
    struct Scripted {
        name: &'static str,
        outcome: fn(&str) -> Result<Vec<SearchHit>, FetchError>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            outcome: fn(&str) -> Result<Vec<SearchHit>, FetchError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError> {
            self.calls.lock().unwrap().push(query.to_string());
            (self.outcome)(query)
        }
    }

    fn stage(scripted: &Arc<Scripted>) -> Arc<dyn SearchStrategy> {
        Arc::clone(scripted) as Arc<dyn SearchStrategy>
    }

    fn empty(_: &str) -> Result<Vec<SearchHit>, FetchError> {
        Ok(Vec::new())
    }

    fn failing(_: &str) -> Result<Vec<SearchHit>, FetchError> {
        Err(FetchError::http_status("https://catalog.example.com/?s=x", 503))
    }

    fn two_hits(_: &str) -> Result<Vec<SearchHit>, FetchError> {
        Ok(vec![
            SearchHit::new("https://b.example.com/songs/one", "Song Number One", HitSource::Backup),
            SearchHit::new("https://b.example.com/songs/two", "Song Number Two", HitSource::Backup),
            SearchHit::new("https://b.example.com/songs/one", "Song Number One", HitSource::Backup),
        ])
    }

    fn only_junk(_: &str) -> Result<Vec<SearchHit>, FetchError> {
        Ok(vec![SearchHit::new(
            "https://a.example.com/songs/ad",
            "Ad",
            HitSource::Primary,
        )])
    }

    #[tokio::test]
    async fn test_stops_at_first_productive_stage() {
        let first = Scripted::new("primary", failing);
        let second = Scripted::new("backup", two_hits);
        let third = Scripted::new("rendered", two_hits);
        let cascade = SearchCascade::new(vec![stage(&first), stage(&second), stage(&third)], 20);

        let hits = cascade.search(&Query::new("song number")).await;

        assert_eq!(hits.len(), 2);
        assert_eq!(first.calls(), vec!["song number"]);
        assert_eq!(second.calls(), vec!["song number"]);
        assert!(third.calls().is_empty());
    }

    #[tokio::test]
    async fn test_junk_only_stage_does_not_stop_cascade() {
        let first = Scripted::new("primary", only_junk);
        let second = Scripted::new("backup", two_hits);
        let cascade = SearchCascade::new(vec![stage(&first), stage(&second)], 20);

        let hits = cascade.search(&Query::new("song number")).await;

        assert_eq!(hits.len(), 2);
        assert_eq!(second.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_all_stages_empty_returns_empty() {
        let first = Scripted::new("primary", empty);
        let second = Scripted::new("backup", failing);
        let cascade = SearchCascade::new(vec![stage(&first), stage(&second)], 20);
        assert!(cascade.search(&Query::new("nothing here")).await.is_empty());
    }

    #[tokio::test]
    async fn test_variation_stage_stops_at_first_productive_variation() {
        let inner = Scripted::new("primary", |query| {
            if query == "alpha gamma delta" {
                two_hits(query)
            } else {
                Ok(Vec::new())
            }
        });
        let variation_stage: Arc<dyn SearchStrategy> =
            Arc::new(VariationSearch::new(stage(&inner), 5));
        let cascade = SearchCascade::new(vec![stage(&inner), variation_stage], 20);

        let hits = cascade.search(&Query::new("alpha beta gamma delta")).await;

        assert_eq!(hits.len(), 2);
        assert_eq!(
            inner.calls(),
            vec![
                "alpha beta gamma delta",
                "beta gamma delta",
                "alpha gamma delta",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_calls() {
        let first = Scripted::new("primary", two_hits);
        let cascade = SearchCascade::new(vec![stage(&first)], 20);
        assert!(cascade.search(&Query::new("OST")).await.is_empty());
        assert!(first.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_channel_uses_raw_text() {
        let primary = Scripted::new("primary", empty);
        let rendered = Scripted::new("rendered", two_hits);
        let cascade =
            SearchCascade::new(vec![stage(&primary)], 20).with_fallback_channel(stage(&rendered));

        assert!(cascade.has_fallback_channel());
        let hits = cascade.search_fallback_channel("  Song (Live) - Artist ").await;
        assert_eq!(hits.len(), 2);
        assert_eq!(rendered.calls(), vec!["Song (Live) - Artist"]);
    }

    #[tokio::test]
    async fn test_fallback_channel_absent_is_empty() {
        let cascade = SearchCascade::new(vec![stage(&Scripted::new("primary", two_hits))], 20);
        assert!(!cascade.has_fallback_channel());
        assert!(cascade.search_fallback_channel("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_cap_applies() {
        let first = Scripted::new("primary", two_hits);
        let cascade = SearchCascade::new(vec![stage(&first)], 1);
        assert_eq!(cascade.search(&Query::new("song")).await.len(), 1);
    }
}
