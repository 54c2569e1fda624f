//! Per-track search, extract, validate and transfer loop.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::track::{
    AttemptOutcome, DownloadAttempt, DownloadResult, ExhaustionReason, TrackRequest, TrackState,
};
use crate::collab::{FirstHitMatcher, HitMatcher};
use crate::config::{ConfigError, FetchConfig};
use crate::extract::{FallbackExtractor, LinkExtractor};
use crate::fetch::{HttpClient, RetryDecision, RetryPolicy, StoredFile, TransferLimits};
use crate::render::RenderedPageSource;
use crate::search::{Query, SearchCascade, SearchHit};
use crate::validate::LinkValidator;

/// Number of empty searches after which the fallback channel is tried.
const EMPTY_SEARCHES_BEFORE_FALLBACK: u32 = 2;

/// Drives one track from query to verified file.
///
/// # Attempt cycle
///
/// Each attempt searches, picks one hit, extracts that page's links, keeps
/// the ones that validate and transfers them in discovery order until one
/// produces a verified file. A failed transfer moves on to the next link; only
/// a whole attempt without a verified file counts against the retry bound.
///
/// The second empty search of a track also runs the cascade's fallback
/// channel once with the raw `"{title} {artist}"` text.
///
/// [`fetch`](Self::fetch) never errors: exhaustion is reported in the
/// returned [`DownloadResult`].
#[derive(Clone)]
pub struct TrackFetcher {
    cascade: SearchCascade,
    extractor: Arc<dyn LinkExtractor>,
    validator: LinkValidator,
    matcher: Arc<dyn HitMatcher>,
    client: HttpClient,
    retry: RetryPolicy,
    limits: TransferLimits,
    output_dir: PathBuf,
}

impl fmt::Debug for TrackFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackFetcher")
            .field("cascade", &self.cascade)
            .field("extractor", &self.extractor.name())
            .field("matcher", &self.matcher.name())
            .field("max_attempts", &self.retry.max_attempts())
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl TrackFetcher {
    /// Assembles a fetcher from its parts; the matcher defaults to the first hit.
    #[must_use]
    pub fn new(
        cascade: SearchCascade,
        extractor: Arc<dyn LinkExtractor>,
        validator: LinkValidator,
        client: HttpClient,
        retry: RetryPolicy,
        limits: TransferLimits,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cascade,
            extractor,
            validator,
            matcher: Arc::new(FirstHitMatcher),
            client,
            retry,
            limits,
            output_dir: output_dir.into(),
        }
    }

    /// Builds the standard pipeline from `config`.
    ///
    /// When `renderer` is given it backs both the rendered search stage and
    /// the extraction fallback.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the configuration is invalid.
    pub fn from_config(
        config: &FetchConfig,
        client: HttpClient,
        renderer: Option<Arc<dyn RenderedPageSource>>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cascade = SearchCascade::from_config(&client, config, renderer.clone())?;
        let extractor = Arc::new(FallbackExtractor::standard(client.clone(), renderer));
        let validator = LinkValidator::from_config(client.clone(), config);
        Ok(Self::new(
            cascade,
            extractor,
            validator,
            client,
            config.retry_policy(),
            config.transfer_limits(),
            output_dir,
        ))
    }

    /// Replaces the hit matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn HitMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Runs the attempt loop for one track.
    #[instrument(skip(self, request), fields(track = %request.label()))]
    pub async fn fetch(&self, request: &TrackRequest) -> DownloadResult {
        let query = request.query();
        let mut furthest: Option<ExhaustionReason> = None;
        let mut empty_searches = 0u32;
        let mut fallback_tried = false;
        let mut attempt = 1u32;

        loop {
            transition(TrackState::Idle, TrackState::Searching, attempt);
            let mut hits = self.cascade.search(&query).await;

            if hits.is_empty() {
                empty_searches += 1;
                if empty_searches >= EMPTY_SEARCHES_BEFORE_FALLBACK
                    && !fallback_tried
                    && self.cascade.has_fallback_channel()
                {
                    fallback_tried = true;
                    info!(attempt, "trying fallback channel with raw query");
                    hits = self
                        .cascade
                        .search_fallback_channel(&request.raw_query())
                        .await;
                }
            }

            let (outcome, stored) = self.run_attempt(request, &query, attempt, hits).await;
            if let Some(stored) = stored {
                transition(TrackState::Downloading, TrackState::Succeeded, attempt);
                return DownloadResult::succeeded(
                    request,
                    stored.path,
                    stored.bytes_written,
                    attempt,
                );
            }

            if let Some(reason) = outcome.reason() {
                furthest = furthest.max(Some(reason));
            }

            match self.retry.should_retry(attempt) {
                RetryDecision::Retry { delay, attempt: next } => {
                    debug!(next, delay_ms = delay.as_millis(), "backing off before next attempt");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    let exhaustion = furthest.unwrap_or(ExhaustionReason::NoResults);
                    transition(TrackState::Searching, TrackState::Exhausted, attempt);
                    warn!(
                        attempts = attempt,
                        reason = %exhaustion,
                        detail = %reason,
                        "track exhausted"
                    );
                    return DownloadResult::exhausted(request, exhaustion, attempt);
                }
            }
        }
    }

    /// One pass through the pipeline. Returns the logged outcome and, on
    /// success, the stored file.
    async fn run_attempt(
        &self,
        request: &TrackRequest,
        query: &Query,
        number: u32,
        hits: Vec<SearchHit>,
    ) -> (AttemptOutcome, Option<StoredFile>) {
        let mut record = DownloadAttempt {
            track: request,
            number,
            hit: None,
            link: None,
            outcome: AttemptOutcome::NoHits,
        };

        let Some(hit) = self.choose_hit(query, hits).await else {
            record.log();
            return (record.outcome, None);
        };
        record.hit = Some(hit.clone());

        transition(TrackState::Searching, TrackState::ExtractingLinks, number);
        let candidates = match self.extractor.extract(&hit.url).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(page = %hit.url, error = %error, "link extraction failed");
                Vec::new()
            }
        };
        if candidates.is_empty() {
            record.outcome = AttemptOutcome::NoCandidates;
            record.log();
            return (record.outcome, None);
        }

        transition(TrackState::ExtractingLinks, TrackState::ValidatingLinks, number);
        let valid = self.validator.validate_all(&candidates).await;
        debug!(
            candidates = candidates.len(),
            valid = valid.len(),
            "validation finished"
        );
        if valid.is_empty() {
            record.outcome = AttemptOutcome::NoValidLinks;
            record.log();
            return (record.outcome, None);
        }

        transition(TrackState::ValidatingLinks, TrackState::Downloading, number);
        let base_name = request.preferred_name.as_deref().unwrap_or(&hit.title);
        record.outcome = AttemptOutcome::TransfersFailed;
        for link in &valid {
            record.link = Some(link.url.clone());
            match self
                .client
                .download_audio(&link.url, &self.output_dir, base_name, &self.limits)
                .await
            {
                Ok(stored) => {
                    record.outcome = AttemptOutcome::Stored;
                    record.log();
                    return (record.outcome, Some(stored));
                }
                Err(error) => {
                    warn!(
                        link = %link.url,
                        error = %error,
                        transient = error.is_transient(),
                        "transfer failed, trying next link"
                    );
                }
            }
        }

        record.log();
        (record.outcome, None)
    }

    /// Asks the matcher; falls back to the first hit when it errors or
    /// declines.
    async fn choose_hit(&self, query: &Query, mut hits: Vec<SearchHit>) -> Option<SearchHit> {
        if hits.is_empty() {
            return None;
        }
        let index = match self.matcher.select(query, &hits).await {
            Ok(Some(index)) if index < hits.len() => index,
            Ok(_) => {
                debug!(matcher = self.matcher.name(), "matcher declined, using first hit");
                0
            }
            Err(error) => {
                warn!(
                    matcher = self.matcher.name(),
                    error = %error,
                    "matcher failed, using first hit"
                );
                0
            }
        };
        Some(hits.swap_remove(index))
    }
}

fn transition(from: TrackState, to: TrackState, attempt: u32) {
    debug!(from = from.as_str(), to = to.as_str(), attempt, "state transition");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::collab::MatchError;
    use crate::extract::CandidateLink;
    use crate::fetch::{FetchError, HttpTimeouts, RateLimiter};
    use crate::search::{HitSource, SearchStrategy};

    struct CountingStage {
        hits: Vec<SearchHit>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchStrategy for CountingStage {
        fn name(&self) -> &str {
            "counting"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.hits.clone())
        }
    }

    struct NoLinks {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LinkExtractor for NoLinks {
        fn name(&self) -> &str {
            "no-links"
        }

        async fn extract(&self, _page_url: &str) -> Result<Vec<CandidateLink>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl HitMatcher for Unavailable {
        fn name(&self) -> &str {
            "unavailable"
        }

        async fn select(
            &self,
            _query: &Query,
            _hits: &[SearchHit],
        ) -> Result<Option<usize>, MatchError> {
            Err(MatchError::Unavailable("offline".to_string()))
        }
    }

    fn client() -> HttpClient {
        HttpClient::new(HttpTimeouts::default(), Arc::new(RateLimiter::disabled())).unwrap()
    }

    fn fetcher(
        stage: &Arc<CountingStage>,
        extractor: &Arc<NoLinks>,
        fallback: Option<&Arc<CountingStage>>,
    ) -> TrackFetcher {
        let mut cascade =
            SearchCascade::new(vec![Arc::clone(stage) as Arc<dyn SearchStrategy>], 20);
        if let Some(fallback) = fallback {
            cascade =
                cascade.with_fallback_channel(Arc::clone(fallback) as Arc<dyn SearchStrategy>);
        }
        let client = client();
        TrackFetcher::new(
            cascade,
            Arc::clone(extractor) as Arc<dyn LinkExtractor>,
            LinkValidator::new(client.clone(), 1024 * 1024, 100 * 1024 * 1024),
            client,
            RetryPolicy::new(3, Vec::new()),
            TransferLimits::default(),
            std::env::temp_dir(),
        )
    }

    fn counting(hits: Vec<SearchHit>) -> Arc<CountingStage> {
        Arc::new(CountingStage {
            hits,
            calls: AtomicUsize::new(0),
        })
    }

    fn no_links() -> Arc<NoLinks> {
        Arc::new(NoLinks {
            calls: AtomicUsize::new(0),
        })
    }

    fn one_hit() -> Vec<SearchHit> {
        vec![SearchHit::new(
            "https://catalog.example.com/songs/one",
            "Song Number One",
            HitSource::Primary,
        )]
    }

    #[tokio::test]
    async fn test_empty_search_exhausts_after_exactly_max_attempts() {
        let stage = counting(Vec::new());
        let extractor = no_links();
        let fetcher = fetcher(&stage, &extractor, None);

        let result = fetcher.fetch(&TrackRequest::new("Ghost Song", "Nobody")).await;

        assert!(!result.succeeded);
        assert_eq!(result.failure, Some(ExhaustionReason::NoResults));
        assert_eq!(result.attempts, 3);
        assert_eq!(stage.calls.load(Ordering::SeqCst), 3);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_channel_runs_once_on_second_empty_search() {
        let stage = counting(Vec::new());
        let fallback = counting(Vec::new());
        let extractor = no_links();
        let fetcher = fetcher(&stage, &extractor, Some(&fallback));

        let result = fetcher.fetch(&TrackRequest::new("Ghost Song", "Nobody")).await;

        assert_eq!(result.failure, Some(ExhaustionReason::NoResults));
        assert_eq!(stage.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_candidates_reports_links_invalid() {
        let stage = counting(one_hit());
        let extractor = no_links();
        let fetcher = fetcher(&stage, &extractor, None);

        let result = fetcher.fetch(&TrackRequest::new("Song Number One", "")).await;

        assert_eq!(result.failure, Some(ExhaustionReason::AllLinksInvalid));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_matcher_failure_falls_back_to_first_hit() {
        let stage = counting(one_hit());
        let extractor = no_links();
        let fetcher = fetcher(&stage, &extractor, None).with_matcher(Arc::new(Unavailable));

        let query = Query::new("song number one");
        let chosen = fetcher.choose_hit(&query, one_hit()).await.unwrap();
        assert_eq!(chosen.url, "https://catalog.example.com/songs/one");
        assert!(fetcher.choose_hit(&query, Vec::new()).await.is_none());
    }
}
