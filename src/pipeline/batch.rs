//! Bounded worker pool over a list of tracks.
//!
//! [`BatchRunner`] spawns one task per track, limited by a semaphore. Each
//! worker runs the full [`TrackFetcher`] loop for its track, so intra-track
//! ordering is untouched; only different tracks overlap. Cancellation is
//! cooperative: once [`BatchControl::cancel`] is called no new track starts,
//! and tracks already running finish (and clean up) on their own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::controller::TrackFetcher;
use super::track::{DownloadResult, ExhaustionReason, TrackRequest};
use crate::collab::{PlaylistProvider, TrackRef};
use crate::config::{ConfigError, FetchConfig, MAX_CONCURRENCY};

/// Tracks beyond this many are dropped from a batch.
pub const MAX_BATCH_TRACKS: usize = 500;

/// Shared handle between a batch and its caller: cancellation flag plus live
/// counters.
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    cancelled: Arc<AtomicBool>,
    progress: Arc<BatchStats>,
}

impl BatchControl {
    /// A control that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops new tracks from starting.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True after [`cancel`](Self::cancel).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Counters of tracks finished under this control.
    #[must_use]
    pub fn progress(&self) -> &BatchStats {
        &self.progress
    }
}

/// Counters updated by workers as tracks finish.
#[derive(Debug, Default)]
pub struct BatchStats {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchStats {
    /// Tracks that produced a verified file.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Tracks that exhausted their attempts.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Tracks finished so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded() + self.failed()
    }

    fn record(&self, result: &DownloadResult) {
        if result.succeeded {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Outcome of a batch, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Tracks with a verified file.
    pub succeeded: usize,
    /// Tracks that exhausted their attempts.
    pub failed: usize,
    /// Tracks that ran (cancelled tracks are not counted).
    pub total: usize,
    /// `succeeded / total` as a percentage; 0 for an empty batch.
    pub success_rate: f64,
    /// False when the playlist could not be read.
    pub input_available: bool,
    /// Per-track results.
    pub results: Vec<DownloadResult>,
}

impl BatchSummary {
    /// Builds the summary from per-track results.
    #[must_use]
    pub fn from_results(results: Vec<DownloadResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        let total = results.len();
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 / total as f64 * 100.0
        };
        Self {
            succeeded,
            failed: total - succeeded,
            total,
            success_rate,
            input_available: true,
            results,
        }
    }

    /// Summary for a batch whose input could not be read.
    #[must_use]
    pub fn no_input() -> Self {
        Self {
            input_available: false,
            ..Self::from_results(Vec::new())
        }
    }

    /// Successful results only.
    pub fn stored(&self) -> impl Iterator<Item = &DownloadResult> {
        self.results.iter().filter(|r| r.succeeded)
    }
}

/// Error type for batch setup.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Concurrency outside `1..=16`.
    #[error("invalid concurrency value {value}: must be between 1 and {MAX_CONCURRENCY}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },
}

impl From<BatchError> for ConfigError {
    fn from(error: BatchError) -> Self {
        match error {
            BatchError::InvalidConcurrency { value } => ConfigError::OutOfRange {
                field: "concurrency",
                value: value.to_string(),
                expected: "1..=16",
            },
        }
    }
}

/// Runs many tracks with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    fetcher: Arc<TrackFetcher>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    inter_track_delay: Duration,
}

impl BatchRunner {
    /// Creates a runner over `fetcher` with `concurrency` workers.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidConcurrency`] outside `1..=16`.
    #[instrument(level = "debug", skip(fetcher))]
    pub fn new(
        fetcher: TrackFetcher,
        concurrency: usize,
        inter_track_delay: Duration,
    ) -> Result<Self, BatchError> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(BatchError::InvalidConcurrency { value: concurrency });
        }
        debug!(
            concurrency,
            inter_track_delay_ms = inter_track_delay.as_millis(),
            "creating batch runner"
        );
        Ok(Self {
            fetcher: Arc::new(fetcher),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            inter_track_delay,
        })
    }

    /// Concurrency and inter-track delay taken from `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::OutOfRange`] for an invalid concurrency.
    pub fn from_config(fetcher: TrackFetcher, config: &FetchConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(fetcher, config.concurrency, config.inter_track_delay)?)
    }

    /// Configured worker count.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every track, at most [`MAX_BATCH_TRACKS`] of them.
    ///
    /// Tracks are named `"{index:02}_{title} - {artist}"` by position.
    /// Per-track failures never fail the batch.
    #[instrument(skip(self, tracks, control), fields(tracks = tracks.len()))]
    pub async fn run(&self, mut tracks: Vec<TrackRef>, control: &BatchControl) -> BatchSummary {
        if tracks.len() > MAX_BATCH_TRACKS {
            warn!(
                requested = tracks.len(),
                limit = MAX_BATCH_TRACKS,
                "track list truncated"
            );
            tracks.truncate(MAX_BATCH_TRACKS);
        }

        let stats = Arc::clone(&control.progress);
        let mut handles = Vec::with_capacity(tracks.len());
        info!(count = tracks.len(), concurrency = self.concurrency, "starting batch");

        for (position, track) in tracks.iter().enumerate() {
            if control.is_cancelled() {
                info!(
                    remaining = tracks.len() - position,
                    "batch cancelled, not starting more tracks"
                );
                break;
            }

            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                warn!("semaphore closed, stopping batch");
                break;
            };
            if control.is_cancelled() {
                info!(
                    remaining = tracks.len() - position,
                    "batch cancelled, not starting more tracks"
                );
                break;
            }

            let request = TrackRequest::for_batch(position + 1, track);
            let reported = request.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let stats = Arc::clone(&stats);
            let delay = self.inter_track_delay;
            let started_earlier = position >= self.concurrency;

            let handle = tokio::spawn(async move {
                let _permit = permit;
                if started_earlier && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let result = fetcher.fetch(&request).await;
                stats.record(&result);
                result
            });
            handles.push((position, reported, handle));
        }

        debug!(task_count = handles.len(), "waiting for tracks to finish");

        let mut finished = Vec::with_capacity(handles.len());
        for (position, request, handle) in handles {
            match handle.await {
                Ok(result) => finished.push((position, result)),
                Err(e) => {
                    warn!(track = %request.label(), error = %e, "track task panicked");
                    let result = DownloadResult::exhausted(&request, ExhaustionReason::Aborted, 0);
                    stats.record(&result);
                    finished.push((position, result));
                }
            }
        }
        finished.sort_by_key(|(position, _)| *position);

        let summary =
            BatchSummary::from_results(finished.into_iter().map(|(_, result)| result).collect());
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            total = summary.total,
            success_rate = summary.success_rate,
            "batch complete"
        );
        summary
    }

    /// Reads tracks from `provider` and runs them.
    ///
    /// A provider error yields an empty summary with `input_available = false`.
    pub async fn run_playlist(
        &self,
        provider: &dyn PlaylistProvider,
        control: &BatchControl,
    ) -> BatchSummary {
        match provider.tracks().await {
            Ok(tracks) => self.run(tracks, control).await,
            Err(error) => {
                warn!(provider = provider.name(), error = %error, "no input from playlist");
                BatchSummary::no_input()
            }
        }
    }
}
