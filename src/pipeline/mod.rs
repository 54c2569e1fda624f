//! Track-level orchestration.
//!
//! [`TrackFetcher`] runs the bounded attempt loop for one track and always
//! returns a [`DownloadResult`]. [`BatchRunner`] fans a track list out over a
//! small worker pool and folds the results into a [`BatchSummary`].

mod batch;
mod controller;
mod track;

pub use batch::{
    BatchControl, BatchError, BatchRunner, BatchStats, BatchSummary, MAX_BATCH_TRACKS,
};
pub use controller::TrackFetcher;
pub use track::{
    AttemptOutcome, DownloadAttempt, DownloadResult, ExhaustionReason, TrackRequest, TrackState,
};
