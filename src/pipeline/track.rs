//! Per-track request, result and attempt bookkeeping.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::collab::TrackRef;
use crate::search::{Query, SearchHit};

/// One track to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    /// Track title.
    pub title: String,
    /// Performing artist; may be empty.
    pub artist: String,
    /// Destination base name; the chosen hit's title is used when absent.
    pub preferred_name: Option<String>,
}

impl TrackRequest {
    /// Creates a request without a preferred name.
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            preferred_name: None,
        }
    }

    /// Sets the destination base name.
    #[must_use]
    pub fn with_preferred_name(mut self, name: impl Into<String>) -> Self {
        self.preferred_name = Some(name.into());
        self
    }

    /// Builds a request for position `index` (1-based) of a batch, named
    /// `"{index:02}_{title} - {artist}"`.
    #[must_use]
    pub fn for_batch(index: usize, track: &TrackRef) -> Self {
        let label = if track.artist.trim().is_empty() {
            track.title.trim().to_string()
        } else {
            format!("{} - {}", track.title.trim(), track.artist.trim())
        };
        Self::new(track.title.clone(), track.artist.clone())
            .with_preferred_name(format!("{index:02}_{label}"))
    }

    /// Normalized search query.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::from_track(&self.title, &self.artist)
    }

    /// Unnormalized `"{title} {artist}"` text.
    #[must_use]
    pub fn raw_query(&self) -> String {
        format!("{} {}", self.title, self.artist).trim().to_string()
    }

    /// `"title - artist"` for logs.
    #[must_use]
    pub fn label(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

/// Why a track ended without a verified file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustionReason {
    /// No search produced a hit.
    NoResults,
    /// Hits were found but no link survived extraction and validation.
    AllLinksInvalid,
    /// Links validated but no transfer produced a verified file.
    AllDownloadsFailed,
    /// The track's worker stopped before reporting an outcome.
    Aborted,
}

impl ExhaustionReason {
    /// Stable label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoResults => "no-results",
            Self::AllLinksInvalid => "all-links-invalid",
            Self::AllDownloadsFailed => "all-downloads-failed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome for one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    /// Track title.
    pub title: String,
    /// Track artist.
    pub artist: String,
    /// True when a verified file was stored.
    pub succeeded: bool,
    /// Bytes in the stored file; 0 on failure.
    pub bytes_written: u64,
    /// File name inside the output directory; empty on failure.
    pub final_filename: String,
    /// Full path of the stored file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Attempts made.
    pub attempts: u32,
    /// Why the track failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExhaustionReason>,
}

impl DownloadResult {
    pub(crate) fn succeeded(
        request: &TrackRequest,
        path: PathBuf,
        bytes_written: u64,
        attempts: u32,
    ) -> Self {
        let final_filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            title: request.title.clone(),
            artist: request.artist.clone(),
            succeeded: true,
            bytes_written,
            final_filename,
            path: Some(path),
            attempts,
            failure: None,
        }
    }

    pub(crate) fn exhausted(
        request: &TrackRequest,
        reason: ExhaustionReason,
        attempts: u32,
    ) -> Self {
        Self {
            title: request.title.clone(),
            artist: request.artist.clone(),
            succeeded: false,
            bytes_written: 0,
            final_filename: String::new(),
            path: None,
            attempts,
            failure: Some(reason),
        }
    }
}

/// Per-track pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Idle,
    Searching,
    ExtractingLinks,
    ValidatingLinks,
    Downloading,
    Succeeded,
    Exhausted,
}

impl TrackState {
    /// Lower-case label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::ExtractingLinks => "extracting-links",
            Self::ValidatingLinks => "validating-links",
            Self::Downloading => "downloading",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A verified file was stored.
    Stored,
    /// Search found nothing.
    NoHits,
    /// The chosen page had no candidate links.
    NoCandidates,
    /// No candidate passed validation.
    NoValidLinks,
    /// Every validated link failed transfer or verification.
    TransfersFailed,
}

impl AttemptOutcome {
    /// Furthest stage this outcome reached, as an exhaustion reason.
    #[must_use]
    pub fn reason(self) -> Option<ExhaustionReason> {
        match self {
            Self::Stored => None,
            Self::NoHits => Some(ExhaustionReason::NoResults),
            Self::NoCandidates | Self::NoValidLinks => Some(ExhaustionReason::AllLinksInvalid),
            Self::TransfersFailed => Some(ExhaustionReason::AllDownloadsFailed),
        }
    }
}

/// Transient record of one attempt; logged, then dropped.
#[derive(Debug, Clone)]
pub struct DownloadAttempt<'a> {
    /// Track being fetched.
    pub track: &'a TrackRequest,
    /// 1-based attempt number.
    pub number: u32,
    /// Hit chosen for this attempt.
    pub hit: Option<SearchHit>,
    /// Link that produced (or last failed to produce) a file.
    pub link: Option<String>,
    /// Result.
    pub outcome: AttemptOutcome,
}

impl DownloadAttempt<'_> {
    /// Emits the attempt as a structured event.
    pub fn log(&self) {
        let hit = self.hit.as_ref().map_or("", |hit| hit.url.as_str());
        let link = self.link.as_deref().unwrap_or("");
        if self.outcome == AttemptOutcome::Stored {
            info!(
                track = %self.track.label(),
                attempt = self.number,
                hit,
                link,
                outcome = ?self.outcome,
                "attempt finished"
            );
        } else {
            warn!(
                track = %self.track.label(),
                attempt = self.number,
                hit,
                link,
                outcome = ?self.outcome,
                "attempt failed"
            );
        }
    }
}
