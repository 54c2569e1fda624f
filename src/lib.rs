//! Trackfetch Core Library
//!
//! Finds music tracks on catalog sites and stores verified audio files,
//! degrading through fallback strategies instead of failing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Tunables, catalog endpoints and their validation
//! - [`fetch`] - Shared HTTP client, rate limiting, retry policy, filenames
//! - [`search`] - Query normalization and the search cascade
//! - [`extract`] - Download-link extraction from catalog pages
//! - [`render`] - Access to script-rendered page content
//! - [`validate`] - Cheap-first link plausibility checks
//! - [`pipeline`] - Per-track attempt loop and the batch worker pool
//! - [`collab`] - Playlist, matcher and archive boundaries

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collab;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod render;
pub mod search;
pub mod validate;

// Re-export commonly used types
pub use collab::{
    ArchiveWriter, HitMatcher, ManifestWriter, PlaylistError, PlaylistProvider, TrackListFile,
    TrackRef, WordOverlapMatcher,
};
pub use config::{CatalogEndpoints, ConfigError, FetchConfig};
pub use fetch::{FetchError, HttpClient, RateLimiter, RetryPolicy, remove_partial_files};
pub use pipeline::{
    BatchControl, BatchRunner, BatchSummary, DownloadResult, ExhaustionReason, TrackFetcher,
    TrackRequest,
};
pub use render::{RenderServiceSource, RenderedPageSource};
pub use search::{Query, SearchCascade, SearchHit};
pub use validate::{LinkValidator, ValidatedLink};
