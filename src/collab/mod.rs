//! Boundaries to collaborators outside the pipeline.
//!
//! - [`PlaylistProvider`] supplies tracks; errors mean "no input".
//! - [`HitMatcher`] picks one hit per search; [`FirstHitMatcher`] is the
//!   deterministic default.
//! - [`ArchiveWriter`] publishes a finished batch.

mod archive;
mod matcher;
mod playlist;

pub use archive::{ArchiveError, ArchiveWriter, MANIFEST_FILE_NAME, ManifestWriter};
pub use matcher::{FirstHitMatcher, HitMatcher, MatchError, WordOverlapMatcher};
pub use playlist::{PlaylistError, PlaylistProvider, TrackListFile, TrackRef, parse_track_lines};
