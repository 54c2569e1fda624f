//! Track list sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// A track reference as supplied by a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    /// Track title.
    #[serde(alias = "name")]
    pub title: String,
    /// Performing artist; may be empty.
    #[serde(default)]
    pub artist: String,
}

impl TrackRef {
    /// Creates a reference.
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// Failures of a playlist source. The batch treats all of them as "no input".
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// The source refused access.
    #[error("playlist access denied: {0}")]
    Unauthorized(String),

    /// The playlist does not exist.
    #[error("playlist not found: {0}")]
    NotFound(String),

    /// Reading the playlist failed.
    #[error("failed to read playlist {path}: {source}")]
    Io {
        /// Source path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The playlist content is malformed.
    #[error("malformed playlist {path}: {message}")]
    Parse {
        /// Source path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

/// Supplies an ordered list of tracks.
#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Returns the tracks in playlist order.
    async fn tracks(&self) -> Result<Vec<TrackRef>, PlaylistError>;
}

/// A local track list: JSON array (`.json`) or `Title - Artist` lines.
#[derive(Debug, Clone)]
pub struct TrackListFile {
    path: PathBuf,
}

impl TrackListFile {
    /// Points at `path`; nothing is read until [`PlaylistProvider::tracks`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }
}

#[async_trait]
impl PlaylistProvider for TrackListFile {
    fn name(&self) -> &str {
        "track-list-file"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn tracks(&self) -> Result<Vec<TrackRef>, PlaylistError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(PlaylistError::NotFound(self.path.display().to_string()));
            }
            Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(PlaylistError::Unauthorized(self.path.display().to_string()));
            }
            Err(source) => {
                return Err(PlaylistError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let tracks = if self.is_json() {
            serde_json::from_str::<Vec<TrackRef>>(&content).map_err(|e| PlaylistError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            })?
        } else {
            parse_track_lines(&content)
        };

        debug!(count = tracks.len(), "track list loaded");
        Ok(tracks)
    }
}

/// Parses `Title - Artist` lines. Blank lines and `#` comments are skipped; a
/// line without the separator is a title with no artist.
#[must_use]
pub fn parse_track_lines(content: &str) -> Vec<TrackRef> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(" - ") {
            Some((title, artist)) => TrackRef::new(title.trim(), artist.trim()),
            None => TrackRef::new(line, ""),
        })
        .collect()
}
