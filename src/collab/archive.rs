//! Publishing the files of a finished batch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::pipeline::BatchSummary;

/// Name of the manifest written by [`ManifestWriter`].
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Failures while publishing a batch.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writing the archive failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The summary could not be serialized.
    #[error("failed to serialize batch summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Bundles or publishes the verified files of a batch.
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Publishes the batch rooted at `output_dir`; returns the artifact path.
    async fn publish(
        &self,
        output_dir: &Path,
        summary: &BatchSummary,
    ) -> Result<PathBuf, ArchiveError>;
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    file: &'a str,
    bytes: u64,
    title: &'a str,
    artist: &'a str,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    files: Vec<ManifestEntry<'a>>,
    summary: &'a BatchSummary,
}

/// Writes `manifest.json` into the output directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestWriter;

#[async_trait]
impl ArchiveWriter for ManifestWriter {
    fn name(&self) -> &str {
        "manifest"
    }

    #[instrument(skip(self, summary), fields(dir = %output_dir.display()))]
    async fn publish(
        &self,
        output_dir: &Path,
        summary: &BatchSummary,
    ) -> Result<PathBuf, ArchiveError> {
        let files = summary
            .stored()
            .map(|result| ManifestEntry {
                file: &result.final_filename,
                bytes: result.bytes_written,
                title: &result.title,
                artist: &result.artist,
            })
            .collect::<Vec<_>>();
        let count = files.len();
        let body = serde_json::to_vec_pretty(&Manifest { files, summary })?;

        let path = output_dir.join(MANIFEST_FILE_NAME);
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), files = count, "manifest written");
        Ok(path)
    }
}
