//! Error types for the fetch module.
//!
//! Every network or filesystem failure carries the URL or path it happened on,
//! so per-track logs stay readable when many tracks run side by side.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by page fetches, metadata probes and body transfers.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, reset, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request (or an idle gap between body chunks) exceeded its timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (429/503 responses).
        retry_after: Option<String>,
    },

    /// File system error while writing a transfer.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Transfer exceeded the configured maximum size (declared or mid-stream).
    #[error("{url} exceeds size limit: {observed} bytes > {limit} bytes")]
    TooLarge {
        /// The URL being transferred.
        url: String,
        /// Configured maximum in bytes.
        limit: u64,
        /// Declared or observed byte count that broke the limit.
        observed: u64,
    },

    /// Finished transfer is smaller than the verification floor.
    #[error("downloaded file {path} too small: {bytes} bytes < {minimum} bytes")]
    TooSmall {
        /// The working file that failed verification.
        path: PathBuf,
        /// Bytes actually written.
        bytes: u64,
        /// Minimum accepted size.
        minimum: u64,
    },

    /// The dynamic-rendering channel could not produce a page.
    #[error("render channel failed for {url}: {message}")]
    Render {
        /// The page URL that was requested.
        url: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The shared HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an error from a reqwest error, promoting timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a size-limit error.
    pub fn too_large(url: impl Into<String>, limit: u64, observed: u64) -> Self {
        Self::TooLarge {
            url: url.into(),
            limit,
            observed,
        }
    }

    /// Creates a verification-floor error.
    pub fn too_small(path: impl Into<PathBuf>, bytes: u64, minimum: u64) -> Self {
        Self::TooSmall {
            path: path.into(),
            bytes,
            minimum,
        }
    }

    /// Creates a render channel error.
    pub fn render(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true for failures that may succeed if tried again later.
    ///
    /// | Error | Transient |
    /// |-------|-----------|
    /// | Timeout | yes |
    /// | Network | yes |
    /// | HTTP 408, 429, 5xx | yes |
    /// | Render | yes |
    /// | other HTTP, IO, size, URL, client build | no |
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::Render { .. } => true,
            Self::HttpStatus { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            Self::Io { .. }
            | Self::InvalidUrl { .. }
            | Self::TooLarge { .. }
            | Self::TooSmall { .. }
            | Self::ClientBuild(_) => false,
        }
    }
}
