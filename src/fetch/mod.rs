//! HTTP plumbing shared by search, extraction, validation and transfer.
//!
//! # Features
//!
//! - One pooled [`HttpClient`] handle with per-operation timeouts
//! - Per-domain request spacing with server back-off ([`RateLimiter`])
//! - Streaming transfers into `.part` working files with size caps
//! - Filename sanitation and audio format inference
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trackfetch_core::fetch::{HttpClient, HttpTimeouts, RateLimiter, TransferLimits};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(1000)));
//! let client = HttpClient::new(HttpTimeouts::default(), limiter)?;
//! let stored = client
//!     .download_audio(
//!         "https://cdn.example.com/song.mp3",
//!         Path::new("./tracks"),
//!         "01_Song - Artist",
//!         &TransferLimits::default(),
//!     )
//!     .await?;
//! println!("saved {}", stored.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod filename;
mod format;
pub mod rate_limiter;
mod retry;

pub use client::{
    BROWSER_USER_AGENT, HttpClient, HttpTimeouts, ProbeResponse, StoredFile, TransferLimits,
};
pub use error::FetchError;
pub use filename::{
    MAX_BASE_NAME_CHARS, PARTIAL_SUFFIX, destination_filename, infer_format,
    remove_partial_files, sanitize_filename,
};
pub use format::{AudioFormat, is_audio_content_type};
pub use rate_limiter::{RateLimiter, extract_domain, parse_retry_after};
pub use retry::{DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, Pacing, RetryDecision, RetryPolicy};
