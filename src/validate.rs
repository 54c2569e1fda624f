//! Cheap-first plausibility checks for candidate links.
//!
//! A link whose path already ends in an audio extension is accepted without a
//! request. Anything else gets a HEAD probe: success status, audio content
//! kind, and a declared size (when present) inside the configured bounds.
//! Probe failures reject the link; they never propagate.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::FetchConfig;
use crate::extract::CandidateLink;
use crate::fetch::{AudioFormat, FetchError, HttpClient, is_audio_content_type};

/// Why a candidate link was discarded.
#[derive(Debug, Error)]
pub enum LinkRejection {
    /// Declared content kind is missing or not audio.
    #[error("{url} is not audio (content type: {})", .content_type.as_deref().unwrap_or("none"))]
    NotAudio {
        /// The probed URL.
        url: String,
        /// Declared Content-Type, if any.
        content_type: Option<String>,
    },

    /// Declared size is outside the accepted range.
    #[error("{url} declares {declared} bytes, outside {min}..={max}")]
    SizeOutOfBounds {
        /// The probed URL.
        url: String,
        /// Declared Content-Length.
        declared: u64,
        /// Lower bound.
        min: u64,
        /// Upper bound.
        max: u64,
    },

    /// Probe returned a non-success status.
    #[error("{url} answered HTTP {status}")]
    BadStatus {
        /// The probed URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Probe could not be completed.
    #[error("probe of {url} failed: {source}")]
    ProbeFailed {
        /// The probed URL.
        url: String,
        /// Underlying transport failure.
        #[source]
        source: FetchError,
    },
}

/// A candidate that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLink {
    /// Absolute URL.
    pub url: String,
    /// Format inferred from the URL suffix or the probe's content kind.
    pub format: AudioFormat,
    /// Declared size from the probe, if any.
    pub declared_size: Option<u64>,
    /// False when accepted on the URL suffix alone.
    pub probed: bool,
}

/// Validates candidate links.
#[derive(Debug, Clone)]
pub struct LinkValidator {
    client: HttpClient,
    min_declared: u64,
    max_declared: u64,
}

impl LinkValidator {
    /// Creates a validator accepting declared sizes in `min_declared..=max_declared`.
    #[must_use]
    pub fn new(client: HttpClient, min_declared: u64, max_declared: u64) -> Self {
        Self {
            client,
            min_declared,
            max_declared,
        }
    }

    /// Bounds taken from `config`.
    #[must_use]
    pub fn from_config(client: HttpClient, config: &FetchConfig) -> Self {
        Self::new(client, config.min_declared_size, config.max_file_size)
    }

    /// True when a declared size is inside the accepted range.
    #[must_use]
    pub fn size_within_bounds(&self, declared: u64) -> bool {
        (self.min_declared..=self.max_declared).contains(&declared)
    }

    /// Validates one candidate.
    ///
    /// # Errors
    ///
    /// The [`LinkRejection`] explaining why the link was discarded.
    #[instrument(skip(self), fields(url = %link))]
    pub async fn validate(&self, link: &CandidateLink) -> Result<ValidatedLink, LinkRejection> {
        let url = link.as_str();

        if let Some(format) = AudioFormat::from_url(url) {
            debug!(%format, "accepted on audio extension");
            return Ok(ValidatedLink {
                url: url.to_string(),
                format,
                declared_size: None,
                probed: false,
            });
        }

        let probe = self
            .client
            .probe(url)
            .await
            .map_err(|source| LinkRejection::ProbeFailed {
                url: url.to_string(),
                source,
            })?;

        if !(200..300).contains(&probe.status) {
            return Err(LinkRejection::BadStatus {
                url: url.to_string(),
                status: probe.status,
            });
        }

        let audio = probe
            .content_type
            .as_deref()
            .is_some_and(is_audio_content_type);
        if !audio {
            return Err(LinkRejection::NotAudio {
                url: url.to_string(),
                content_type: probe.content_type,
            });
        }

        if let Some(declared) = probe.content_length
            && !self.size_within_bounds(declared)
        {
            return Err(LinkRejection::SizeOutOfBounds {
                url: url.to_string(),
                declared,
                min: self.min_declared,
                max: self.max_declared,
            });
        }

        let format = probe
            .content_type
            .as_deref()
            .and_then(AudioFormat::from_content_type)
            .unwrap_or(AudioFormat::DEFAULT);
        debug!(%format, declared = ?probe.content_length, "accepted after probe");
        Ok(ValidatedLink {
            url: url.to_string(),
            format,
            declared_size: probe.content_length,
            probed: true,
        })
    }

    /// Boolean form of [`validate`](Self::validate).
    pub async fn is_valid(&self, url: &str) -> bool {
        self.validate(&CandidateLink::new(url)).await.is_ok()
    }

    /// Validates every candidate in order, keeping the survivors.
    pub async fn validate_all(&self, links: &[CandidateLink]) -> Vec<ValidatedLink> {
        let mut valid = Vec::with_capacity(links.len());
        for link in links {
            match self.validate(link).await {
                Ok(validated) => valid.push(validated),
                Err(rejection) => debug!(reason = %rejection, "link rejected"),
            }
        }
        valid
    }
}
