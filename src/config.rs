//! Pipeline tunables and catalog endpoints.
//!
//! [`FetchConfig`] carries every knob the search, validation and transfer
//! stages read. Defaults are the polite production values; tests use
//! [`FetchConfig::without_delays`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::fetch::{
    DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, FetchError, HttpClient, HttpTimeouts, Pacing,
    RateLimiter, RetryPolicy, TransferLimits,
};

/// Largest accepted body by default (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Smallest declared size a probe accepts (1 MiB).
pub const DEFAULT_MIN_DECLARED_SIZE: u64 = 1024 * 1024;

/// Smallest finished file accepted as verified (1 KiB).
pub const DEFAULT_MIN_VERIFIED_SIZE: u64 = 1024;

/// Hits kept after dedup and junk filtering.
pub const DEFAULT_MAX_HITS: usize = 20;

/// Query variations tried when every direct stage is empty.
pub const DEFAULT_MAX_VARIATIONS: usize = 5;

/// Default number of tracks processed at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound for track-level concurrency.
pub const MAX_CONCURRENCY: usize = 16;

/// Configuration failures, raised before any track runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No primary catalog endpoint was configured.
    #[error("no primary catalog endpoint configured")]
    MissingPrimaryEndpoint,

    /// An endpoint is not an absolute http(s) URL.
    #[error("invalid {name} endpoint '{value}': expected an absolute http(s) URL")]
    InvalidEndpoint {
        /// Which endpoint (`primary`, `backup`, `render`).
        name: &'static str,
        /// The offending value.
        value: String,
    },

    /// The render endpoint has no `{url}` placeholder.
    #[error("render endpoint '{0}' must contain a {{url}} placeholder")]
    MissingRenderPlaceholder(String),

    /// A numeric setting is outside its allowed range.
    #[error("invalid value for `{field}`: {value} (expected {expected})")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Offending value, rendered.
        value: String,
        /// Allowed range, rendered.
        expected: &'static str,
    },

    /// The shared HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] FetchError),
}

/// Catalog endpoints queried by the search cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEndpoints {
    /// Base URL of the primary catalog (required).
    pub primary: Option<String>,
    /// Base URL of the backup catalog.
    pub backup: Option<String>,
    /// Render service template with a `{url}` placeholder.
    pub render: Option<String>,
}

impl CatalogEndpoints {
    /// Endpoints with only a primary catalog.
    #[must_use]
    pub fn primary(base: impl Into<String>) -> Self {
        Self {
            primary: Some(base.into()),
            ..Self::default()
        }
    }

    /// Adds a backup catalog.
    #[must_use]
    pub fn with_backup(mut self, base: impl Into<String>) -> Self {
        self.backup = Some(base.into());
        self
    }

    /// Adds a render service template.
    #[must_use]
    pub fn with_render(mut self, template: impl Into<String>) -> Self {
        self.render = Some(template.into());
        self
    }

    /// Checks that the primary endpoint exists and every endpoint parses.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingPrimaryEndpoint`], [`ConfigError::InvalidEndpoint`]
    /// or [`ConfigError::MissingRenderPlaceholder`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let primary = self
            .primary
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingPrimaryEndpoint)?;
        check_http_url("primary", primary)?;

        if let Some(backup) = &self.backup {
            check_http_url("backup", backup)?;
        }
        if let Some(render) = &self.render {
            if !render.contains("{url}") {
                return Err(ConfigError::MissingRenderPlaceholder(render.clone()));
            }
            check_http_url("render", &render.replace("{url}", ""))?;
        }
        Ok(())
    }
}

fn check_http_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
        _ => Err(ConfigError::InvalidEndpoint {
            name,
            value: value.to_string(),
        }),
    }
}

/// Every tunable of the search-and-fetch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Catalog endpoints.
    pub endpoints: CatalogEndpoints,
    /// Attempts per track, including the first.
    pub max_retries: u32,
    /// Largest accepted body, declared or streamed.
    pub max_file_size: u64,
    /// Smallest declared size a probe accepts.
    pub min_declared_size: u64,
    /// Smallest finished file accepted as verified.
    pub min_verified_size: u64,
    /// Hits kept per search.
    pub max_hits: usize,
    /// Query variations tried per search.
    pub max_variations: usize,
    /// Request timeouts.
    pub timeouts: HttpTimeouts,
    /// Random pause before each direct search.
    pub search_pacing: Pacing,
    /// Waits between attempts of one track.
    pub attempt_backoff: Vec<Duration>,
    /// Minimum gap between requests to one host.
    pub domain_spacing: Duration,
    /// Pause between consecutive tracks of one worker.
    pub inter_track_delay: Duration,
    /// Tracks processed at once.
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoints: CatalogEndpoints::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            min_declared_size: DEFAULT_MIN_DECLARED_SIZE,
            min_verified_size: DEFAULT_MIN_VERIFIED_SIZE,
            max_hits: DEFAULT_MAX_HITS,
            max_variations: DEFAULT_MAX_VARIATIONS,
            timeouts: HttpTimeouts::default(),
            search_pacing: Pacing::new(Duration::from_millis(500), Duration::from_millis(1500)),
            attempt_backoff: DEFAULT_BACKOFF.to_vec(),
            domain_spacing: Duration::from_millis(1000),
            inter_track_delay: Duration::from_secs(1),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl FetchConfig {
    /// Default tunables for the given endpoints.
    #[must_use]
    pub fn new(endpoints: CatalogEndpoints) -> Self {
        Self {
            endpoints,
            ..Self::default()
        }
    }

    /// Same as [`new`](Self::new) with every politeness delay set to zero.
    #[must_use]
    pub fn without_delays(endpoints: CatalogEndpoints) -> Self {
        Self::new(endpoints).with_delays_disabled()
    }

    /// Zeroes pacing, backoff, domain spacing and the inter-track delay.
    #[must_use]
    pub fn with_delays_disabled(mut self) -> Self {
        self.search_pacing = Pacing::disabled();
        self.attempt_backoff = Vec::new();
        self.domain_spacing = Duration::ZERO;
        self.inter_track_delay = Duration::ZERO;
        self
    }

    /// Validates endpoints and numeric ranges.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints.validate()?;

        if !(1..=10).contains(&self.max_retries) {
            return Err(ConfigError::OutOfRange {
                field: "max_retries",
                value: self.max_retries.to_string(),
                expected: "1..=10",
            });
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::OutOfRange {
                field: "concurrency",
                value: self.concurrency.to_string(),
                expected: "1..=16",
            });
        }
        if self.min_declared_size > self.max_file_size {
            return Err(ConfigError::OutOfRange {
                field: "max_file_size",
                value: self.max_file_size.to_string(),
                expected: "at least min_declared_size",
            });
        }
        if self.max_hits == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_hits",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }
        Ok(())
    }

    /// Attempt policy for one track.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.attempt_backoff.clone())
    }

    /// Size bounds for body transfers.
    #[must_use]
    pub fn transfer_limits(&self) -> TransferLimits {
        TransferLimits {
            max_bytes: self.max_file_size,
            min_verified_bytes: self.min_verified_size,
        }
    }

    /// Builds the shared client with a fresh rate limiter.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Client`] if the HTTP client cannot be constructed.
    pub fn build_client(&self) -> Result<HttpClient, ConfigError> {
        let limiter = Arc::new(RateLimiter::new(self.domain_spacing));
        Ok(HttpClient::new(self.timeouts, limiter)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = FetchConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.min_declared_size, 1024 * 1024);
        assert_eq!(config.min_verified_size, 1024);
        assert_eq!(config.max_hits, 20);
        assert_eq!(config.max_variations, 5);
        assert_eq!(config.search_pacing.min(), Duration::from_millis(500));
        assert_eq!(config.search_pacing.max(), Duration::from_millis(1500));
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_missing_primary_endpoint_fails_validation() {
        let config = FetchConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPrimaryEndpoint)
        ));

        let blank = FetchConfig::new(CatalogEndpoints::primary("  "));
        assert!(matches!(
            blank.validate(),
            Err(ConfigError::MissingPrimaryEndpoint)
        ));
    }

    #[test]
    fn test_invalid_endpoint_urls_rejected() {
        let config = FetchConfig::new(CatalogEndpoints::primary("catalog.example.com"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { name: "primary", .. })
        ));

        let config = FetchConfig::new(
            CatalogEndpoints::primary("https://catalog.example.com").with_backup("ftp://x"),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { name: "backup", .. })
        ));
    }

    #[test]
    fn test_render_endpoint_needs_placeholder() {
        let endpoints = CatalogEndpoints::primary("https://catalog.example.com")
            .with_render("http://127.0.0.1:3000/render");
        assert!(matches!(
            endpoints.validate(),
            Err(ConfigError::MissingRenderPlaceholder(_))
        ));

        let endpoints = CatalogEndpoints::primary("https://catalog.example.com")
            .with_render("http://127.0.0.1:3000/render?url={url}");
        assert!(endpoints.validate().is_ok());
    }

    #[test]
    fn test_concurrency_range_enforced() {
        let mut config = FetchConfig::new(CatalogEndpoints::primary("https://catalog.example.com"));
        config.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "concurrency", .. })
        ));
        config.concurrency = 17;
        assert!(config.validate().is_err());
        config.concurrency = 16;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_without_delays_zeroes_politeness() {
        let config = FetchConfig::without_delays(CatalogEndpoints::primary("http://x.test"));
        assert_eq!(config.search_pacing, Pacing::disabled());
        assert!(config.attempt_backoff.is_empty());
        assert_eq!(config.domain_spacing, Duration::ZERO);
        assert_eq!(config.inter_track_delay, Duration::ZERO);
    }

    #[test]
    fn test_transfer_limits_follow_config() {
        let mut config = FetchConfig::default();
        config.max_file_size = 5000;
        config.min_verified_size = 10;
        let limits = config.transfer_limits();
        assert_eq!(limits.max_bytes, 5000);
        assert_eq!(limits.min_verified_bytes, 10);
    }
}
