//! Per-domain request spacing shared by every worker.
//!
//! Catalog sites block clients that hammer them, so every request made through
//! the shared [`HttpClient`](super::HttpClient) first calls
//! [`RateLimiter::acquire`]. Requests to different hosts proceed independently;
//! requests to the same host are spaced by at least the configured minimum,
//! no matter how many tracks are being processed in parallel.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use trackfetch_core::fetch::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_millis(1000));
//!
//! // First request to a host proceeds immediately
//! limiter.acquire("https://catalog.example.com/?s=song").await;
//!
//! // Second request to the same host waits for the spacing
//! limiter.acquire("https://catalog.example.com/songs/x").await;
//!
//! // Other hosts are not affected
//! limiter.acquire("https://cdn.example.net/x.mp3").await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Maximum Retry-After value honoured (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Per-domain request spacing.
///
/// Wrap in `Arc` to share across tasks. Uses `DashMap` for the domain table
/// and a per-domain `tokio::sync::Mutex` so the check-then-update of the
/// last request time is atomic.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum gap between two requests to the same host.
    min_spacing: Duration,

    /// Set by [`RateLimiter::disabled`]; skips all bookkeeping.
    disabled: bool,

    /// Per-domain state. Values are `Arc` so the map shard lock is released
    /// before awaiting the inner mutex.
    domains: DashMap<String, Arc<DomainState>>,
}

#[derive(Debug, Default)]
struct DomainState {
    /// Earliest instant the next request may start. `None` until first use.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `min_spacing` between same-host requests.
    #[must_use]
    pub fn new(min_spacing: Duration) -> Self {
        debug!(spacing_ms = min_spacing.as_millis(), "creating rate limiter");
        Self {
            min_spacing,
            disabled: min_spacing.is_zero(),
            domains: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            min_spacing: Duration::ZERO,
            disabled: true,
            domains: DashMap::new(),
        }
    }

    /// Returns whether spacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured same-host spacing.
    #[must_use]
    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Waits until a request to `url`'s host is allowed, then reserves the slot.
    #[instrument(level = "trace", skip(self), fields(domain))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let domain = extract_domain(url);
        tracing::Span::current().record("domain", domain.as_str());

        let state = self.state_for(&domain);
        let mut next_allowed = state.next_allowed.lock().await;

        if let Some(at) = *next_allowed {
            let now = Instant::now();
            if at > now {
                let delay = at - now;
                debug!(domain = %domain, delay_ms = delay.as_millis(), "spacing request");
                tokio::time::sleep(delay).await;
            }
        }

        *next_allowed = Some(Instant::now() + self.min_spacing);
    }

    /// Pushes back the next allowed request to `url`'s host by a
    /// server-mandated delay (from a Retry-After header).
    #[instrument(level = "debug", skip(self))]
    pub async fn record_rate_limit(&self, url: &str, delay: Duration) {
        if self.disabled {
            return;
        }

        let domain = extract_domain(url);
        let state = self.state_for(&domain);
        let mut next_allowed = state.next_allowed.lock().await;
        let candidate = Instant::now() + delay;
        if next_allowed.is_none_or(|at| at < candidate) {
            *next_allowed = Some(candidate);
        }

        warn!(
            domain = %domain,
            delay_secs = delay.as_secs(),
            "server requested back-off"
        );
    }

    fn state_for(&self, domain: &str) -> Arc<DomainState> {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainState::default()))
            .clone()
    }
}

/// Extracts the lower-cased host from a URL; `"unknown"` when unparseable.
///
/// ```
/// use trackfetch_core::fetch::extract_domain;
///
/// assert_eq!(extract_domain("https://Catalog.Example.com/x"), "catalog.example.com");
/// assert_eq!(extract_domain("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header (integer seconds or HTTP-date), capped at 1 hour.
///
/// ```
/// use std::time::Duration;
/// use trackfetch_core::fetch::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let at = httpdate::parse_http_date(header_value).ok()?;
    let delay = at
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Some(delay.min(MAX_RETRY_AFTER))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_zero_spacing_is_disabled() {
        let limiter = RateLimiter::new(Duration::ZERO);
        assert!(limiter.is_disabled());
        assert!(RateLimiter::disabled().is_disabled());
    }

    #[tokio::test]
    async fn test_rate_limiter_first_request_no_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire("https://catalog.example.com/a").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_same_domain() {
        let limiter = RateLimiter::new(Duration::from_millis(150));
        let start = Instant::now();
        limiter.acquire("https://catalog.example.com/a").await;
        limiter.acquire("https://catalog.example.com/b").await;
        assert!(start.elapsed() >= Duration::from_millis(140));
    }

    #[tokio::test]
    async fn test_rate_limiter_domains_independent() {
        let limiter = RateLimiter::new(Duration::from_millis(300));
        let start = Instant::now();
        limiter.acquire("https://catalog.example.com/a").await;
        limiter.acquire("https://cdn.example.net/b.mp3").await;
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_record_rate_limit_delays_next_request() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        limiter
            .record_rate_limit("https://catalog.example.com/", Duration::from_millis(200))
            .await;
        let start = Instant::now();
        limiter.acquire("https://catalog.example.com/next").await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_extract_domain_lowercases_and_strips_port() {
        assert_eq!(extract_domain("http://Example.COM:8080/x"), "example.com");
        assert_eq!(extract_domain(""), "unknown");
    }

    #[test]
    fn test_parse_retry_after_caps_at_one_hour() {
        assert_eq!(parse_retry_after("999999"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_past_http_date_is_zero() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }
}
