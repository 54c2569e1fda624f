//! Shared HTTP client handle for page fetches, probes and audio transfers.
//!
//! One [`HttpClient`] is built per process and cloned into every component
//! that touches the network. Clones share the connection pool, the cookie
//! store and the per-domain [`RateLimiter`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::error::FetchError;
use super::filename::{destination_filename, infer_format, partial_path, resolve_unique_path};
use super::format::AudioFormat;
use super::rate_limiter::{RateLimiter, parse_retry_after};

/// Browser User-Agent; catalog sites serve stripped pages to unknown agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Per-operation timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout for every request.
    pub connect: Duration,
    /// Whole-request timeout for metadata probes.
    pub probe: Duration,
    /// Whole-request timeout for page fetches.
    pub page: Duration,
    /// Timeout for response headers and for each gap between body chunks.
    pub body: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            probe: Duration::from_secs(10),
            page: Duration::from_secs(15),
            body: Duration::from_secs(30),
        }
    }
}

/// Size bounds enforced while transferring an audio body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    /// Largest accepted body, declared or observed.
    pub max_bytes: u64,
    /// Smallest finished file accepted as verified.
    pub min_verified_bytes: u64,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            min_verified_bytes: 1024,
        }
    }
}

/// Metadata returned by a HEAD probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Declared Content-Type, if any.
    pub content_type: Option<String>,
    /// Declared Content-Length, if any.
    pub content_length: Option<u64>,
}

/// A verified file in its final location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Final path inside the output directory.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes_written: u64,
    /// Format used to pick the extension.
    pub format: AudioFormat,
}

impl StoredFile {
    /// File name component of [`path`](Self::path).
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// HTTP client wrapper with timeouts and per-domain spacing built in.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeouts: HttpTimeouts,
    rate_limiter: Arc<RateLimiter>,
}

impl HttpClient {
    /// Builds the shared client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the TLS backend or system
    /// configuration prevents construction.
    #[instrument(level = "debug", skip(rate_limiter))]
    pub fn new(timeouts: HttpTimeouts, rate_limiter: Arc<RateLimiter>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .user_agent(BROWSER_USER_AGENT)
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            client,
            timeouts,
            rate_limiter,
        })
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Network failures, timeouts and non-success statuses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .send(self.client.get(url).timeout(self.timeouts.page), url)
            .await?;
        let response = self.ensure_success(response, url).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    /// Issues a HEAD request and reports status and declared metadata.
    ///
    /// Non-success statuses are returned in the [`ProbeResponse`], not as errors.
    ///
    /// # Errors
    ///
    /// Network failures and timeouts.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        let response = self
            .send(self.client.head(url).timeout(self.timeouts.probe), url)
            .await?;
        self.note_back_pressure(&response, url).await;

        // Read the header directly: for HEAD the body size hint is always 0.
        let content_length = header_str(&response, CONTENT_LENGTH.as_str())
            .and_then(|value| value.trim().parse::<u64>().ok());
        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type: header_str(&response, CONTENT_TYPE.as_str()).map(str::to_string),
            content_length,
        })
    }

    /// Streams an audio body into `output_dir` under a name derived from
    /// `base_name`.
    ///
    /// The body is written to a `.part` working file that is renamed into
    /// place only after the size checks pass; on any failure the working file
    /// is removed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] for unparseable or non-HTTP URLs
    /// - [`FetchError::TooLarge`] when the declared or streamed size exceeds
    ///   `limits.max_bytes` (declared sizes are rejected before any byte is written)
    /// - [`FetchError::TooSmall`] when the finished file is under
    ///   `limits.min_verified_bytes`
    /// - network, timeout, status and IO errors
    #[instrument(skip(self, limits), fields(url = %url, dir = %output_dir.display()))]
    pub async fn download_audio(
        &self,
        url: &str,
        output_dir: &Path,
        base_name: &str,
        limits: &TransferLimits,
    ) -> Result<StoredFile, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        let request = self.client.get(url);
        let response = tokio::time::timeout(self.timeouts.body, self.send(request, url))
            .await
            .map_err(|_| FetchError::timeout(url))??;
        let response = self.ensure_success(response, url).await?;

        if let Some(declared) = header_str(&response, CONTENT_LENGTH.as_str())
            .and_then(|value| value.trim().parse::<u64>().ok())
            && declared > limits.max_bytes
        {
            return Err(FetchError::too_large(url, limits.max_bytes, declared));
        }

        let content_type = header_str(&response, CONTENT_TYPE.as_str()).map(str::to_string);
        let format = infer_format(content_type.as_deref(), url);
        let final_path = resolve_unique_path(output_dir, &destination_filename(base_name, format));
        let working_path = partial_path(&final_path);
        debug!(path = %final_path.display(), %format, "resolved destination");

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| FetchError::from_reqwest(owned_url.clone(), e)));

        let outcome = async {
            let mut file = File::create(&working_path)
                .await
                .map_err(|e| FetchError::io(&working_path, e))?;
            let written = write_capped(
                body,
                &mut file,
                url,
                &working_path,
                limits.max_bytes,
                self.timeouts.body,
            )
            .await?;
            drop(file);

            if written < limits.min_verified_bytes {
                return Err(FetchError::too_small(
                    &working_path,
                    written,
                    limits.min_verified_bytes,
                ));
            }

            tokio::fs::rename(&working_path, &final_path)
                .await
                .map_err(|e| FetchError::io(&final_path, e))?;
            Ok(written)
        }
        .await;

        match outcome {
            Ok(bytes_written) => {
                info!(path = %final_path.display(), bytes = bytes_written, "transfer verified");
                Ok(StoredFile {
                    path: final_path,
                    bytes_written,
                    format,
                })
            }
            Err(error) => {
                debug!(path = %working_path.display(), error = %error, "removing working file");
                let _ = tokio::fs::remove_file(&working_path).await;
                Err(error)
            }
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, FetchError> {
        self.rate_limiter.acquire(url).await;
        request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    async fn ensure_success(&self, response: Response, url: &str) -> Result<Response, FetchError> {
        if response.status().is_success() {
            return Ok(response);
        }

        self.note_back_pressure(&response, url).await;
        let retry_after = header_str(&response, RETRY_AFTER.as_str()).map(str::to_string);
        Err(FetchError::http_status_with_retry_after(
            url,
            response.status().as_u16(),
            retry_after,
        ))
    }

    async fn note_back_pressure(&self, response: &Response, url: &str) {
        let status = response.status().as_u16();
        if !matches!(status, 429 | 503) {
            return;
        }
        if let Some(delay) = header_str(response, RETRY_AFTER.as_str()).and_then(parse_retry_after)
        {
            self.rate_limiter.record_rate_limit(url, delay).await;
        }
    }
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Copies a chunk stream into `file`, enforcing `max_bytes` and an idle
/// timeout between chunks. Returns bytes written.
pub(crate) async fn write_capped<S, B>(
    stream: S,
    file: &mut File,
    url: &str,
    path: &Path,
    max_bytes: u64,
    idle_timeout: Duration,
) -> Result<u64, FetchError>
where
    S: Stream<Item = Result<B, FetchError>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut writer = BufWriter::new(file);
    let mut written: u64 = 0;

    loop {
        let next = tokio::time::timeout(idle_timeout, stream.next())
            .await
            .map_err(|_| FetchError::timeout(url))?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        let bytes = chunk.as_ref();

        written += bytes.len() as u64;
        if written > max_bytes {
            return Err(FetchError::too_large(url, max_bytes, written));
        }

        writer
            .write_all(bytes)
            .await
            .map_err(|e| FetchError::io(path, e))?;
    }

    writer.flush().await.map_err(|e| FetchError::io(path, e))?;
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chunks(sizes: &[usize]) -> impl Stream<Item = Result<Vec<u8>, FetchError>> {
        futures_util::stream::iter(
            sizes
                .iter()
                .map(|size| Ok(vec![7u8; *size]))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = HttpTimeouts::default();
        assert_eq!(timeouts.probe, Duration::from_secs(10));
        assert_eq!(timeouts.page, Duration::from_secs(15));
        assert_eq!(timeouts.body, Duration::from_secs(30));
    }

    #[test]
    fn test_default_transfer_limits() {
        let limits = TransferLimits::default();
        assert_eq!(limits.max_bytes, 100 * 1024 * 1024);
        assert_eq!(limits.min_verified_bytes, 1024);
    }

    #[tokio::test]
    async fn test_write_capped_writes_all_chunks() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.part");
        let mut file = File::create(&path).await.unwrap();

        let written = write_capped(
            chunks(&[1024, 2048]),
            &mut file,
            "https://cdn.example.com/a.mp3",
            &path,
            10_000,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(written, 3072);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 3072);
    }

    #[tokio::test]
    async fn test_write_capped_stops_mid_stream_over_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.part");
        let mut file = File::create(&path).await.unwrap();

        let result = write_capped(
            chunks(&[4096, 4096, 4096]),
            &mut file,
            "https://cdn.example.com/a.mp3",
            &path,
            6000,
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(
            result,
            Err(FetchError::TooLarge {
                limit: 6000,
                observed: 8192,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_write_capped_propagates_stream_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.part");
        let mut file = File::create(&path).await.unwrap();

        let stream = futures_util::stream::iter(vec![
            Ok(vec![0u8; 10]),
            Err(FetchError::timeout("https://cdn.example.com/a.mp3")),
        ]);
        let result = write_capped(
            stream,
            &mut file,
            "https://cdn.example.com/a.mp3",
            &path,
            10_000,
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }
}
