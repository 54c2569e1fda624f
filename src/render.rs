//! Dynamic-rendering fetch channel.
//!
//! Some catalog pages only produce their links after client-side scripts run.
//! The pipeline treats the renderer as an opaque source of post-render markup:
//! anything implementing [`RenderedPageSource`] can back the rendered search
//! stage and the rendered link extractor.

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::form_urlencoded;

use crate::fetch::{FetchError, HttpClient};

/// Placeholder replaced with the percent-encoded page URL.
pub const URL_PLACEHOLDER: &str = "{url}";

/// Produces fully rendered markup for a page URL.
///
/// Uses `async_trait` so sources can be shared as `Arc<dyn RenderedPageSource>`.
#[async_trait]
pub trait RenderedPageSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Returns the rendered markup of `page_url`.
    async fn render(&self, page_url: &str) -> Result<String, FetchError>;
}

/// Renders pages through an HTTP render service.
///
/// The service is addressed by a template such as
/// `http://127.0.0.1:3000/render?url={url}`; the response body is taken as
/// the rendered markup.
#[derive(Debug, Clone)]
pub struct RenderServiceSource {
    client: HttpClient,
    template: String,
}

impl RenderServiceSource {
    /// Creates a source for the given endpoint template.
    #[must_use]
    pub fn new(client: HttpClient, template: impl Into<String>) -> Self {
        Self {
            client,
            template: template.into(),
        }
    }

    /// Builds the service request URL for `page_url`.
    #[must_use]
    pub fn request_url(&self, page_url: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(page_url.as_bytes()).collect();
        self.template.replace(URL_PLACEHOLDER, &encoded)
    }
}

#[async_trait]
impl RenderedPageSource for RenderServiceSource {
    fn name(&self) -> &str {
        "render-service"
    }

    #[instrument(skip(self), fields(page = %page_url))]
    async fn render(&self, page_url: &str) -> Result<String, FetchError> {
        let request_url = self.request_url(page_url);
        debug!(service = %request_url, "requesting rendered page");

        match self.client.fetch_page(&request_url).await {
            Ok(body) if body.trim().is_empty() => {
                Err(FetchError::render(page_url, "render service returned an empty page"))
            }
            Ok(body) => Ok(body),
            Err(error) => Err(FetchError::render(page_url, error.to_string())),
        }
    }
}
