//! Catalog search with ordered fallback.
//!
//! # Architecture
//!
//! - [`Query`] - normalized search text derived from a title/artist pair
//! - [`SearchStrategy`] - async trait every stage implements
//! - [`DirectSearch`] - plain HTTP search against one catalog
//! - [`RenderedSearch`] - search through the dynamic-rendering channel
//! - [`VariationSearch`] - retries an inner stage over [`variations`]
//! - [`SearchCascade`] - evaluates stages in order, first non-empty wins
//!
//! Every stage's output goes through [`filter_and_deduplicate`] before the
//! cascade looks at it.
//!
//! # Example
//!
//! ```no_run
//! use trackfetch_core::config::{CatalogEndpoints, FetchConfig};
//! use trackfetch_core::search::{Query, SearchCascade};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::new(CatalogEndpoints::primary("https://catalog.example.com"));
//! let client = config.build_client()?;
//! let cascade = SearchCascade::from_config(&client, &config, None)?;
//!
//! for hit in cascade.search(&Query::from_track("Rowdy Baby", "Dhanush")).await {
//!     println!("{} -> {}", hit.title, hit.url);
//! }
//! # Ok(())
//! # }
//! ```

mod cascade;
mod hit;
mod query;
mod results;
mod stages;
mod variations;

pub use cascade::SearchCascade;
pub use hit::{HitSource, MIN_TITLE_CHARS, SearchHit, filter_and_deduplicate, is_junk_title};
pub use query::{Query, STOP_WORDS};
pub use results::{HIT_PATH_KEYWORDS, parse_search_results, search_url};
pub use stages::{DirectSearch, RenderedSearch, VariationSearch};
pub use variations::variations;

use async_trait::async_trait;

use crate::fetch::FetchError;

/// One way of turning query text into catalog hits.
///
/// Uses `async_trait` so stages can be held as `Arc<dyn SearchStrategy>`.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Stage name for logs.
    fn name(&self) -> &str;

    /// Returns raw hits in discovery order. Errors are absorbed by the cascade.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError>;
}
