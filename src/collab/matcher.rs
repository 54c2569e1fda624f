//! Choosing one hit out of a search result list.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::search::{Query, SearchHit};

/// The matcher could not give an answer.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The backing oracle is unreachable or not configured.
    #[error("matcher unavailable: {0}")]
    Unavailable(String),
}

/// Picks the hit that best fits a query.
///
/// Returns the index of the chosen hit, or `None` when nothing fits. Callers
/// fall back to the first hit when the matcher errors.
#[async_trait]
pub trait HitMatcher: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Selects a hit.
    async fn select(&self, query: &Query, hits: &[SearchHit])
    -> Result<Option<usize>, MatchError>;
}

/// Always the first hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstHitMatcher;

#[async_trait]
impl HitMatcher for FirstHitMatcher {
    fn name(&self) -> &str {
        "first-hit"
    }

    async fn select(
        &self,
        _query: &Query,
        hits: &[SearchHit],
    ) -> Result<Option<usize>, MatchError> {
        Ok((!hits.is_empty()).then_some(0))
    }
}

/// Scores hits by the share of query words present in the title.
///
/// Ties go to the higher normalized Levenshtein similarity, then to the
/// earlier hit. No overlap at all means no match.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordOverlapMatcher;

impl WordOverlapMatcher {
    /// `(overlap, similarity)` for one title.
    #[must_use]
    pub fn score(query: &Query, title: &str) -> (f64, f64) {
        let normalized_title = Query::new(title);
        let title_words: HashSet<&str> = normalized_title.as_str().split(' ').collect();
        let query_words: Vec<&str> = query.as_str().split_whitespace().collect();
        if query_words.is_empty() {
            return (0.0, 0.0);
        }

        let present = query_words
            .iter()
            .filter(|word| title_words.contains(*word))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let overlap = present as f64 / query_words.len() as f64;
        let similarity = strsim::normalized_levenshtein(query.as_str(), normalized_title.as_str());
        (overlap, similarity)
    }
}

#[async_trait]
impl HitMatcher for WordOverlapMatcher {
    fn name(&self) -> &str {
        "word-overlap"
    }

    #[allow(clippy::float_cmp)]
    async fn select(
        &self,
        query: &Query,
        hits: &[SearchHit],
    ) -> Result<Option<usize>, MatchError> {
        let mut best: Option<(usize, (f64, f64))> = None;

        for (index, hit) in hits.iter().enumerate() {
            let score = Self::score(query, &hit.title);
            if score.0 <= 0.0 {
                continue;
            }
            let better = best.is_none_or(|(_, current)| {
                score.0 > current.0 || (score.0 == current.0 && score.1 > current.1)
            });
            if better {
                best = Some((index, score));
            }
        }

        if let Some((index, (overlap, similarity))) = best {
            debug!(index, overlap, similarity, title = %hits[index].title, "hit selected");
        }
        Ok(best.map(|(index, _)| index))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::search::HitSource;

    fn hits(titles: &[&str]) -> Vec<SearchHit> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                SearchHit::new(
                    format!("https://catalog.example.com/songs/{i}"),
                    *title,
                    HitSource::Primary,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_first_hit_matcher() {
        let query = Query::new("anything");
        let one = hits(&["A long title"]);
        assert_eq!(FirstHitMatcher.select(&query, &one).await.unwrap(), Some(0));
        assert_eq!(FirstHitMatcher.select(&query, &[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_word_overlap_prefers_most_query_words() {
        let query = Query::from_track("Rowdy Baby", "Dhanush");
        let candidates = hits(&[
            "Maari 2 Songs Download",
            "Baby Shark Remix Collection",
            "Rowdy Baby - Dhanush, Dhee",
        ]);
        assert_eq!(WordOverlapMatcher.select(&query, &candidates).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_word_overlap_breaks_ties_on_similarity() {
        let query = Query::new("kaavaalaa");
        let candidates = hits(&["Kaavaalaa Jailer Movie Songs Free", "Kaavaalaa Song"]);
        assert_eq!(WordOverlapMatcher.select(&query, &candidates).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_word_overlap_none_without_overlap() {
        let query = Query::new("nothing matches");
        let candidates = hits(&["Totally Different Title"]);
        assert_eq!(WordOverlapMatcher.select(&query, &candidates).await.unwrap(), None);
    }

    #[test]
    fn test_score_full_overlap() {
        let (overlap, _) = WordOverlapMatcher::score(
            &Query::new("arabic kuthu"),
            "Arabic Kuthu (Halamithi Habibo)",
        );
        assert_eq!(overlap, 1.0);
    }
}
