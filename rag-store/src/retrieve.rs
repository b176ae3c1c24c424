//! Filtered vector search: one ranked hit list per query vector.
//!
//! The predicate goes to the index when it can evaluate it; otherwise the
//! client overfetches `limit * overfetch_factor` unfiltered hits and filters
//! them in-process. The fallback can under-return when more than the
//! overfetch window of hits fail the predicate; this is logged, not fixed.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use crate::errors::RagError;
use crate::filters::Predicate;
use crate::index::VectorIndex;
use crate::record::SearchHit;

/// Outcome per query vector: `None` marks a sub-query whose search failed.
pub type HitLists = Vec<Option<Vec<SearchHit>>>;

pub const DEFAULT_CONCURRENCY: usize = 4;

/// True when post-filtering left fewer than `limit` hits although the store
/// filled the whole overfetch window, so more matches may lie beyond it.
fn under_returned(kept: usize, limit: usize, raw_len: usize, window: usize) -> bool {
    kept < limit && raw_len >= window
}

#[derive(Clone)]
pub struct FilteredSearch {
    index: Arc<dyn VectorIndex>,
    limit: usize,
    overfetch_factor: usize,
    concurrency: usize,
}

impl FilteredSearch {
    pub fn new(index: Arc<dyn VectorIndex>, limit: usize, overfetch_factor: usize) -> Self {
        Self {
            index,
            limit: limit.max(1),
            overfetch_factor: overfetch_factor.max(1),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Caps the number of searches in flight for one call.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Searches every vector; output position `i` belongs to `vectors[i]`.
    ///
    /// # Errors
    /// A malformed predicate or a missing collection fails the whole call.
    /// Per-vector failures are logged and reported as `None` holes.
    #[instrument(skip_all, fields(vectors = vectors.len(), predicate = %predicate))]
    pub async fn search(
        &self,
        vectors: &[Vec<f32>],
        predicate: &Predicate,
    ) -> Result<HitLists, RagError> {
        predicate.validate()?;
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        self.index.ready().await?;

        let searches: Vec<_> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| async move {
                match self.search_one(v, predicate).await {
                    Ok(hits) => Some(hits),
                    Err(e) => {
                        warn!(sub_query = i, error = %e, "search failed for sub-query");
                        None
                    }
                }
            })
            .collect();
        let lists: HitLists = stream::iter(searches)
            .buffered(self.concurrency)
            .collect()
            .await;

        debug!(
            holes = lists.iter().filter(|l| l.is_none()).count(),
            "filtered search finished"
        );
        Ok(lists)
    }

    /// Search for one vector, truncated to the configured limit.
    pub async fn search_one(
        &self,
        vector: &[f32],
        predicate: &Predicate,
    ) -> Result<Vec<SearchHit>, RagError> {
        let mut hits = if self.index.supports_filter() || predicate.is_trivial() {
            let pred = (!predicate.is_trivial()).then_some(predicate);
            self.index.search(vector, self.limit, pred).await?
        } else {
            self.post_filtered(vector, predicate).await?
        };
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(self.limit);
        Ok(hits)
    }

    async fn post_filtered(
        &self,
        vector: &[f32],
        predicate: &Predicate,
    ) -> Result<Vec<SearchHit>, RagError> {
        let window = self.limit.saturating_mul(self.overfetch_factor);
        let raw = self.index.search(vector, window, None).await?;
        let raw_len = raw.len();

        let kept: Vec<SearchHit> = raw.into_iter().filter(|h| predicate.matches(h)).collect();
        if under_returned(kept.len(), self.limit, raw_len, window) {
            warn!(
                limit = self.limit,
                window,
                kept = kept.len(),
                predicate = %predicate,
                "client-side filtering under-returned; more matches may exist beyond the overfetch window"
            );
        }
        Ok(kept)
    }
}
