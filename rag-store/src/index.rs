//! Vector index seam used by the filtered search client.

use std::{future::Future, pin::Pin};

use crate::errors::RagError;
use crate::filters::Predicate;
use crate::record::SearchHit;

pub type SearchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<SearchHit>, RagError>> + Send + 'a>>;
pub type ReadyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RagError>> + Send + 'a>>;

/// k-nearest-neighbour search over stored chunks.
///
/// Implementations are shared between concurrent requests and must not
/// carry per-request state.
pub trait VectorIndex: Send + Sync {
    /// Whether [`VectorIndex::search`] evaluates a predicate itself.
    fn supports_filter(&self) -> bool;

    /// Returns up to `limit` hits, closest first.
    ///
    /// `predicate` is only passed when [`VectorIndex::supports_filter`] is true.
    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        predicate: Option<&'a Predicate>,
    ) -> SearchFuture<'a>;

    /// Fails with [`RagError::CollectionMissing`] when there is nothing to search.
    fn ready(&self) -> ReadyFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}
