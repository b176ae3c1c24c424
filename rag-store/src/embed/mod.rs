use crate::errors::RagError;
use std::{future::Future, pin::Pin};

/// Boxed future returned by [`EmbeddingsProvider::embed_batch`].
pub type EmbedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>>;

/// Provider interface for embedding generation.
///
/// One call is one remote batch request: the provider returns exactly one
/// vector per input text, in input order, or fails for the whole batch.
/// Implement this trait to plug in another backend or an in-process fake.
pub trait EmbeddingsProvider: Send + Sync {
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a>;
}

pub mod service;

pub use service::LlmEmbedder;
