//! Embedding provider backed by the shared model profiles.

use std::sync::Arc;

use ai_llm_service::service_profiles::LlmServiceProfiles;

use crate::embed::{EmbedFuture, EmbeddingsProvider};
use crate::errors::RagError;

/// Sends batches to the `embedding` profile of [`LlmServiceProfiles`].
#[derive(Clone)]
pub struct LlmEmbedder {
    svc: Arc<LlmServiceProfiles>,
}

impl LlmEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>) -> Self {
        Self { svc }
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a> {
        Box::pin(async move {
            let vectors = self.svc.embed_batch(texts).await?;
            if vectors.len() != texts.len() {
                return Err(RagError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            Ok(vectors)
        })
    }
}
