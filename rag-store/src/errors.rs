//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors (chunk files).
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The target collection does not exist.
    #[error("collection '{0}' does not exist")]
    CollectionMissing(String),

    /// Search predicate cannot be evaluated (e.g. empty inclusion set).
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// Remote embedding call failed; the whole batch is lost.
    #[error("embedding service error: {0}")]
    Embedding(String),

    /// Mismatch in vector dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),
}

impl From<serde_json::Error> for RagError {
    fn from(e: serde_json::Error) -> Self {
        RagError::Parse(e.to_string())
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(e: qdrant_client::QdrantError) -> Self {
        RagError::Qdrant(e.to_string())
    }
}

impl From<ai_llm_service::AiLlmError> for RagError {
    fn from(e: ai_llm_service::AiLlmError) -> Self {
        RagError::Embedding(e.to_string())
    }
}
