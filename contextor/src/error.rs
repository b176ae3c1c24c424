//! Typed error for the contextor crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextorError {
    /// Embedding the sub-queries failed; nothing can be searched.
    #[error("embedding service error: {0}")]
    Embedding(String),

    /// Store unreachable, unknown collection or unusable predicate.
    #[error("search error: {0}")]
    Search(String),

    /// Rerank call failed for one sub-query. Logged, never returned from `ask`.
    #[error("rerank service error: {0}")]
    Rerank(String),

    /// Decomposition output was not a list. Logged, never returned from `ask`.
    #[error("decomposition parse error: {0}")]
    DecompositionParse(String),

    /// Completion call failed. Turned into the fallback answer.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Invalid pipeline configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Store administration errors from rag-store.
    #[error("RAG error: {0}")]
    Rag(#[from] rag_store::RagError),
}

impl ContextorError {
    /// Classifies a store error raised on the query path.
    pub(crate) fn from_query_path(err: rag_store::RagError) -> Self {
        use rag_store::RagError as R;
        match err {
            R::Embedding(_) | R::VectorSizeMismatch { .. } => Self::Embedding(err.to_string()),
            other => Self::Search(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_store::RagError;

    #[test]
    fn query_path_errors_are_classified() {
        let e = ContextorError::from_query_path(RagError::Embedding("down".into()));
        assert!(matches!(e, ContextorError::Embedding(_)));
        let e = ContextorError::from_query_path(RagError::CollectionMissing("docs".into()));
        assert!(matches!(e, ContextorError::Search(_)));
        let e = ContextorError::from_query_path(RagError::InvalidPredicate("empty".into()));
        assert!(matches!(e, ContextorError::Search(_)));
    }
}
