use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use contextor::{Contextor, ContextorConfig};
use rag_store::{LlmEmbedder, RagConfig, RagStore};
use tracing::info;

use crate::error_handler::AppError;

/// Shared state for all HTTP handlers.
///
/// Every member is safe for concurrent use and never mutated after start.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<LlmServiceProfiles>,
    pub store: Arc<RagStore>,
    pub contextor: Arc<Contextor>,
}

impl AppState {
    pub fn new(llm: Arc<LlmServiceProfiles>, store: Arc<RagStore>, contextor: Arc<Contextor>) -> Self {
        Self {
            llm,
            store,
            contextor,
        }
    }

    /// Builds every client from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        let llm = Arc::new(
            LlmServiceProfiles::from_env().map_err(|e| AppError::Config(e.to_string()))?,
        );
        let rag_cfg = RagConfig::from_env().map_err(|e| AppError::Config(e.to_string()))?;
        rag_cfg
            .check_embedding_dim(llm.embedding_dim())
            .map_err(|e| AppError::Config(e.to_string()))?;
        let store = Arc::new(
            RagStore::new(rag_cfg, Arc::new(LlmEmbedder::new(llm.clone())))
                .map_err(|e| AppError::Config(e.to_string()))?,
        );
        let ctx_cfg = ContextorConfig::from_env().map_err(|e| AppError::Config(e.to_string()))?;
        let contextor = Arc::new(
            Contextor::from_services(ctx_cfg, &store, llm.clone())
                .map_err(|e| AppError::Config(e.to_string()))?,
        );

        info!(collection = %store.collection(), "application state ready");
        Ok(Self::new(llm, store, contextor))
    }
}
