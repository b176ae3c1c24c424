//! Document chunk store over Qdrant.
//!
//! This crate provides:
//! - a batched embedding client ([`BatchEmbedder`]) with bounded concurrency
//! - a filtered vector search client ([`FilteredSearch`]) with a client-side fallback
//! - document insertion and administration (block, delete, list, stats)
//!
//! [`RagStore`] wires configuration, the Qdrant facade and an embedding
//! provider together and is the entry point for application code.

mod config;
pub mod embed;
mod embed_pool;
mod errors;
mod filters;
mod index;
mod ingest;
mod io_jsonl;
mod mappers;
mod normalize;
mod qdrant_facade;
mod record;
mod retrieve;

use std::{path::Path, sync::Arc};

use tracing::{debug, info, trace};

pub use config::{DistanceKind, EmbedPoolConfig, RagConfig, VectorSpace};
pub use embed::{EmbedFuture, EmbeddingsProvider, LlmEmbedder};
pub use embed_pool::BatchEmbedder;
pub use errors::RagError;
pub use filters::Predicate;
pub use index::{ReadyFuture, SearchFuture, VectorIndex};
pub use io_jsonl::{parse_chunks, read_chunk_file};
pub use mappers::point_id;
pub use qdrant_facade::QdrantFacade;
pub use record::{
    ChunkInput, ChunkMetadata, DocumentSummary, InsertReport, SearchHit, StoreStats, fields,
};
pub use retrieve::{FilteredSearch, HitLists};

/// High-level facade over one collection.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct RagStore {
    cfg: RagConfig,
    client: Arc<QdrantFacade>,
    embedder: BatchEmbedder,
    search: FilteredSearch,
}

impl RagStore {
    /// Constructs a new store from the given configuration.
    ///
    /// # Errors
    /// Returns `RagError::Config` on invalid configuration or
    /// `RagError::Qdrant` if the client cannot be built.
    pub fn new(cfg: RagConfig, provider: Arc<dyn EmbeddingsProvider>) -> Result<Self, RagError> {
        trace!(collection = %cfg.collection, "RagStore::new");
        let client = Arc::new(QdrantFacade::new(&cfg)?);
        let embedder = BatchEmbedder::new(provider, cfg.embed);
        let search = FilteredSearch::new(client.clone(), cfg.search_limit, cfg.overfetch_factor)
            .with_concurrency(cfg.search_concurrency);
        Ok(Self {
            cfg,
            client,
            embedder,
            search,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.cfg
    }

    pub fn collection(&self) -> &str {
        &self.cfg.collection
    }

    /// The batched embedding client, shared with query embedding.
    pub fn embedder(&self) -> &BatchEmbedder {
        &self.embedder
    }

    /// The filtered search client over this collection.
    pub fn search(&self) -> &FilteredSearch {
        &self.search
    }

    pub async fn collection_exists(&self) -> Result<bool, RagError> {
        self.client.collection_exists().await
    }

    /// Creates the collection with the configured vector space when missing.
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        self.client.ensure_collection(&self.cfg.vector_space()).await
    }

    /// Inserts a pre-chunked document, replacing its previous chunks.
    pub async fn insert_document(
        &self,
        document_id: &str,
        chunks: &[ChunkInput],
    ) -> Result<InsertReport, RagError> {
        ingest::insert_document(&self.cfg, &self.client, &self.embedder, document_id, chunks, false)
            .await
    }

    /// Reads a chunk file and inserts it under `document_id`.
    ///
    /// `progress` draws a batch progress bar on stderr (CLI use).
    pub async fn insert_file(
        &self,
        document_id: &str,
        path: impl AsRef<Path>,
        progress: bool,
    ) -> Result<InsertReport, RagError> {
        let chunks = read_chunk_file(path)?;
        ingest::insert_document(
            &self.cfg,
            &self.client,
            &self.embedder,
            document_id,
            &chunks,
            progress,
        )
        .await
    }

    /// Lists stored documents, optionally only blocked or only unblocked ones.
    ///
    /// A missing collection lists as empty.
    pub async fn list_documents(
        &self,
        only_blocked: Option<bool>,
    ) -> Result<Vec<DocumentSummary>, RagError> {
        if !self.collection_exists().await? {
            debug!(collection = %self.cfg.collection, "no collection; nothing to list");
            return Ok(Vec::new());
        }
        self.client.list_documents(only_blocked).await
    }

    pub async fn stats(&self) -> Result<StoreStats, RagError> {
        let docs = self.list_documents(None).await?;
        Ok(StoreStats::from_documents(&self.cfg.collection, &docs))
    }

    pub async fn set_blocked(&self, document_id: &str, blocked: bool) -> Result<(), RagError> {
        self.require_collection().await?;
        self.client.set_blocked(document_id, blocked).await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<(), RagError> {
        self.require_collection().await?;
        self.client.delete_document(document_id).await
    }

    /// Drops the whole collection; a missing collection is not an error.
    pub async fn clear(&self) -> Result<(), RagError> {
        if !self.collection_exists().await? {
            info!(collection = %self.cfg.collection, "collection already absent");
            return Ok(());
        }
        self.client.drop_collection().await
    }

    async fn require_collection(&self) -> Result<(), RagError> {
        if self.collection_exists().await? {
            Ok(())
        } else {
            Err(RagError::CollectionMissing(self.cfg.collection.clone()))
        }
    }
}
