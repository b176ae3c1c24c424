//! Runtime and collection configuration.

use std::str::FromStr;

use crate::errors::RagError;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl DistanceKind {
    /// Converts a store score into a distance where smaller is closer.
    ///
    /// Qdrant reports similarity for Cosine/Dot and raw distance for Euclid.
    pub fn score_to_distance(self, score: f32) -> f32 {
        match self {
            DistanceKind::Cosine => 1.0 - score,
            DistanceKind::Dot => -score,
            DistanceKind::Euclid => score,
        }
    }
}

impl FromStr for DistanceKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclid" | "euclidean" | "l2" => Ok(Self::Euclid),
            other => Err(RagError::Config(format!("unknown distance '{other}'"))),
        }
    }
}

/// Describes the vector space of the collection.
#[derive(Clone, Copy, Debug)]
pub struct VectorSpace {
    /// Dimensionality of vectors.
    pub size: usize,
    /// Distance function.
    pub distance: DistanceKind,
}

/// Knobs of the batched embedding client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmbedPoolConfig {
    /// Inputs up to this length go out as one batch; larger inputs are split
    /// into contiguous chunks of this size.
    pub chunk_threshold: usize,
    /// Upper bound on concurrently running chunk calls.
    pub max_workers: usize,
}

impl Default for EmbedPoolConfig {
    fn default() -> Self {
        Self {
            chunk_threshold: 100,
            max_workers: 3,
        }
    }
}

/// Configuration for ingestion and retrieval.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Request timeout for Qdrant calls.
    pub qdrant_timeout_secs: u64,
    /// Target collection name.
    pub collection: String,
    /// Collection-wide embedding dimensionality.
    pub vector_size: usize,
    /// Distance function (Cosine by default).
    pub distance: DistanceKind,
    /// Upsert batch size (typical range: 128..512).
    pub upsert_batch: usize,
    /// Chunk text is cut to this many characters before embedding.
    pub chunk_max_chars: usize,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    /// Hits returned per query vector.
    pub search_limit: usize,
    /// Multiplier on `search_limit` when the predicate is applied client-side.
    pub overfetch_factor: usize,
    /// Sub-query searches in flight per request.
    pub search_concurrency: usize,
    /// Whether the store evaluates predicates itself.
    pub native_filter: bool,
    /// Batched embedding client knobs.
    pub embed: EmbedPoolConfig,
}

impl RagConfig {
    /// Creates a sane default config for a given collection name and Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            qdrant_timeout_secs: 10,
            collection: collection.into(),
            vector_size: 768,
            distance: DistanceKind::Cosine,
            upsert_batch: 256,
            chunk_max_chars: 4000,
            exact_search: false,
            search_limit: 10,
            overfetch_factor: 2,
            search_concurrency: 4,
            native_filter: true,
            embed: EmbedPoolConfig::default(),
        }
    }

    /// Reads the configuration from environment variables, falling back to defaults.
    ///
    /// `EMBEDDING_DIM` is shared with the embedding profile of `ai-llm-service`.
    pub fn from_env() -> Result<Self, RagError> {
        let mut cfg = Self::new_default(
            env_or("QDRANT_URL", "http://127.0.0.1:6334"),
            env_or("QDRANT_COLLECTION", "rag_docs"),
        );
        cfg.qdrant_api_key = env_nonempty("QDRANT_API_KEY");
        cfg.qdrant_timeout_secs = env_parse("QDRANT_TIMEOUT_SECS", cfg.qdrant_timeout_secs)?;
        cfg.vector_size = env_parse("EMBEDDING_DIM", cfg.vector_size)?;
        if let Some(d) = env_nonempty("QDRANT_DISTANCE") {
            cfg.distance = d.parse()?;
        }
        cfg.upsert_batch = env_parse("QDRANT_BATCH_SIZE", cfg.upsert_batch)?;
        cfg.chunk_max_chars = env_parse("CHUNK_MAX_CHARS", cfg.chunk_max_chars)?;
        cfg.exact_search = env_parse("RAG_EXACT_SEARCH", cfg.exact_search)?;
        cfg.search_limit = env_parse("RAG_SEARCH_LIMIT", cfg.search_limit)?;
        cfg.overfetch_factor = env_parse("RAG_OVERFETCH_FACTOR", cfg.overfetch_factor)?;
        cfg.search_concurrency = env_parse("RAG_SEARCH_CONCURRENCY", cfg.search_concurrency)?;
        cfg.native_filter = env_parse("RAG_NATIVE_FILTER", cfg.native_filter)?;
        cfg.embed.chunk_threshold = env_parse("EMBED_CHUNK_THRESHOLD", cfg.embed.chunk_threshold)?;
        cfg.embed.max_workers = env_parse("EMBED_MAX_WORKERS", cfg.embed.max_workers)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(RagError::Config("qdrant_url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        let positive = [
            ("vector_size", self.vector_size),
            ("upsert_batch", self.upsert_batch),
            ("chunk_max_chars", self.chunk_max_chars),
            ("search_limit", self.search_limit),
            ("overfetch_factor", self.overfetch_factor),
            ("search_concurrency", self.search_concurrency),
            ("embed.chunk_threshold", self.embed.chunk_threshold),
            ("embed.max_workers", self.embed.max_workers),
        ];
        for (name, v) in positive {
            if v == 0 {
                return Err(RagError::Config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    /// Rejects an embedding profile that requests a different output size
    /// than the collection holds. `None` leaves the size to the model.
    pub fn check_embedding_dim(&self, requested: Option<usize>) -> Result<(), RagError> {
        match requested {
            Some(dim) if dim != self.vector_size => Err(RagError::Config(format!(
                "embedding profile requests {dim} dimensions but collection '{}' holds {}",
                self.collection, self.vector_size
            ))),
            _ => Ok(()),
        }
    }

    pub fn vector_space(&self) -> VectorSpace {
        VectorSpace {
            size: self.vector_size,
            distance: self.distance,
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_nonempty(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T, RagError> {
    match env_nonempty(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| RagError::Config(format!("{name}: cannot parse '{raw}'"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = RagConfig::new_default("http://localhost:6334", "rag_docs");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.embed, EmbedPoolConfig { chunk_threshold: 100, max_workers: 3 });
    }

    #[test]
    fn zero_knobs_are_rejected() {
        let mut cfg = RagConfig::new_default("http://localhost:6334", "rag_docs");
        cfg.embed.max_workers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RagConfig::new_default("http://localhost:6334", " ");
        cfg.search_limit = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn embedding_dim_must_match_collection() {
        let cfg = RagConfig::new_default("http://localhost:6334", "rag_docs");
        assert!(cfg.check_embedding_dim(None).is_ok());
        assert!(cfg.check_embedding_dim(Some(768)).is_ok());
        assert!(matches!(cfg.check_embedding_dim(Some(1024)), Err(RagError::Config(_))));
    }

    #[test]
    fn distance_conversion_orders_closest_first() {
        assert!(DistanceKind::Cosine.score_to_distance(0.9) < DistanceKind::Cosine.score_to_distance(0.1));
        assert!(DistanceKind::Dot.score_to_distance(5.0) < DistanceKind::Dot.score_to_distance(1.0));
        assert_eq!(DistanceKind::Euclid.score_to_distance(0.3), 0.3);
        assert_eq!("L2".parse::<DistanceKind>().unwrap(), DistanceKind::Euclid);
    }
}
