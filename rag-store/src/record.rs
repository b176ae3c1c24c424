//! Core data models used by the library.

use serde::{Deserialize, Serialize};

/// Payload keys of a stored chunk.
pub mod fields {
    pub const TEXT: &str = "text";
    pub const DOCUMENT_ID: &str = "document_id";
    pub const PAGE: &str = "page";
    pub const BLOCKED: &str = "blocked";
}

/// One hit of a similarity search.
///
/// `id` is unique within the collection and is the deduplication key
/// downstream. `distance` is "smaller is closer" for every metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub document_id: String,
    pub page: i64,
    pub blocked: bool,
    pub distance: f32,
}

/// Page metadata attached to an ingested chunk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, alias = "pageId", alias = "page")]
    pub page_id: i64,
}

/// A finished text chunk handed over by the conversion/chunking collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkInput {
    #[serde(alias = "text")]
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl ChunkInput {
    pub fn new(content: impl Into<String>, page_id: i64) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata { page_id },
        }
    }
}

/// Per-document view assembled from stored chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub blocked: bool,
    /// Number of distinct pages with at least one chunk.
    pub page_count: usize,
    pub chunk_count: usize,
}

/// Collection-wide totals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub collection: String,
    pub total_documents: usize,
    pub blocked_documents: usize,
    pub unblocked_documents: usize,
    pub total_chunks: usize,
    pub blocked_chunks: usize,
}

impl StoreStats {
    pub fn from_documents(collection: &str, docs: &[DocumentSummary]) -> Self {
        let mut stats = StoreStats {
            collection: collection.to_string(),
            ..Default::default()
        };
        for d in docs {
            stats.total_documents += 1;
            stats.total_chunks += d.chunk_count;
            if d.blocked {
                stats.blocked_documents += 1;
                stats.blocked_chunks += d.chunk_count;
            } else {
                stats.unblocked_documents += 1;
            }
        }
        stats
    }
}

/// Outcome of inserting one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertReport {
    pub document_id: String,
    pub chunks_received: usize,
    pub chunks_stored: usize,
    pub skipped_empty: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_input_accepts_original_field_names() {
        let c: ChunkInput =
            serde_json::from_str(r#"{"content":"hello","metadata":{"pageId":3}}"#).unwrap();
        assert_eq!(c, ChunkInput::new("hello", 3));
        let c: ChunkInput = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
        assert_eq!(c.metadata.page_id, 0);
    }

    #[test]
    fn stats_split_blocked_and_unblocked() {
        let docs = vec![
            DocumentSummary { document_id: "a".into(), blocked: false, page_count: 2, chunk_count: 5 },
            DocumentSummary { document_id: "b".into(), blocked: true, page_count: 1, chunk_count: 3 },
        ];
        let s = StoreStats::from_documents("rag_docs", &docs);
        assert_eq!(s.total_documents, 2);
        assert_eq!(s.blocked_documents, 1);
        assert_eq!(s.total_chunks, 8);
        assert_eq!(s.blocked_chunks, 3);
    }
}
