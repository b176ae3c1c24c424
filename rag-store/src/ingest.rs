//! Insertion path for pre-chunked documents.
//!
//! Flow: drop empty chunks → normalize → embed through the batched client
//! (dimension enforced) → ensure collection → replace the document's
//! previous chunks → upsert in batches.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, instrument, warn};

use crate::config::RagConfig;
use crate::embed_pool::BatchEmbedder;
use crate::errors::RagError;
use crate::mappers::{PreparedChunk, to_point};
use crate::normalize::normalize_chunk_text;
use crate::qdrant_facade::QdrantFacade;
use crate::record::{ChunkInput, InsertReport};

/// Normalizes chunks and drops those left without content.
///
/// Ordinals are assigned to kept chunks only, so they stay dense.
pub fn prepare_chunks(chunks: &[ChunkInput], max_chars: usize) -> (Vec<PreparedChunk>, usize) {
    let mut kept = Vec::with_capacity(chunks.len());
    let mut skipped = 0usize;
    for c in chunks {
        let text = normalize_chunk_text(&c.content, max_chars);
        if text.is_empty() {
            skipped += 1;
            continue;
        }
        kept.push(PreparedChunk {
            ordinal: kept.len(),
            text,
            page: c.metadata.page_id,
        });
    }
    (kept, skipped)
}

/// Inserts one document, replacing whatever was stored under its id.
///
/// # Errors
/// - [`RagError::Config`] for a blank document id.
/// - [`RagError::Embedding`] / [`RagError::VectorSizeMismatch`] from the
///   embedding step; nothing is written to the store in that case.
/// - [`RagError::Qdrant`] on store failures.
#[instrument(skip_all, fields(document_id = %document_id, chunks = chunks.len()))]
pub async fn insert_document(
    cfg: &RagConfig,
    client: &QdrantFacade,
    embedder: &BatchEmbedder,
    document_id: &str,
    chunks: &[ChunkInput],
    progress: bool,
) -> Result<InsertReport, RagError> {
    let document_id = document_id.trim();
    if document_id.is_empty() {
        return Err(RagError::Config("document_id is empty".into()));
    }

    let (prepared, skipped_empty) = prepare_chunks(chunks, cfg.chunk_max_chars);
    if skipped_empty > 0 {
        warn!(document_id, skipped_empty, "skipping chunks without content");
    }
    let mut report = InsertReport {
        document_id: document_id.to_string(),
        chunks_received: chunks.len(),
        chunks_stored: 0,
        skipped_empty,
    };
    if prepared.is_empty() {
        warn!(document_id, "document has no content to store");
        return Ok(report);
    }

    let texts: Vec<String> = prepared.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder
        .clone()
        .with_expected_dim(cfg.vector_size)
        .embed(&texts)
        .await?;
    debug!(document_id, vectors = vectors.len(), "chunks embedded");

    client.ensure_collection(&cfg.vector_space()).await?;
    client.delete_document(document_id).await?;

    let batch_size = cfg.upsert_batch.max(1);
    let pb = upload_bar(prepared.len().div_ceil(batch_size), progress);

    let mut pairs = prepared.iter().zip(vectors);
    loop {
        let points: Vec<_> = pairs
            .by_ref()
            .take(batch_size)
            .map(|(chunk, vector)| to_point(document_id, chunk, vector))
            .collect();
        if points.is_empty() {
            break;
        }
        report.chunks_stored += client.upsert_points(points).await?;
        pb.inc(1);
    }
    pb.finish_with_message("upload complete");

    info!(
        document_id,
        stored = report.chunks_stored,
        skipped = report.skipped_empty,
        "document inserted"
    );
    Ok(report)
}

fn upload_bar(batches: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(batches as u64);
    match ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} batches ({eta})",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => debug!(error = %e, "progress template rejected; using default style"),
    }
    pb
}
