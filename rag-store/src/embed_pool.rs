//! Batched embedding client: one direct call for small inputs, bounded
//! concurrent chunk calls for large ones, output always in input order.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::config::EmbedPoolConfig;
use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;

/// Turns a list of texts into a list of vectors.
///
/// Inputs longer than `chunk_threshold` are partitioned into contiguous
/// chunks which run on at most `min(max_workers, chunk_count)` concurrent
/// calls. Results are placed by chunk index, so completion order never
/// leaks into the output.
#[derive(Clone)]
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingsProvider>,
    cfg: EmbedPoolConfig,
    expected_dim: Option<usize>,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingsProvider>, cfg: EmbedPoolConfig) -> Self {
        Self {
            provider,
            cfg: EmbedPoolConfig {
                chunk_threshold: cfg.chunk_threshold.max(1),
                max_workers: cfg.max_workers.max(1),
            },
            expected_dim: None,
        }
    }

    /// Enforces this vector size on every returned vector.
    pub fn with_expected_dim(mut self, dim: usize) -> Self {
        self.expected_dim = Some(dim);
        self
    }

    pub fn config(&self) -> EmbedPoolConfig {
        self.cfg
    }

    /// Embeds `texts`, returning `out[i]` for `texts[i]`.
    ///
    /// # Errors
    /// [`RagError::Embedding`] if any chunk call fails (partial output is
    /// discarded), [`RagError::VectorSizeMismatch`] on a dimension mismatch.
    #[instrument(skip_all, fields(texts = texts.len()))]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = self.cfg.chunk_threshold;
        let vectors = if texts.len() <= threshold {
            debug!(threshold, "single batch call");
            self.call(texts).await?
        } else {
            let chunks: Vec<&[String]> = texts.chunks(threshold).collect();
            if chunks.len() == 1 {
                self.call(chunks[0]).await?
            } else {
                self.embed_chunks(&chunks).await?
            }
        };

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        if let Some(want) = self.expected_dim {
            if let Some(bad) = vectors.iter().find(|v| v.len() != want) {
                return Err(RagError::VectorSizeMismatch {
                    got: bad.len(),
                    want,
                });
            }
        }
        Ok(vectors)
    }

    async fn embed_chunks(&self, chunks: &[&[String]]) -> Result<Vec<Vec<f32>>, RagError> {
        let workers = self.cfg.max_workers.min(chunks.len());
        info!(chunks = chunks.len(), workers, "embedding in concurrent chunks");

        let mut slots: Vec<Option<Vec<Vec<f32>>>> = vec![None; chunks.len()];
        let calls: Vec<_> = chunks
            .iter()
            .copied()
            .enumerate()
            .map(|(idx, chunk)| async move { self.call(chunk).await.map(|v| (idx, v)) })
            .collect();
        let mut results = stream::iter(calls).buffer_unordered(workers);

        while let Some(res) = results.next().await {
            let (idx, vectors) = res.inspect_err(|e| warn!(error = %e, "embedding chunk failed"))?;
            debug!(chunk = idx, vectors = vectors.len(), "chunk embedded");
            slots[idx] = Some(vectors);
        }

        let mut out = Vec::with_capacity(chunks.iter().map(|c| c.len()).sum());
        for (idx, slot) in slots.into_iter().enumerate() {
            let vectors =
                slot.ok_or_else(|| RagError::Embedding(format!("chunk {idx} produced no result")))?;
            out.extend(vectors);
        }
        Ok(out)
    }

    async fn call(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let vectors = self
            .provider
            .embed_batch(batch)
            .await
            .map_err(|e| match e {
                RagError::Embedding(_) => e,
                other => RagError::Embedding(other.to_string()),
            })?;
        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "batch of {} texts returned {} vectors",
                batch.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbedFuture;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Encodes each text as `[first byte, len]`; batches starting earlier in
    /// the alphabet sleep longer.
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<Vec<String>>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail_on: Option<String>,
    }

    fn emb(t: &str) -> Vec<f32> {
        vec![t.as_bytes()[0] as f32, t.len() as f32]
    }

    impl EmbeddingsProvider for Recording {
        fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(texts.to_vec());
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                let delay = b'z'.saturating_sub(texts[0].as_bytes()[0]) as u64;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if self.fail_on.as_deref().is_some_and(|f| texts.iter().any(|t| t == f)) {
                    return Err(RagError::Embedding("boom".into()));
                }
                Ok(texts.iter().map(|t| emb(t)).collect())
            })
        }
    }

    fn texts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_input_makes_no_call() {
        let p = Arc::new(Recording::default());
        let e = BatchEmbedder::new(p.clone(), EmbedPoolConfig::default());
        assert!(e.embed(&[]).await.unwrap().is_empty());
        assert!(p.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn small_input_is_one_batch_call() {
        let p = Arc::new(Recording::default());
        let e = BatchEmbedder::new(p.clone(), EmbedPoolConfig { chunk_threshold: 3, max_workers: 4 });
        let out = e.embed(&texts(&["x", "yy", "zzz"])).await.unwrap();
        assert_eq!(out, vec![emb("x"), emb("yy"), emb("zzz")]);
        assert_eq!(p.calls.lock().unwrap().len(), 1);
        assert_eq!(p.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn three_texts_two_per_chunk_keep_order() {
        let p = Arc::new(Recording::default());
        let e = BatchEmbedder::new(p.clone(), EmbedPoolConfig { chunk_threshold: 2, max_workers: 2 });
        let out = e.embed(&texts(&["a", "b", "c"])).await.unwrap();
        assert_eq!(out, vec![emb("a"), emb("b"), emb("c")]);

        let mut calls = p.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec![texts(&["a", "b"]), texts(&["c"])]);
        assert!(p.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn order_survives_out_of_order_completion() {
        let p = Arc::new(Recording::default());
        let e = BatchEmbedder::new(p.clone(), EmbedPoolConfig { chunk_threshold: 1, max_workers: 3 });
        // Later letters finish first (shorter sleep).
        let input = texts(&["a", "m", "q", "t", "w", "z"]);
        let out = e.embed(&input).await.unwrap();
        let want: Vec<Vec<f32>> = input.iter().map(|t| emb(t)).collect();
        assert_eq!(out, want);
        assert_eq!(p.calls.lock().unwrap().len(), 6);
        assert!(p.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn workers_never_exceed_chunk_count() {
        let p = Arc::new(Recording::default());
        let e = BatchEmbedder::new(p.clone(), EmbedPoolConfig { chunk_threshold: 2, max_workers: 8 });
        e.embed(&texts(&["a", "b", "c", "d"])).await.unwrap();
        assert!(p.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn one_failed_chunk_fails_the_call() {
        let p = Arc::new(Recording {
            fail_on: Some("c".into()),
            ..Default::default()
        });
        let e = BatchEmbedder::new(p, EmbedPoolConfig { chunk_threshold: 2, max_workers: 2 });
        let err = e.embed(&texts(&["a", "b", "c"])).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn dimension_is_enforced() {
        let p = Arc::new(Recording::default());
        let e = BatchEmbedder::new(p, EmbedPoolConfig::default()).with_expected_dim(3);
        let err = e.embed(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, RagError::VectorSizeMismatch { got: 2, want: 3 }));
    }
}
