//! Cross-query aggregation: dedup hits across sub-queries, rerank each
//! sub-query's fresh candidates, keep what clears the relevance floor.

use std::collections::HashSet;
use std::sync::Arc;

use rag_store::{HitLists, SearchHit};
use tracing::{debug, info, warn};

use crate::api_types::{Reference, SubQuery};
use crate::llm::Reranker;

/// State owned by one top-level request.
///
/// Never shared between requests; pass a fresh one per question.
#[derive(Debug, Default)]
pub struct RequestContext {
    seen: HashSet<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id`; false when an earlier sub-query already consumed it.
    fn claim(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[derive(Clone)]
pub struct Aggregator {
    reranker: Arc<dyn Reranker>,
    top_n: usize,
    floor: f32,
}

impl Aggregator {
    pub fn new(reranker: Arc<dyn Reranker>, top_n: usize, floor: f32) -> Self {
        Self {
            reranker,
            top_n: top_n.max(1),
            floor,
        }
    }

    /// Aggregates with a fresh [`RequestContext`].
    pub async fn aggregate(&self, subs: &[SubQuery], hit_lists: &HitLists) -> Vec<Reference> {
        let mut ctx = RequestContext::new();
        self.aggregate_with(&mut ctx, subs, hit_lists).await
    }

    /// `hit_lists[i]` belongs to `subs[i]`; sub-queries are processed by
    /// ascending ordinal and a `None` list is skipped.
    ///
    /// Rerank failures only lose that sub-query's references.
    pub async fn aggregate_with(
        &self,
        ctx: &mut RequestContext,
        subs: &[SubQuery],
        hit_lists: &HitLists,
    ) -> Vec<Reference> {
        let mut order: Vec<usize> = (0..subs.len()).collect();
        order.sort_by_key(|&i| subs[i].ordinal);

        let mut out: Vec<Reference> = Vec::new();
        for i in order {
            let sub = &subs[i];
            let Some(Some(hits)) = hit_lists.get(i) else {
                debug!(ordinal = sub.ordinal, "no hit list for sub-query");
                continue;
            };

            let fresh: Vec<&SearchHit> = hits.iter().filter(|h| ctx.claim(&h.id)).collect();
            if fresh.is_empty() {
                info!(ordinal = sub.ordinal, "no new candidates after dedup; skipping rerank");
                continue;
            }

            let candidates: Vec<String> = fresh.iter().map(|h| h.text.clone()).collect();
            let top_n = self.top_n.min(candidates.len());
            let ranked = match self.reranker.rerank(&sub.text, &candidates, top_n).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(ordinal = sub.ordinal, error = %e, "rerank failed; skipping sub-query");
                    continue;
                }
            };

            let mut used = HashSet::new();
            let mut kept: Vec<(f32, &SearchHit)> = ranked
                .into_iter()
                .filter(|r| r.index < fresh.len() && used.insert(r.index))
                .filter(|r| r.relevance_score >= self.floor)
                .map(|r| (r.relevance_score, fresh[r.index]))
                .collect();
            kept.sort_by(|a, b| b.0.total_cmp(&a.0));
            kept.truncate(top_n);

            debug!(
                ordinal = sub.ordinal,
                candidates = candidates.len(),
                kept = kept.len(),
                "sub-query reranked"
            );
            for (score, hit) in kept {
                out.push(Reference {
                    rank: out.len() + 1,
                    relevance_score: score,
                    text: hit.text.clone(),
                    document_id: hit.document_id.clone(),
                    page: hit.page,
                });
            }
        }

        info!(references = out.len(), seen = ctx.seen_count(), "aggregation finished");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextorError;
    use crate::llm::BoxFuture;
    use ai_llm_service::RerankHit;
    use std::sync::Mutex;

    type Script = dyn Fn(&str, &[String]) -> Result<Vec<RerankHit>, ContextorError> + Send + Sync;

    struct ScriptedReranker {
        calls: Mutex<Vec<(String, Vec<String>, usize)>>,
        script: Box<Script>,
    }

    impl ScriptedReranker {
        fn new(
            script: impl Fn(&str, &[String]) -> Result<Vec<RerankHit>, ContextorError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                script: Box::new(script),
            })
        }
    }

    impl Reranker for ScriptedReranker {
        fn rerank<'a>(
            &'a self,
            query: &'a str,
            candidates: &'a [String],
            top_n: usize,
        ) -> BoxFuture<'a, Vec<RerankHit>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((query.to_string(), candidates.to_vec(), top_n));
                (self.script)(query, candidates)
            })
        }
    }

    /// Scores candidates by position: 0.9, 0.8, ...
    fn descending(_: &str, c: &[String]) -> Result<Vec<RerankHit>, ContextorError> {
        Ok((0..c.len())
            .map(|i| RerankHit {
                index: i,
                relevance_score: 0.9 - 0.1 * i as f32,
            })
            .collect())
    }

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            id: id.into(),
            text: format!("text {id}"),
            document_id: "doc.pdf".into(),
            page: id.parse().unwrap_or(0),
            blocked: false,
            distance: 0.1,
        }
    }

    fn subs(n: usize) -> Vec<SubQuery> {
        (0..n)
            .map(|i| SubQuery {
                text: format!("q{i}"),
                ordinal: i,
            })
            .collect()
    }

    #[tokio::test]
    async fn duplicates_are_removed_before_reranking() {
        let r = ScriptedReranker::new(descending);
        let agg = Aggregator::new(r.clone(), 5, 0.2);
        let lists: HitLists = vec![Some(vec![hit("1"), hit("2")]), Some(vec![hit("2"), hit("3")])];

        let refs = agg.aggregate(&subs(2), &lists).await;

        let calls = r.calls.lock().unwrap();
        assert_eq!(calls[0].1, vec!["text 1", "text 2"]);
        assert_eq!(calls[1].1, vec!["text 3"]);
        assert_eq!(calls[1].2, 1);
        let pages: Vec<i64> = refs.iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert_eq!(refs.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn scores_below_the_floor_are_dropped() {
        let r = ScriptedReranker::new(|_, _| {
            Ok(vec![RerankHit {
                index: 0,
                relevance_score: 0.1,
            }])
        });
        let agg = Aggregator::new(r, 5, 0.2);
        let refs = agg.aggregate(&subs(1), &vec![Some(vec![hit("1")])]).await;
        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn fully_duplicated_sub_query_is_not_reranked() {
        let r = ScriptedReranker::new(descending);
        let agg = Aggregator::new(r.clone(), 5, 0.2);
        let lists: HitLists = vec![Some(vec![hit("1")]), Some(vec![hit("1")]), Some(vec![])];
        let refs = agg.aggregate(&subs(3), &lists).await;
        assert_eq!(r.calls.lock().unwrap().len(), 1);
        assert_eq!(refs.len(), 1);
    }

    #[tokio::test]
    async fn rerank_failure_skips_only_that_sub_query() {
        let r = ScriptedReranker::new(|q, c| {
            if q == "q0" {
                Err(ContextorError::Rerank("503".into()))
            } else {
                descending(q, c)
            }
        });
        let agg = Aggregator::new(r, 5, 0.2);
        let lists: HitLists = vec![Some(vec![hit("1")]), Some(vec![hit("2")])];
        let refs = agg.aggregate(&subs(2), &lists).await;
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].page, 2);
        assert_eq!(refs[0].rank, 1);
    }

    #[tokio::test]
    async fn holes_and_bad_indices_are_tolerated() {
        let r = ScriptedReranker::new(|_, _| {
            Ok(vec![
                RerankHit { index: 7, relevance_score: 0.99 },
                RerankHit { index: 0, relevance_score: 0.5 },
                RerankHit { index: 0, relevance_score: 0.4 },
                RerankHit { index: 1, relevance_score: 0.8 },
            ])
        });
        let agg = Aggregator::new(r, 5, 0.2);
        let lists: HitLists = vec![None, Some(vec![hit("1"), hit("2")])];
        let refs = agg.aggregate(&subs(2), &lists).await;
        let got: Vec<(i64, f32)> = refs.iter().map(|r| (r.page, r.relevance_score)).collect();
        assert_eq!(got, vec![(2, 0.8), (1, 0.5)]);
    }

    #[tokio::test]
    async fn top_n_is_clamped_to_candidate_count() {
        let r = ScriptedReranker::new(descending);
        let agg = Aggregator::new(r.clone(), 2, 0.0);
        let lists: HitLists = vec![Some(vec![hit("1"), hit("2"), hit("3")])];
        let refs = agg.aggregate(&subs(1), &lists).await;
        assert_eq!(r.calls.lock().unwrap()[0].2, 2);
        assert_eq!(refs.len(), 2);
    }

    #[tokio::test]
    async fn context_is_request_scoped() {
        let r = ScriptedReranker::new(descending);
        let agg = Aggregator::new(r, 5, 0.2);
        let lists: HitLists = vec![Some(vec![hit("1")])];
        assert_eq!(agg.aggregate(&subs(1), &lists).await.len(), 1);
        assert_eq!(agg.aggregate(&subs(1), &lists).await.len(), 1);

        let mut ctx = RequestContext::new();
        assert_eq!(agg.aggregate_with(&mut ctx, &subs(1), &lists).await.len(), 1);
        assert!(agg.aggregate_with(&mut ctx, &subs(1), &lists).await.is_empty());
    }
}
