//! End-to-end pipeline runs over in-process fakes of every collaborator.

use std::sync::{Arc, Mutex};

use ai_llm_service::{ChatMessage, RerankHit};
use contextor::{
    AskOptions, BoxFuture, ChatModel, Contextor, ContextorConfig, ContextorError, FragmentStream,
    Language, Progress, Reranker, SYNTHESIS_FAILED, Stage,
};
use futures::StreamExt;
use rag_store::{
    BatchEmbedder, EmbedFuture, EmbedPoolConfig, EmbeddingsProvider, FilteredSearch, Predicate,
    RagError, SearchFuture, SearchHit, VectorIndex,
};

/// Embeds a text as `[len]`; fails on demand.
struct LenEmbedder {
    fail: bool,
}

impl EmbeddingsProvider for LenEmbedder {
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a> {
        Box::pin(async move {
            if self.fail {
                return Err(RagError::Embedding("embedding service unavailable".into()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        })
    }
}

/// Every query sees the same corpus; the predicate is honoured natively.
struct Corpus {
    hits: Vec<SearchHit>,
    predicates: Mutex<Vec<Option<Predicate>>>,
}

impl VectorIndex for Corpus {
    fn supports_filter(&self) -> bool {
        true
    }

    fn search<'a>(
        &'a self,
        _vector: &'a [f32],
        limit: usize,
        predicate: Option<&'a Predicate>,
    ) -> SearchFuture<'a> {
        Box::pin(async move {
            self.predicates.lock().unwrap().push(predicate.cloned());
            Ok(self
                .hits
                .iter()
                .filter(|h| predicate.is_none_or(|p| p.matches(h)))
                .take(limit)
                .cloned()
                .collect())
        })
    }
}

/// A store that accepts connections but fails every search.
struct UnreachableIndex;

impl VectorIndex for UnreachableIndex {
    fn supports_filter(&self) -> bool {
        true
    }

    fn search<'a>(
        &'a self,
        _vector: &'a [f32],
        _limit: usize,
        _predicate: Option<&'a Predicate>,
    ) -> SearchFuture<'a> {
        Box::pin(async { Err(RagError::Qdrant("store unreachable".into())) })
    }
}

/// Records the stages the pipeline walks through.
#[derive(Default)]
struct StageLog {
    stages: Mutex<Vec<Stage>>,
}

impl Progress for StageLog {
    fn enter(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
}

/// Scores a candidate 0.9 when it mentions a word of the query, else 0.1.
struct KeywordReranker {
    calls: Mutex<usize>,
}

impl Reranker for KeywordReranker {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [String],
        top_n: usize,
    ) -> BoxFuture<'a, Vec<RerankHit>> {
        Box::pin(async move {
            *self.calls.lock().unwrap() += 1;
            let words: Vec<String> = query
                .split_whitespace()
                .map(|w| w.trim_matches('?').to_lowercase())
                .filter(|w| w.len() > 3)
                .collect();
            let mut out: Vec<RerankHit> = candidates
                .iter()
                .enumerate()
                .map(|(index, c)| {
                    let c = c.to_lowercase();
                    let relevance_score = if words.iter().any(|w| c.contains(w.as_str())) { 0.9 } else { 0.1 };
                    RerankHit { index, relevance_score }
                })
                .collect();
            out.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
            out.truncate(top_n);
            Ok(out)
        })
    }
}

/// Returns a canned reply; records the prompts it was given.
struct CannedChat {
    reply: Option<&'static str>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl CannedChat {
    fn new(reply: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

impl ChatModel for CannedChat {
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, String> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(messages.to_vec());
            self.reply
                .map(str::to_string)
                .ok_or_else(|| ContextorError::Synthesis("model offline".into()))
        })
    }

    fn complete_stream<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, FragmentStream> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let reply = self
                .reply
                .ok_or_else(|| ContextorError::Synthesis("model offline".into()))?;
            let words: Vec<Result<String, ContextorError>> = reply
                .split_inclusive(' ')
                .map(|w| Ok(w.to_string()))
                .collect();
            Ok(futures::stream::iter(words).boxed())
        })
    }
}

fn hit(id: &str, text: &str, doc: &str, blocked: bool) -> SearchHit {
    SearchHit {
        id: id.into(),
        text: text.into(),
        document_id: doc.into(),
        page: 1,
        blocked,
        distance: 0.5,
    }
}

struct Rig {
    pipeline: Contextor,
    corpus: Arc<Corpus>,
    reranker: Arc<KeywordReranker>,
    slow: Arc<CannedChat>,
}

fn rig(decomposition: Option<&'static str>, answer: Option<&'static str>, embed_fails: bool) -> Rig {
    let corpus = Arc::new(Corpus {
        hits: vec![
            hit("1", "Pumps must be primed before start.", "manual.pdf", false),
            hit("2", "Valves are inspected yearly.", "manual.pdf", false),
            hit("3", "Pumps in the archive are obsolete.", "archive.pdf", true),
            hit("4", "Warranty covers pumps for two years.", "warranty.pdf", false),
        ],
        predicates: Mutex::new(Vec::new()),
    });
    let reranker = Arc::new(KeywordReranker {
        calls: Mutex::new(0),
    });
    let slow = CannedChat::new(answer);
    let embedder = BatchEmbedder::new(
        Arc::new(LenEmbedder { fail: embed_fails }),
        EmbedPoolConfig {
            chunk_threshold: 2,
            max_workers: 2,
        },
    );
    let pipeline = Contextor::new(
        ContextorConfig::default(),
        embedder,
        FilteredSearch::new(corpus.clone(), 10, 2),
        CannedChat::new(decomposition),
        slow.clone(),
        reranker.clone(),
    )
    .unwrap();
    Rig {
        pipeline,
        corpus,
        reranker,
        slow,
    }
}

#[tokio::test]
async fn answers_with_deduplicated_ranked_references() {
    let r = rig(
        Some("['How are pumps started?', 'What does the warranty cover?']"),
        Some("Prime the pump first (page 1)."),
        false,
    );
    let qa = r
        .pipeline
        .ask("Tell me about pumps", AskOptions::default())
        .await
        .unwrap();

    assert_eq!(qa.answer, "Prime the pump first (page 1).");
    assert_eq!(qa.sub_queries.len(), 3);
    assert_eq!(qa.sub_queries[0].text, "Tell me about pumps");

    // Sub-query 0 consumes every unblocked hit; later sub-queries have nothing new.
    assert_eq!(*r.reranker.calls.lock().unwrap(), 1);
    let docs: Vec<&str> = qa.references.iter().map(|x| x.document_id.as_str()).collect();
    assert_eq!(docs, vec!["manual.pdf", "warranty.pdf"]);
    assert!(qa.references.iter().all(|x| x.relevance_score >= 0.2));
    assert_eq!(qa.references.iter().map(|x| x.rank).collect::<Vec<_>>(), vec![1, 2]);

    let predicates = r.corpus.predicates.lock().unwrap();
    assert_eq!(predicates.len(), 3);
    assert!(predicates.iter().all(|p| p.as_ref().is_some_and(|p| p.exclude_blocked)));

    let prompts = r.slow.prompts.lock().unwrap();
    assert!(prompts[0][0].content.contains("Use Chinese"));
    assert!(prompts[0][1].content.contains("Warranty covers pumps"));
}

#[tokio::test]
async fn prose_decomposition_still_answers_the_question() {
    let r = rig(Some("I think you should ask about pumps."), Some("ok"), false);
    let qa = r
        .pipeline
        .ask("Where are pumps described?", AskOptions::default())
        .await
        .unwrap();
    assert_eq!(qa.sub_queries.len(), 1);
    assert_eq!(qa.sub_queries[0].text, "Where are pumps described?");
    assert_eq!(qa.answer, "ok");
}

#[tokio::test]
async fn synthesis_failure_returns_the_fallback_answer() {
    let r = rig(None, None, false);
    let qa = r
        .pipeline
        .ask("pumps?", AskOptions { decompose: false, ..AskOptions::default() })
        .await
        .unwrap();
    assert_eq!(qa.answer, SYNTHESIS_FAILED);
}

#[tokio::test]
async fn embedding_failure_fails_the_request() {
    let r = rig(None, Some("unused"), true);
    let err = r
        .pipeline
        .ask("pumps?", AskOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextorError::Embedding(_)));
    assert!(r.slow.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_inclusion_set_is_a_search_error() {
    let r = rig(None, Some("unused"), false);
    let opts = AskOptions::only(Vec::<String>::new());
    let err = r.pipeline.ask("pumps?", opts).await.unwrap_err();
    assert!(matches!(err, ContextorError::Search(_)));
}

#[tokio::test]
async fn inclusion_limits_references_to_chosen_documents() {
    let r = rig(None, Some("ok"), false);
    let mut opts = AskOptions::only(["warranty.pdf"]);
    opts.language = Some(Language::English);
    let qa = r.pipeline.ask("What about pumps?", opts).await.unwrap();
    assert!(qa.references.iter().all(|x| x.document_id == "warranty.pdf"));
    assert!(r.slow.prompts.lock().unwrap()[0][0].content.contains("Use English"));
}

#[tokio::test]
async fn streamed_answer_arrives_in_fragments() {
    let r = rig(None, Some("Prime the pump."), false);
    let stream = r
        .pipeline
        .ask_stream("pumps?", AskOptions::default())
        .await
        .unwrap();
    assert_eq!(stream.sub_queries.len(), 1);
    let fragments: Vec<String> = stream.fragments.collect().await;
    assert_eq!(fragments, vec!["Prime ", "the ", "pump."]);
}

#[tokio::test]
async fn every_search_failing_fails_the_request() {
    let slow = CannedChat::new(Some("confident answer"));
    let pipeline = Contextor::new(
        ContextorConfig::default(),
        BatchEmbedder::new(Arc::new(LenEmbedder { fail: false }), EmbedPoolConfig::default()),
        FilteredSearch::new(Arc::new(UnreachableIndex), 10, 2),
        CannedChat::new(Some("['first part?', 'second part?']")),
        slow.clone(),
        Arc::new(KeywordReranker {
            calls: Mutex::new(0),
        }),
    )
    .unwrap();

    let err = pipeline
        .ask("q", AskOptions { decompose: false, ..AskOptions::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, ContextorError::Search(_)));

    let err = pipeline
        .ask_stream("pumps and valves?", AskOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ContextorError::Search(_)));
    assert!(slow.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn streamed_answer_reports_the_synthesis_stage() {
    let r = rig(None, Some("ok"), false);
    let log = Arc::new(StageLog::default());
    let pipeline = r.pipeline.with_progress(log.clone());
    let stream = pipeline
        .ask_stream("pumps?", AskOptions { decompose: false, ..AskOptions::default() })
        .await
        .unwrap();
    drop(stream);
    assert_eq!(
        *log.stages.lock().unwrap(),
        vec![Stage::Decompose, Stage::Embed, Stage::Search, Stage::Rerank, Stage::Synthesize]
    );
}
