//! Question answering over ingested documents.
//!
//! Pipeline per question: decompose into sub-questions, embed them through
//! the batched client, run one filtered search per sub-question, dedup and
//! rerank across sub-questions, then synthesize the answer (full or
//! streamed). [`Contextor`] holds the shared clients; every call builds its
//! own request state, so one instance serves concurrent requests.

mod aggregate;
mod api_types;
mod cfg;
mod decompose;
mod error;
mod llm;
mod progress;
mod prompt;
mod synthesize;

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use rag_store::{BatchEmbedder, FilteredSearch, RagStore};
use tracing::{debug, info, instrument};

pub use aggregate::{Aggregator, RequestContext};
pub use api_types::{AnswerStream, AskOptions, Language, QaAnswer, Reference, Retrieval, SubQuery};
pub use cfg::ContextorConfig;
pub use decompose::{QueryDecomposer, parse_sub_questions};
pub use error::ContextorError;
pub use llm::{BoxFuture, ChatModel, ChatTier, FragmentStream, ProfileChat, ProfileReranker, Reranker};
pub use progress::{IndicatifProgress, NoopProgress, Progress, Stage};
pub use prompt::{build_user_prompt, system_prompt};
pub use synthesize::{AnswerSynthesizer, NO_ANSWER, SYNTHESIS_FAILED};

/// The question answering pipeline.
pub struct Contextor {
    cfg: ContextorConfig,
    embedder: BatchEmbedder,
    search: FilteredSearch,
    decomposer: QueryDecomposer,
    aggregator: Aggregator,
    synthesizer: AnswerSynthesizer,
    progress: Arc<dyn Progress>,
}

impl Contextor {
    /// Wires the pipeline from its collaborators.
    ///
    /// `fast` decomposes questions, `slow` writes answers.
    pub fn new(
        cfg: ContextorConfig,
        embedder: BatchEmbedder,
        search: FilteredSearch,
        fast: Arc<dyn ChatModel>,
        slow: Arc<dyn ChatModel>,
        reranker: Arc<dyn Reranker>,
    ) -> Result<Self, ContextorError> {
        cfg.validate()?;
        Ok(Self {
            decomposer: QueryDecomposer::new(fast, cfg.max_sub_queries),
            aggregator: Aggregator::new(reranker, cfg.rerank_top_n, cfg.relevance_floor),
            synthesizer: AnswerSynthesizer::new(slow),
            embedder,
            search,
            cfg,
            progress: Arc::new(NoopProgress),
        })
    }

    /// Builds the pipeline over a store and the shared provider profiles.
    pub fn from_services(
        cfg: ContextorConfig,
        store: &RagStore,
        svc: Arc<LlmServiceProfiles>,
    ) -> Result<Self, ContextorError> {
        let embedder = store
            .embedder()
            .clone()
            .with_expected_dim(store.config().vector_size);
        Self::new(
            cfg,
            embedder,
            store.search().clone(),
            Arc::new(ProfileChat::new(svc.clone(), ChatTier::Fast)),
            Arc::new(ProfileChat::new(svc.clone(), ChatTier::Slow)),
            Arc::new(ProfileReranker::new(svc)),
        )
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ContextorConfig {
        &self.cfg
    }

    /// Decomposes, searches and aggregates; stops before synthesis.
    ///
    /// # Errors
    /// [`ContextorError::Embedding`] when the sub-questions cannot be embedded,
    /// [`ContextorError::Search`] for an unusable predicate, a missing
    /// collection, or when no sub-query search succeeded. Decomposition,
    /// rerank and single-search failures only reduce the result.
    #[instrument(skip_all, fields(question_chars = question.len()))]
    pub async fn retrieve(
        &self,
        question: &str,
        opts: &AskOptions,
    ) -> Result<Retrieval, ContextorError> {
        let result = self.run_retrieval(question, opts).await;
        if let Err(e) = &result {
            self.progress.abandon(&e.to_string());
        }
        result
    }

    async fn run_retrieval(
        &self,
        question: &str,
        opts: &AskOptions,
    ) -> Result<Retrieval, ContextorError> {
        if question.trim().is_empty() {
            return Err(ContextorError::Config("question is empty".into()));
        }
        let predicate = opts.predicate();
        predicate
            .validate()
            .map_err(ContextorError::from_query_path)?;

        self.progress.enter(Stage::Decompose);
        let sub_queries = if opts.decompose {
            self.decomposer.decompose(question).await
        } else {
            decompose::original_only(question)
        };

        self.progress.enter(Stage::Embed);
        let texts: Vec<String> = sub_queries.iter().map(|s| s.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(ContextorError::from_query_path)?;

        self.progress.enter(Stage::Search);
        let hit_lists = self
            .search
            .search(&vectors, &predicate)
            .await
            .map_err(ContextorError::from_query_path)?;
        if !hit_lists.is_empty() && hit_lists.iter().all(Option::is_none) {
            return Err(ContextorError::Search(format!(
                "all {} sub-query searches failed",
                hit_lists.len()
            )));
        }
        debug!(
            lists = hit_lists.len(),
            hits = hit_lists.iter().flatten().map(Vec::len).sum::<usize>(),
            "search finished"
        );

        self.progress.enter(Stage::Rerank);
        let references = self.aggregator.aggregate(&sub_queries, &hit_lists).await;
        info!(
            sub_queries = sub_queries.len(),
            references = references.len(),
            "retrieval finished"
        );
        Ok(Retrieval {
            sub_queries,
            references,
        })
    }

    /// Answers a question in one piece.
    ///
    /// Retrieval errors propagate; synthesis errors become the fallback answer.
    pub async fn ask(&self, question: &str, opts: AskOptions) -> Result<QaAnswer, ContextorError> {
        let Retrieval {
            sub_queries,
            references,
        } = self.retrieve(question, &opts).await?;

        self.progress.enter(Stage::Synthesize);
        let language = opts.language.unwrap_or(self.cfg.default_language);
        let answer = self
            .synthesizer
            .synthesize(&sub_queries, &references, language)
            .await;
        self.progress.done();

        Ok(QaAnswer {
            answer,
            sub_queries,
            references,
        })
    }

    /// Answers a question as a stream of fragments.
    ///
    /// Retrieval completes before this returns, so its errors surface here
    /// rather than inside the stream.
    pub async fn ask_stream(
        &self,
        question: &str,
        opts: AskOptions,
    ) -> Result<AnswerStream, ContextorError> {
        let Retrieval {
            sub_queries,
            references,
        } = self.retrieve(question, &opts).await?;

        self.progress.enter(Stage::Synthesize);
        let language = opts.language.unwrap_or(self.cfg.default_language);
        let fragments = self
            .synthesizer
            .synthesize_stream(&sub_queries, &references, language);
        self.progress.done();

        Ok(AnswerStream {
            sub_queries,
            references,
            fragments,
        })
    }
}
