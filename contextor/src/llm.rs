//! Model seams of the pipeline and their implementations over the shared
//! provider profiles.

use std::{future::Future, pin::Pin, sync::Arc};

use ai_llm_service::{ChatMessage, ChatStream, LlmServiceProfiles, RerankHit};
use futures::StreamExt;

use crate::error::ContextorError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ContextorError>> + Send + 'a>>;

/// Fragments of a streamed completion; an `Err` ends the stream.
pub type FragmentStream = futures::stream::BoxStream<'static, Result<String, ContextorError>>;

/// Chat/completion service.
pub trait ChatModel: Send + Sync {
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, String>;

    /// Issues a fresh upstream request on every call.
    fn complete_stream<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, FragmentStream>;
}

/// Rerank service: scores `candidates` against `query`.
///
/// Returned indices point into `candidates`, best first.
pub trait Reranker: Send + Sync {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [String],
        top_n: usize,
    ) -> BoxFuture<'a, Vec<RerankHit>>;
}

/// Which chat profile a [`ProfileChat`] talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatTier {
    /// Decomposition.
    Fast,
    /// Synthesis.
    Slow,
}

/// [`ChatModel`] over one tier of [`LlmServiceProfiles`].
#[derive(Clone)]
pub struct ProfileChat {
    svc: Arc<LlmServiceProfiles>,
    tier: ChatTier,
}

impl ProfileChat {
    pub fn new(svc: Arc<LlmServiceProfiles>, tier: ChatTier) -> Self {
        Self { svc, tier }
    }
}

impl ChatModel for ProfileChat {
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let res = match self.tier {
                ChatTier::Fast => self.svc.chat_fast(messages).await,
                ChatTier::Slow => self.svc.chat_slow(messages).await,
            };
            res.map_err(|e| ContextorError::Synthesis(e.to_string()))
        })
    }

    fn complete_stream<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, FragmentStream> {
        Box::pin(async move {
            // Only the synthesis tier streams upstream; the fast tier answers in one piece.
            let upstream: ChatStream = match self.tier {
                ChatTier::Slow => self
                    .svc
                    .chat_slow_stream(messages)
                    .await
                    .map_err(|e| ContextorError::Synthesis(e.to_string()))?,
                ChatTier::Fast => {
                    let text = self
                        .svc
                        .chat_fast(messages)
                        .await
                        .map_err(|e| ContextorError::Synthesis(e.to_string()))?;
                    futures::stream::once(async move { Ok(text) }).boxed()
                }
            };
            Ok(upstream
                .map(|r| r.map_err(|e| ContextorError::Synthesis(e.to_string())))
                .boxed())
        })
    }
}

/// [`Reranker`] over the rerank profile.
#[derive(Clone)]
pub struct ProfileReranker {
    svc: Arc<LlmServiceProfiles>,
}

impl ProfileReranker {
    pub fn new(svc: Arc<LlmServiceProfiles>) -> Self {
        Self { svc }
    }
}

impl Reranker for ProfileReranker {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [String],
        top_n: usize,
    ) -> BoxFuture<'a, Vec<RerankHit>> {
        Box::pin(async move {
            self.svc
                .rerank(query, candidates, top_n)
                .await
                .map_err(|e| ContextorError::Rerank(e.to_string()))
        })
    }
}
