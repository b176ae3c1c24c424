//! Answer synthesis, full and streaming. Never fails: completion errors
//! turn into a fixed fallback answer.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api_types::{Language, Reference, SubQuery};
use crate::llm::ChatModel;
use crate::prompt::build_messages;

pub const SYNTHESIS_FAILED: &str = "Failed to generate answer due to an error.";
pub const NO_ANSWER: &str = "No answer generated.";

const FRAGMENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AnswerSynthesizer {
    chat: Arc<dyn ChatModel>,
}

impl AnswerSynthesizer {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// One completion call over all sub-questions and references.
    pub async fn synthesize(
        &self,
        subs: &[SubQuery],
        references: &[Reference],
        language: Language,
    ) -> String {
        let messages = build_messages(subs, references, language);
        match self.chat.complete(&messages).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("completion returned no text");
                NO_ANSWER.to_string()
            }
            Ok(text) => {
                info!(chars = text.len(), "answer synthesized");
                text
            }
            Err(e) => {
                error!(error = %e, "answer synthesis failed");
                SYNTHESIS_FAILED.to_string()
            }
        }
    }

    /// Streams the answer as it is generated.
    ///
    /// The upstream request runs on its own task and feeds a bounded channel,
    /// so the caller only ever awaits the next fragment. If the caller drops
    /// the stream, the task still drains the upstream response to the end.
    /// A failure before or during streaming yields the fallback text as the
    /// final fragment.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn synthesize_stream(
        &self,
        subs: &[SubQuery],
        references: &[Reference],
        language: Language,
    ) -> BoxStream<'static, String> {
        let messages = build_messages(subs, references, language);
        let chat = self.chat.clone();
        let (tx, rx) = mpsc::channel::<String>(FRAGMENT_BUFFER);

        tokio::spawn(async move {
            let mut upstream = match chat.complete_stream(&messages).await {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "streaming synthesis failed to start");
                    let _ = tx.send(SYNTHESIS_FAILED.to_string()).await;
                    return;
                }
            };

            let mut forwarded = 0usize;
            let mut caller_gone = false;
            while let Some(item) = upstream.next().await {
                let fragment = match item {
                    Ok(f) => f,
                    Err(e) => {
                        error!(error = %e, forwarded, "streaming synthesis failed mid-answer");
                        if !caller_gone {
                            let _ = tx.send(SYNTHESIS_FAILED.to_string()).await;
                        }
                        return;
                    }
                };
                if fragment.is_empty() || caller_gone {
                    continue;
                }
                if tx.send(fragment).await.is_err() {
                    debug!(forwarded, "caller dropped the answer stream; draining upstream");
                    caller_gone = true;
                } else {
                    forwarded += 1;
                }
            }

            if forwarded == 0 && !caller_gone {
                warn!("streamed completion produced no text");
                let _ = tx.send(NO_ANSWER.to_string()).await;
            }
            info!(fragments = forwarded, "answer stream finished");
        });

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|f| (f, rx)) }).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextorError;
    use crate::llm::{BoxFuture, FragmentStream};
    use ai_llm_service::ChatMessage;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replays scripted fragments; `None` in the script is a mid-stream error.
    struct ScriptedChat {
        full: Result<String, ()>,
        fragments: Vec<Option<&'static str>>,
        fail_start: bool,
        pulled: Arc<AtomicUsize>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedChat {
        fn streaming(fragments: Vec<Option<&'static str>>) -> Self {
            Self {
                full: Ok(String::new()),
                fragments,
                fail_start: false,
                pulled: Arc::new(AtomicUsize::new(0)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatModel for ScriptedChat {
        fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> BoxFuture<'a, String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let out = self
                .full
                .clone()
                .map_err(|_| ContextorError::Synthesis("model offline".into()));
            Box::pin(async move { out })
        }

        fn complete_stream<'a>(&'a self, _messages: &'a [ChatMessage]) -> BoxFuture<'a, FragmentStream> {
            let fail_start = self.fail_start;
            let pulled = self.pulled.clone();
            let items: Vec<Result<String, ContextorError>> = self
                .fragments
                .iter()
                .map(|f| match f {
                    Some(s) => Ok(s.to_string()),
                    None => Err(ContextorError::Synthesis("connection reset".into())),
                })
                .collect();
            Box::pin(async move {
                if fail_start {
                    return Err(ContextorError::Synthesis("refused".into()));
                }
                Ok(stream::iter(items)
                    .then(move |item| {
                        let pulled = pulled.clone();
                        async move {
                            tokio::time::sleep(Duration::from_millis(2)).await;
                            pulled.fetch_add(1, Ordering::SeqCst);
                            item
                        }
                    })
                    .boxed())
            })
        }
    }

    fn subs() -> Vec<SubQuery> {
        vec![SubQuery { text: "What is X?".into(), ordinal: 0 }]
    }

    #[tokio::test]
    async fn full_answer_is_returned() {
        let chat = Arc::new(ScriptedChat {
            full: Ok("X is a thing.".into()),
            ..ScriptedChat::streaming(vec![])
        });
        let s = AnswerSynthesizer::new(chat.clone());
        assert_eq!(s.synthesize(&subs(), &[], Language::English).await, "X is a thing.");
        let seen = chat.seen.lock().unwrap();
        assert!(seen[0][0].content.contains("Use English"));
    }

    #[tokio::test]
    async fn failures_become_the_fallback_string() {
        let chat = Arc::new(ScriptedChat {
            full: Err(()),
            ..ScriptedChat::streaming(vec![])
        });
        let s = AnswerSynthesizer::new(chat);
        assert_eq!(s.synthesize(&subs(), &[], Language::Chinese).await, SYNTHESIS_FAILED);
    }

    #[tokio::test]
    async fn blank_answer_becomes_no_answer() {
        let chat = Arc::new(ScriptedChat {
            full: Ok("  ".into()),
            ..ScriptedChat::streaming(vec![])
        });
        let s = AnswerSynthesizer::new(chat);
        assert_eq!(s.synthesize(&subs(), &[], Language::Chinese).await, NO_ANSWER);
    }

    #[tokio::test]
    async fn stream_forwards_fragments_in_order() {
        let chat = Arc::new(ScriptedChat::streaming(vec![Some("X "), Some(""), Some("is "), Some("a thing.")]));
        let s = AnswerSynthesizer::new(chat);
        let got: Vec<String> = s.synthesize_stream(&subs(), &[], Language::English).collect().await;
        assert_eq!(got, vec!["X ", "is ", "a thing."]);
    }

    #[tokio::test]
    async fn mid_stream_error_ends_with_fallback() {
        let chat = Arc::new(ScriptedChat::streaming(vec![Some("partial "), None, Some("never")]));
        let s = AnswerSynthesizer::new(chat);
        let got: Vec<String> = s.synthesize_stream(&subs(), &[], Language::English).collect().await;
        assert_eq!(got, vec!["partial ".to_string(), SYNTHESIS_FAILED.to_string()]);
    }

    #[tokio::test]
    async fn start_failure_yields_only_fallback() {
        let chat = Arc::new(ScriptedChat {
            fail_start: true,
            ..ScriptedChat::streaming(vec![Some("unused")])
        });
        let s = AnswerSynthesizer::new(chat);
        let got: Vec<String> = s.synthesize_stream(&subs(), &[], Language::English).collect().await;
        assert_eq!(got, vec![SYNTHESIS_FAILED.to_string()]);
    }

    #[tokio::test]
    async fn abandoned_stream_is_drained_in_background() {
        let chat = Arc::new(ScriptedChat::streaming(vec![Some("a"), Some("b"), Some("c"), Some("d")]));
        let pulled = chat.pulled.clone();
        let s = AnswerSynthesizer::new(chat);

        let mut stream = s.synthesize_stream(&subs(), &[], Language::English);
        assert_eq!(stream.next().await.as_deref(), Some("a"));
        drop(stream);

        for _ in 0..100 {
            if pulled.load(Ordering::SeqCst) == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(pulled.load(Ordering::SeqCst), 4);
    }
}
