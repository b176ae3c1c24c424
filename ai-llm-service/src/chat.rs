//! Provider-neutral chat message types.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error_handler::AiLlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message of a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Incremental completion: a finite sequence of text fragments.
///
/// Each call to a `*_stream` method issues a fresh upstream request; the
/// stream itself is not restartable.
pub type ChatStream = BoxStream<'static, Result<String, AiLlmError>>;

/// One entry of a rerank answer: position in the submitted candidate list and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    pub relevance_score: f32,
}
