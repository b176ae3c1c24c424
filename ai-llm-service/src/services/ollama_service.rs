//! Lightweight Ollama service for chat and embeddings.
//!
//! This module implements a thin client for the local Ollama API:
//! - `POST {endpoint}/api/chat`: chat (`stream=false`, or NDJSON stream)
//! - `POST {endpoint}/api/embed`: batched embeddings
//!
//! It uses the universal configuration [`LlmModelConfig`] and ensures
//! that the selected provider is [`LlmProvider::Ollama`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    chat::{ChatMessage, ChatStream},
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind},
    services::{
        check_endpoint, ensure_success,
        streaming::{decode_ollama_ndjson, fragment_stream},
    },
};

/// Thin client for Ollama.
///
/// Initialized with a full [`LlmModelConfig`]. Reuses an HTTP client with
/// a configurable timeout.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    timeout: Duration,
    url_chat: String,
    url_embed: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(Provider::Ollama, ProviderErrorKind::InvalidProvider).into(),
            );
        }
        check_endpoint(Provider::Ollama, &cfg.endpoint)?;

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(60));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        let base = cfg.base_url().to_string();
        let url_chat = format!("{base}/api/chat");
        let url_embed = format!("{base}/api/embed");

        info!(model = %cfg.model, endpoint = %cfg.endpoint, "OllamaService initialized");

        Ok(Self {
            client,
            cfg,
            timeout,
            url_chat,
            url_embed,
        })
    }

    pub fn config(&self) -> &LlmModelConfig {
        &self.cfg
    }

    /// Performs a **non-streaming** chat request via `/api/chat`.
    ///
    /// Mapped options:
    /// - `num_predict`  ← `self.cfg.max_tokens`
    /// - `temperature`  ← `self.cfg.temperature`
    /// - `top_p`        ← `self.cfg.top_p`
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = ChatRequest::from_cfg(&self.cfg, messages, false);

        debug!("POST {}", self.url_chat);
        let resp = self
            .client
            .post(&self.url_chat)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiLlmError::from_transport(e, self.timeout))?;
        let resp = ensure_success(Provider::Ollama, resp).await?;

        let out: ChatResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!("serde error: {e}; expected `message.content`")),
            )
        })?;

        info!(latency_ms = started.elapsed().as_millis(), "ollama chat completed");
        Ok(out.message.content)
    }

    /// Starts a streaming chat (`stream=true`, NDJSON answer).
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, AiLlmError> {
        let body = ChatRequest::from_cfg(&self.cfg, messages, true);

        debug!("POST {} (stream)", self.url_chat);
        let resp = self
            .client
            .post(&self.url_chat)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiLlmError::from_transport(e, self.timeout))?;
        let resp = ensure_success(Provider::Ollama, resp).await?;

        Ok(fragment_stream(resp, self.timeout, decode_ollama_ndjson))
    }

    /// Embeds a batch of texts via `/api/embed` (one vector per input, same order).
    #[instrument(skip_all, fields(model = %self.cfg.model, batch = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbedRequest {
            model: &self.cfg.model,
            input: texts,
            dimensions: self.cfg.dimensions,
        };

        debug!("POST {}", self.url_embed);
        let resp = self
            .client
            .post(&self.url_embed)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiLlmError::from_transport(e, self.timeout))?;
        let resp = ensure_success(Provider::Ollama, resp).await?;

        let out: EmbedResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; expected `{{ embeddings: number[][] }}`"
                )),
            )
        })?;

        if out.embeddings.len() != texts.len() {
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::EmbeddingCount {
                    expected: texts.len(),
                    got: out.embeddings.len(),
                },
            )
            .into());
        }
        Ok(out.embeddings)
    }
}

/* ==========================
HTTP payloads & options
========================== */

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

impl<'a> ChatRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, messages: &'a [ChatMessage], stream: bool) -> Self {
        let options = ChatOptions {
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            num_predict: cfg.max_tokens,
        };
        Self {
            model: &cfg.model,
            messages,
            stream,
            options: Some(options),
        }
    }
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_api_urls() {
        let svc = OllamaService::new(LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "qwen3:14b".into(),
            endpoint: "http://localhost:11434/".into(),
            api_key: None,
            max_tokens: Some(256),
            temperature: Some(0.7),
            top_p: None,
            dimensions: None,
            timeout_secs: Some(30),
        })
        .unwrap();
        assert_eq!(svc.url_chat, "http://localhost:11434/api/chat");
        assert_eq!(svc.url_embed, "http://localhost:11434/api/embed");
    }

    #[test]
    fn options_map_max_tokens_to_num_predict() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "m".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            max_tokens: Some(100),
            temperature: None,
            top_p: None,
            dimensions: None,
            timeout_secs: None,
        };
        let msgs = [ChatMessage::user("hi")];
        let body = serde_json::to_value(ChatRequest::from_cfg(&cfg, &msgs, false)).unwrap();
        assert_eq!(body["options"]["num_predict"], 100);
        assert_eq!(body["stream"], false);
    }
}
