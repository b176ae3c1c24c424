//! Default model profiles loaded strictly from environment variables.
//!
//! Four roles are resolved here:
//!
//! - **Fast**      → query decomposition (short, cheap completions)
//! - **Slow**      → answer synthesis (long, high-quality completions)
//! - **Embedding** → batched embedding generator
//! - **Rerank**    → relevance reranker
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND`          = provider kind for chat/embedding (`openai` | `ollama`, default `openai`)
//! - `LLM_MAX_TOKENS`    = optional max tokens for the slow profile (u32)
//! - `LLM_TIMEOUT_SECS`  = chat timeout (default 120)
//!
//! OpenAI-compatible:
//! - `LLM_API_URL` = base URL, e.g. `https://api.siliconflow.cn` (mandatory)
//! - `LLM_API_KEY` = bearer token (mandatory)
//!
//! Ollama:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (mandatory)
//!
//! Models:
//! - `FAST_MODEL`, `CHAT_MODEL`, `EMBEDDING_MODEL`, `RERANK_MODEL` (mandatory)
//! - `EMBEDDING_DIM` (default 768), `EMBEDDING_TIMEOUT_SECS` (default 30)
//! - `RERANK_URL`, `RERANK_API_KEY` (default to `LLM_API_URL` / `LLM_API_KEY`),
//!   `RERANK_TIMEOUT_SECS` (default 30)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt_u32, env_opt_u64, must_env, validate_http_endpoint,
    },
};

/// Default embedding dimensionality when `EMBEDDING_DIM` is unset.
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Reads `LLM_KIND` (defaults to OpenAI-compatible).
///
/// # Errors
/// [`ConfigError::UnsupportedProvider`] for unknown kinds.
pub fn llm_kind() -> Result<LlmProvider, AiLlmError> {
    match std::env::var("LLM_KIND") {
        Ok(v) if !v.trim().is_empty() => Ok(v.parse::<LlmProvider>()?),
        _ => Ok(LlmProvider::OpenAI),
    }
}

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        if !url.trim().is_empty() {
            validate_http_endpoint("OLLAMA_URL", url.trim())?;
            return Ok(url);
        }
    }
    if let Ok(port) = std::env::var("OLLAMA_PORT") {
        if !port.trim().is_empty() {
            let _ = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "OLLAMA_PORT",
                    reason: "expected u16 (1..=65535)",
                })?;
            return Ok(format!("http://localhost:{}", port.trim()));
        }
    }
    Err(AiLlmError::Config(ConfigError::MissingVar(
        "OLLAMA_URL or OLLAMA_PORT",
    )))
}

/// Endpoint and key for the selected provider.
fn provider_access(provider: LlmProvider) -> Result<(String, Option<String>), AiLlmError> {
    match provider {
        LlmProvider::Ollama => Ok((ollama_endpoint()?, None)),
        LlmProvider::OpenAI => {
            let url = must_env("LLM_API_URL")?;
            validate_http_endpoint("LLM_API_URL", url.trim())?;
            let key = must_env("LLM_API_KEY")?;
            Ok((url, Some(key)))
        }
    }
}

/// Profile used to split a question into sub-questions.
///
/// # Env
/// - `FAST_MODEL` (required)
///
/// # Defaults
/// - `temperature = Some(0.7)`, `max_tokens = Some(1000)`
pub fn config_fast() -> Result<LlmModelConfig, AiLlmError> {
    let provider = llm_kind()?;
    let (endpoint, api_key) = provider_access(provider)?;

    Ok(LlmModelConfig {
        provider,
        model: must_env("FAST_MODEL")?,
        endpoint,
        api_key,
        max_tokens: Some(1000),
        temperature: Some(0.7),
        top_p: None,
        dimensions: None,
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(120)),
    })
}

/// Profile used for the final answer.
///
/// # Env
/// - `CHAT_MODEL` (required), `LLM_MAX_TOKENS` (optional)
///
/// # Defaults
/// - `temperature = Some(0.6)`
pub fn config_slow() -> Result<LlmModelConfig, AiLlmError> {
    let provider = llm_kind()?;
    let (endpoint, api_key) = provider_access(provider)?;

    Ok(LlmModelConfig {
        provider,
        model: must_env("CHAT_MODEL")?,
        endpoint,
        api_key,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(0.6),
        top_p: None,
        dimensions: None,
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(120)),
    })
}

/// Profile for the embedding generator.
///
/// # Env
/// - `EMBEDDING_MODEL` (required), `EMBEDDING_DIM` (optional)
pub fn config_embedding() -> Result<LlmModelConfig, AiLlmError> {
    let provider = llm_kind()?;
    let (endpoint, api_key) = provider_access(provider)?;
    let dimensions = env_opt_u32("EMBEDDING_DIM")?
        .map(|d| d as usize)
        .unwrap_or(DEFAULT_EMBEDDING_DIM);

    Ok(LlmModelConfig {
        provider,
        model: must_env("EMBEDDING_MODEL")?,
        endpoint,
        api_key,
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        dimensions: Some(dimensions),
        timeout_secs: Some(env_opt_u64("EMBEDDING_TIMEOUT_SECS")?.unwrap_or(30)),
    })
}

/// Profile for the rerank service.
///
/// Rerank is always spoken over the OpenAI-style `/v1/rerank` protocol.
///
/// # Env
/// - `RERANK_MODEL` (required)
/// - `RERANK_URL` / `RERANK_API_KEY` (fallback to `LLM_API_URL` / `LLM_API_KEY`)
pub fn config_rerank() -> Result<LlmModelConfig, AiLlmError> {
    let endpoint = match std::env::var("RERANK_URL") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => must_env("LLM_API_URL")?,
    };
    validate_http_endpoint("RERANK_URL", endpoint.trim())?;
    let api_key = std::env::var("RERANK_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var("LLM_API_KEY").ok())
        .filter(|s| !s.trim().is_empty());

    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model: must_env("RERANK_MODEL")?,
        endpoint,
        api_key,
        max_tokens: None,
        temperature: None,
        top_p: None,
        dimensions: None,
        timeout_secs: Some(env_opt_u64("RERANK_TIMEOUT_SECS")?.unwrap_or(30)),
    })
}
