//! Shared model service with four profiles: `fast`, `slow`, `embedding` and `rerank`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Builds HTTP clients eagerly and shares them between profiles with an
//!   identical config (provider + endpoint + model + key + timeout).
//! - If the `slow` profile is not provided, it falls back to `fast`.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ai_llm_service::{chat::ChatMessage, service_profiles::LlmServiceProfiles};
//!
//! # async fn run() -> Result<(), ai_llm_service::error_handler::AiLlmError> {
//! let svc = Arc::new(LlmServiceProfiles::from_env()?);
//!
//! let txt = svc.chat_fast(&[ChatMessage::user("Hello world")]).await?;
//! println!("FAST: {txt}");
//!
//! let emb = svc.embed_batch(&["Ferris".to_string()]).await?;
//! println!("Embedding dim = {}", emb[0].len());
//! # Ok(()) }
//! ```

use std::{collections::HashMap, sync::Arc};

use tracing::info;

use crate::{
    chat::{ChatMessage, ChatStream, RerankHit},
    config::{
        default_config::{config_embedding, config_fast, config_rerank, config_slow},
        llm_model_config::LlmModelConfig,
        llm_provider::LlmProvider,
    },
    error_handler::AiLlmError,
    health_service::{HealthService, HealthStatus},
    services::{
        ollama_service::OllamaService, open_ai_service::OpenAiService,
        rerank_service::RerankService,
    },
};

/// A chat/embedding client for one concrete provider.
#[derive(Debug, Clone)]
enum ProviderClient {
    Ollama(Arc<OllamaService>),
    OpenAi(Arc<OpenAiService>),
}

impl ProviderClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        match self {
            ProviderClient::Ollama(c) => c.chat(messages).await,
            ProviderClient::OpenAi(c) => c.chat(messages).await,
        }
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, AiLlmError> {
        match self {
            ProviderClient::Ollama(c) => c.chat_stream(messages).await,
            ProviderClient::OpenAi(c) => c.chat_stream(messages).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        match self {
            ProviderClient::Ollama(c) => c.embed_batch(texts).await,
            ProviderClient::OpenAi(c) => c.embed_batch(texts).await,
        }
    }
}

/// Shared service that manages the logical model profiles.
pub struct LlmServiceProfiles {
    fast: LlmModelConfig,
    slow: LlmModelConfig,
    embedding: LlmModelConfig,
    rerank: LlmModelConfig,

    fast_client: ProviderClient,
    slow_client: ProviderClient,
    embedding_client: ProviderClient,
    rerank_client: Arc<RerankService>,

    health: HealthService,
}

impl LlmServiceProfiles {
    /// Creates a new service.
    ///
    /// - `fast`: profile for short completions (query decomposition).
    /// - `slow_opt`: profile for the final answer. If `None`, falls back to `fast`.
    /// - `embedding`: embedding profile.
    /// - `rerank`: rerank endpoint profile.
    /// - `health_timeout_secs`: optional timeout for the health checker.
    ///
    /// # Errors
    /// Any profile that fails validation or client construction.
    pub fn new(
        fast: LlmModelConfig,
        slow_opt: Option<LlmModelConfig>,
        embedding: LlmModelConfig,
        rerank: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        let slow = slow_opt.unwrap_or_else(|| fast.clone());
        for cfg in [&fast, &slow, &embedding, &rerank] {
            cfg.validate()?;
        }

        let mut cache: HashMap<ClientKey, ProviderClient> = HashMap::new();
        let fast_client = client_for(&mut cache, &fast)?;
        let slow_client = client_for(&mut cache, &slow)?;
        let embedding_client = client_for(&mut cache, &embedding)?;
        let rerank_client = Arc::new(RerankService::new(rerank.clone())?);

        info!(
            fast = %fast.model,
            slow = %slow.model,
            embedding = %embedding.model,
            rerank = %rerank.model,
            distinct_clients = cache.len(),
            "model profiles ready"
        );

        Ok(Self {
            fast,
            slow,
            embedding,
            rerank,
            fast_client,
            slow_client,
            embedding_client,
            rerank_client,
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Builds all four profiles from environment variables.
    pub fn from_env() -> Result<Self, AiLlmError> {
        Self::new(
            config_fast()?,
            Some(config_slow()?),
            config_embedding()?,
            config_rerank()?,
            None,
        )
    }

    /// Non-streaming completion with the **fast** profile.
    pub async fn chat_fast(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        self.fast_client.chat(messages).await
    }

    /// Non-streaming completion with the **slow** profile.
    pub async fn chat_slow(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        self.slow_client.chat(messages).await
    }

    /// Streaming completion with the **slow** profile.
    pub async fn chat_slow_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ChatStream, AiLlmError> {
        self.slow_client.chat_stream(messages).await
    }

    /// One batched request to the **embedding** profile.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        self.embedding_client.embed_batch(texts).await
    }

    /// Scores candidate texts against a query with the **rerank** profile.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, AiLlmError> {
        self.rerank_client.rerank(query, documents, top_n).await
    }

    /// Configured embedding dimensionality, if any.
    pub fn embedding_dim(&self) -> Option<usize> {
        self.embedding.dimensions
    }

    /// Returns a health snapshot for all distinct profiles.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list: Vec<LlmModelConfig> = Vec::with_capacity(4);
        for cfg in [&self.fast, &self.slow, &self.embedding, &self.rerank] {
            if !list.iter().any(|c| ClientKey::from(c) == ClientKey::from(cfg)) {
                list.push(cfg.clone());
            }
        }
        self.health.check_many(&list).await
    }

    /// Returns references to the current profiles `(fast, slow, embedding, rerank)`.
    pub fn profiles(
        &self,
    ) -> (
        &LlmModelConfig,
        &LlmModelConfig,
        &LlmModelConfig,
        &LlmModelConfig,
    ) {
        (&self.fast, &self.slow, &self.embedding, &self.rerank)
    }
}

fn client_for(
    cache: &mut HashMap<ClientKey, ProviderClient>,
    cfg: &LlmModelConfig,
) -> Result<ProviderClient, AiLlmError> {
    let key = ClientKey::from(cfg);
    if let Some(cli) = cache.get(&key) {
        return Ok(cli.clone());
    }
    let cli = match cfg.provider {
        LlmProvider::Ollama => ProviderClient::Ollama(Arc::new(OllamaService::new(cfg.clone())?)),
        LlmProvider::OpenAI => ProviderClient::OpenAi(Arc::new(OpenAiService::new(cfg.clone())?)),
    };
    cache.insert(key, cli.clone());
    Ok(cli)
}

/// Identity of a client: two profiles with equal keys share one HTTP client.
///
/// Sampling knobs are sent from the client's own config, so they are part of the key.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
    max_tokens: Option<u32>,
    dimensions: Option<usize>,
    sampling: (Option<u32>, Option<u32>),
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.base_url().to_string(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
            max_tokens: cfg.max_tokens,
            dimensions: cfg.dimensions,
            sampling: (
                cfg.temperature.map(f32::to_bits),
                cfg.top_p.map(f32::to_bits),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama(model: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: model.into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            max_tokens: Some(512),
            temperature: Some(0.7),
            top_p: None,
            dimensions: None,
            timeout_secs: Some(30),
        }
    }

    fn rerank() -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "BAAI/bge-reranker-v2-m3".into(),
            endpoint: "https://api.example.com".into(),
            api_key: Some("sk".into()),
            max_tokens: None,
            temperature: None,
            top_p: None,
            dimensions: None,
            timeout_secs: Some(30),
        }
    }

    #[test]
    fn slow_falls_back_to_fast() {
        let svc = LlmServiceProfiles::new(ollama("q"), None, ollama("e"), rerank(), None).unwrap();
        let (fast, slow, _, _) = svc.profiles();
        assert_eq!(fast, slow);
    }

    #[test]
    fn identical_profiles_share_a_client() {
        let mut cache = HashMap::new();
        let a = client_for(&mut cache, &ollama("q")).unwrap();
        let b = client_for(&mut cache, &ollama("q")).unwrap();
        let _c = client_for(&mut cache, &ollama("other")).unwrap();
        assert_eq!(cache.len(), 2);
        match (a, b) {
            (ProviderClient::Ollama(x), ProviderClient::Ollama(y)) => assert!(Arc::ptr_eq(&x, &y)),
            _ => panic!("expected ollama clients"),
        }
    }

    #[test]
    fn invalid_profile_is_rejected() {
        let mut bad = ollama("q");
        bad.temperature = Some(5.0);
        assert!(LlmServiceProfiles::new(bad, None, ollama("e"), rerank(), None).is_err());
    }
}
