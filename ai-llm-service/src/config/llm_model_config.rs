use crate::config::llm_provider::LlmProvider;

/// Configuration for one model profile.
///
/// # Fields
///
/// - `provider`: Which backend serves the model (Ollama or OpenAI-compatible).
/// - `model`: The model identifier (e.g., `"Qwen/Qwen3-Embedding-4B"`).
/// - `endpoint`: Base URL of the inference server, without the `/v1/...` path.
/// - `api_key`: Optional API key for providers that require authentication.
/// - `max_tokens`: Maximum number of tokens to generate (if supported).
/// - `temperature`: Controls randomness (0.0 = deterministic).
/// - `top_p`: Nucleus sampling cutoff.
/// - `dimensions`: Requested embedding size (embedding profiles only).
/// - `timeout_secs`: Request timeout in seconds.
///
/// # Examples
///
/// ```
/// use ai_llm_service::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::OpenAI,
///     model: "moonshotai/Kimi-K2-Instruct".to_string(),
///     endpoint: "https://api.siliconflow.cn".to_string(),
///     api_key: Some("sk-...".to_string()),
///     max_tokens: Some(2048),
///     temperature: Some(0.6),
///     top_p: None,
///     dimensions: None,
///     timeout_secs: Some(120),
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string.
    pub model: String,

    /// Inference endpoint base URL.
    pub endpoint: String,

    /// Optional API key for authentication.
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Requested embedding dimensionality.
    pub dimensions: Option<usize>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Validates the static shape of the profile.
    ///
    /// # Errors
    /// Returns [`crate::error_handler::AiLlmError::Config`] when the model name is
    /// empty, the endpoint is not http(s), or sampling knobs are out of range.
    pub fn validate(&self) -> crate::error_handler::Result<()> {
        use crate::error_handler::{ConfigError, validate_http_endpoint, validate_range_f32};

        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("endpoint", self.endpoint.trim())?;
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        if let Some(p) = self.top_p {
            validate_range_f32("top_p", p, 0.0, 1.0)?;
        }
        Ok(())
    }

    /// Endpoint without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim().trim_end_matches('/')
    }
}
