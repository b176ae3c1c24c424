//! Health probes for model backends (Ollama, OpenAI-compatible).
//!
//! - Ollama: `GET {endpoint}/api/tags` (best-effort model existence check)
//! - OpenAI: `GET {endpoint}/v1/models` with Bearer auth (best-effort model existence check)
//!
//! The returned [`HealthStatus`] is JSON-serializable and suitable for a `/health` endpoint.
//! [`HealthService::check`] never fails: errors are mapped to `ok=false`.

use std::time::{Duration, Instant};

use futures::future::join_all;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, HealthError, HttpError, make_snippet},
    services::v1_url,
};

/// A serializable health snapshot for a single profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    /// Backend/provider (e.g., "Ollama", "OpenAI").
    pub provider: String,
    /// Target endpoint base URL.
    pub endpoint: String,
    /// Model identifier the probe looked for.
    pub model: String,
    /// Overall health flag.
    pub ok: bool,
    /// Measured HTTP latency in milliseconds for the probe.
    pub latency_ms: u128,
    /// Short human-readable message with details.
    pub message: String,
}

impl HealthStatus {
    fn new(cfg: &LlmModelConfig, ok: bool, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.provider.to_string(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

/// A health checker that reuses a single HTTP client.
pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    /// Creates a new health service with an optional client timeout (seconds, default 10).
    ///
    /// # Errors
    /// Returns [`AiLlmError::HttpTransport`] if the HTTP client cannot be built.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Checks one profile. Never fails.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        if let Err(e) = cfg.validate() {
            warn!(provider = %cfg.provider, endpoint = %cfg.endpoint, error = %e, "invalid profile");
            return HealthStatus::new(cfg, false, 0, e.to_string());
        }

        let start = Instant::now();
        let result = match cfg.provider {
            LlmProvider::Ollama => self.probe_ollama(cfg).await,
            LlmProvider::OpenAI => self.probe_openai(cfg).await,
        };
        let latency = start.elapsed().as_millis();

        let status = match result {
            Ok((ok, message)) => HealthStatus::new(cfg, ok, latency, message),
            Err(err) => HealthStatus::new(cfg, false, latency, err.to_string()),
        };
        if status.ok {
            info!(provider = %status.provider, model = %status.model, latency_ms = latency, "health probe ok");
        } else {
            warn!(
                provider = %status.provider,
                model = %status.model,
                latency_ms = latency,
                message = %status.message,
                "health probe failed"
            );
        }
        status
    }

    /// Checks several profiles concurrently, preserving input order.
    pub async fn check_many(&self, configs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        debug!(count = configs.len(), "running batch health probes");
        join_all(configs.iter().map(|cfg| self.check(cfg))).await
    }

    fn timeout_for(&self, cfg: &LlmModelConfig) -> Duration {
        cfg.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    async fn probe_ollama(&self, cfg: &LlmModelConfig) -> Result<(bool, String), AiLlmError> {
        let url = format!("{}/api/tags", cfg.base_url());
        let timeout = self.timeout_for(cfg);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AiLlmError::from_transport(e, timeout))?;
        let resp = ensure_probe_success(resp, url).await?;

        #[derive(Deserialize)]
        struct Tag {
            name: String,
        }
        #[derive(Deserialize)]
        struct Tags {
            models: Option<Vec<Tag>>,
        }

        let tags: Tags = resp
            .json()
            .await
            .map_err(|e| HealthError::Decode(format!("failed to decode /api/tags: {e}")))?;
        Ok(match tags.models {
            Some(models) if models.iter().any(|m| m.name == cfg.model) => {
                (true, "Ollama is healthy; model is available".into())
            }
            Some(_) => (false, "Ollama is up, but model not found in /api/tags".into()),
            None => (true, "Ollama is reachable; tags response without `models`".into()),
        })
    }

    async fn probe_openai(&self, cfg: &LlmModelConfig) -> Result<(bool, String), AiLlmError> {
        let url = v1_url(cfg.base_url(), "models");
        let timeout = self.timeout_for(cfg);
        let api_key = cfg
            .api_key
            .as_deref()
            .ok_or_else(|| HealthError::Decode("missing API key".into()))?;
        let auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| HealthError::Decode(format!("invalid API key header: {e}")))?;
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .timeout(timeout)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| AiLlmError::from_transport(e, timeout))?;
        let resp = ensure_probe_success(resp, url).await?;

        #[derive(Deserialize)]
        struct ModelItem {
            id: String,
        }
        #[derive(Deserialize)]
        struct Models {
            data: Vec<ModelItem>,
        }

        // Some gateways list models in a different shape; reachability is enough then.
        match resp.json::<Models>().await {
            Ok(models) if models.data.iter().any(|m| m.id == cfg.model) => {
                Ok((true, "endpoint is healthy; model is available".into()))
            }
            Ok(_) => Ok((false, "endpoint is up, but model not found in /v1/models".into())),
            Err(e) => Ok((true, format!("endpoint is reachable; failed to decode /v1/models: {e}"))),
        }
    }
}

async fn ensure_probe_success(
    resp: reqwest::Response,
    url: String,
) -> Result<reqwest::Response, AiLlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    Err(HealthError::HttpStatus(HttpError {
        status,
        url,
        snippet: make_snippet(&text),
    })
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_profile_reports_not_ok_without_network() {
        let svc = HealthService::new(Some(1)).unwrap();
        let cfg = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "m".into(),
            endpoint: "localhost:11434".into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            dimensions: None,
            timeout_secs: None,
        };
        let status = svc.check(&cfg).await;
        assert!(!status.ok);
        assert_eq!(status.latency_ms, 0);
        assert_eq!(status.provider, "Ollama");
    }
}
