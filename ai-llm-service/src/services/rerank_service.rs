//! Client for a hosted rerank endpoint (`POST {endpoint}/v1/rerank`).
//!
//! Request shape follows the widely used Jina/SiliconFlow/Cohere form:
//! `{ model, query, documents, top_n, return_documents: false }`, answer
//! `{ results: [{ index, relevance_score }] }`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    chat::RerankHit,
    config::llm_model_config::LlmModelConfig,
    error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind},
    services::{check_endpoint, ensure_success, v1_url},
};

#[derive(Debug)]
pub struct RerankService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    timeout: Duration,
    url_rerank: String,
}

impl RerankService {
    /// # Errors
    /// `MissingApiKey`, `InvalidEndpoint` or a client build failure.
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        check_endpoint(Provider::Rerank, &cfg.endpoint)?;
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::new(Provider::Rerank, ProviderErrorKind::MissingApiKey))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                ProviderError::new(
                    Provider::Rerank,
                    ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
                )
            })?,
        );

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(30));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        let url_rerank = v1_url(cfg.base_url(), "rerank");

        info!(model = %cfg.model, url = %url_rerank, "RerankService initialized");

        Ok(Self {
            client,
            cfg,
            timeout,
            url_rerank,
        })
    }

    pub fn config(&self) -> &LlmModelConfig {
        &self.cfg
    }

    /// Scores `documents` against `query`, returning at most `top_n` hits.
    ///
    /// Hits are returned as the server sent them; callers decide about
    /// ordering and index validation.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, AiLlmError> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let body = RerankRequest {
            model: &self.cfg.model,
            query,
            documents,
            top_n,
            return_documents: false,
        };

        debug!(candidates = documents.len(), top_n, "POST {}", self.url_rerank);
        let resp = self
            .client
            .post(&self.url_rerank)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiLlmError::from_transport(e, self.timeout))?;
        let resp = ensure_success(Provider::Rerank, resp).await?;

        let out: RerankResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Rerank,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; expected `results[].{{index, relevance_score}}`"
                )),
            )
        })?;

        info!(
            hits = out.results.len(),
            latency_ms = started.elapsed().as_millis(),
            "rerank completed"
        );
        Ok(out.results)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
    return_documents: bool,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_results_and_ignores_extra_fields() {
        let raw = r#"{"id":"x","results":[{"index":2,"relevance_score":0.91,"document":null},{"index":0,"relevance_score":0.12}],"meta":{}}"#;
        let out: RerankResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].index, 2);
        assert!((out.results[1].relevance_score - 0.12).abs() < 1e-6);
    }
}
