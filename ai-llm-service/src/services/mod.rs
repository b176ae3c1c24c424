//! Concrete HTTP clients for the supported providers.

pub mod ollama_service;
pub mod open_ai_service;
pub mod rerank_service;
pub(crate) mod streaming;

use tracing::error;

use crate::error_handler::{
    AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, make_snippet,
};

/// Joins an OpenAI-style path onto a base URL that may or may not already end in `/v1`.
pub(crate) fn v1_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/{path}")
    } else {
        format!("{base}/v1/{path}")
    }
}

/// Validates the endpoint scheme shared by every provider client.
pub(crate) fn check_endpoint(provider: Provider, endpoint: &str) -> Result<(), AiLlmError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::InvalidEndpoint(endpoint.to_string()),
        )
        .into());
    }
    Ok(())
}

/// Turns non-2xx responses into [`ProviderErrorKind::HttpStatus`].
pub(crate) async fn ensure_success(
    provider: Provider,
    resp: reqwest::Response,
) -> Result<reqwest::Response, AiLlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let url = resp.url().to_string();
    let text = resp.text().await.unwrap_or_default();
    let snippet = make_snippet(&text);

    error!(%provider, %status, %url, %snippet, "upstream returned non-success status");

    Err(ProviderError::new(
        provider,
        ProviderErrorKind::HttpStatus(HttpError {
            status,
            url,
            snippet,
        }),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_url_does_not_duplicate_version() {
        assert_eq!(
            v1_url("https://api.siliconflow.cn/v1/", "rerank"),
            "https://api.siliconflow.cn/v1/rerank"
        );
        assert_eq!(
            v1_url("http://localhost:8000", "/chat/completions"),
            "http://localhost:8000/v1/chat/completions"
        );
    }
}
