//! GET /health: model providers and vector store reachability.

use std::sync::Arc;

use ai_llm_service::HealthStatus;
use axum::{extract::State, http::StatusCode, response::Response};
use serde::Serialize;
use tracing::warn;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct VectorStoreHealth {
    pub collection: String,
    pub reachable: bool,
    pub collection_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub providers: Vec<HealthStatus>,
    pub vector_store: VectorStoreHealth,
}

/// Always answers with a report; `503` when any dependency is down.
pub async fn health_route(State(state): State<Arc<AppState>>) -> Response {
    let (providers, exists) =
        tokio::join!(state.llm.health_all(), state.store.collection_exists());

    let vector_store = match exists {
        Ok(exists) => VectorStoreHealth {
            collection: state.store.collection().to_string(),
            reachable: true,
            collection_exists: exists,
            message: None,
        },
        Err(e) => {
            warn!(error = %e, "vector store health probe failed");
            VectorStoreHealth {
                collection: state.store.collection().to_string(),
                reachable: false,
                collection_exists: false,
                message: Some(e.to_string()),
            }
        }
    };

    let ok = vector_store.reachable && providers.iter().all(|p| p.ok);
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    ApiResponse::success(HealthReport {
        ok,
        providers,
        vector_store,
    })
    .into_response_with_status(status)
}
