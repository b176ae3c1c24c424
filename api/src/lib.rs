//! HTTP surface of the document Q&A backend.

use std::{env, sync::Arc};

pub mod core;
pub mod error_handler;
mod middleware_layer;
mod routes;

use axum::{
    Router,
    http::Uri,
    middleware,
    routing::{delete, get, post, put},
};
use tokio::signal;
use tracing::{error, info};

use crate::{
    core::app_state::AppState,
    error_handler::AppError,
    middleware_layer::json_extractor::json_error_mapper,
    routes::{
        documents::documents_route::{
            clear_route, delete_document_route, document_stats_route, insert_document_route,
            list_documents_route, set_blocked_route,
        },
        health_route::health_route,
        query::query_route::{query_route, query_stream_route},
    },
};

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:8000";

/// Builds the router over a ready state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_route))
        .route("/api/query", post(query_route))
        .route("/api/query/stream", post(query_stream_route))
        .route(
            "/api/documents",
            get(list_documents_route).post(insert_document_route),
        )
        .route("/api/documents/stats", get(document_stats_route))
        .route("/api/documents/{document_id}", delete(delete_document_route))
        .route("/api/documents/{document_id}/blocked", put(set_blocked_route))
        .route("/api/clear", delete(clear_route))
        .fallback(not_found)
        .layer(middleware::from_fn(json_error_mapper))
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Starts the server on `API_ADDRESS` (default `0.0.0.0:8000`) and serves until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let state = Arc::new(AppState::from_env()?);
    let address = env::var("API_ADDRESS").unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());
    serve(state, &address).await
}

/// Serves `state` on `address` with graceful shutdown.
pub async fn serve(state: Arc<AppState>, address: &str) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(AppError::Bind)?;
    info!(%address, "api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("api stopped");
    Ok(())
}

/// Resolves on Ctrl+C. A failing signal handler is logged and treated as a shutdown request.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}
