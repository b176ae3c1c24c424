//! Document administration: list, stats, insert, block/unblock, delete, clear.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use tracing::{info, instrument};

use crate::{
    core::{
        app_state::AppState,
        http::response_envelope::{created, ok},
    },
    error_handler::{AppError, AppResult},
    routes::documents::documents_request::{
        BlockedResponse, ClearedResponse, DeletedResponse, InsertDocumentRequest,
        ListDocumentsParams, SetBlockedRequest,
    },
};

/// GET /api/documents[?only_blocked=bool]
pub async fn list_documents_route(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDocumentsParams>,
) -> AppResult<Response> {
    let docs = state.store.list_documents(params.only_blocked).await?;
    Ok(ok(docs))
}

/// GET /api/documents/stats
pub async fn document_stats_route(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    Ok(ok(state.store.stats().await?))
}

/// POST /api/documents
#[instrument(name = "insert_document_route", skip_all, fields(document_id = %body.document_id, chunks = body.chunks.len()))]
pub async fn insert_document_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InsertDocumentRequest>,
) -> AppResult<Response> {
    if body.document_id.trim().is_empty() {
        return Err(AppError::BadRequest("document_id must not be empty".into()));
    }
    let report = state
        .store
        .insert_document(&body.document_id, &body.chunks)
        .await?;
    info!(stored = report.chunks_stored, "document inserted via api");
    Ok(created(report))
}

/// PUT /api/documents/{document_id}/blocked
pub async fn set_blocked_route(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Json(body): Json<SetBlockedRequest>,
) -> AppResult<Response> {
    state.store.set_blocked(&document_id, body.blocked).await?;
    Ok(ok(BlockedResponse {
        document_id,
        blocked: body.blocked,
    }))
}

/// DELETE /api/documents/{document_id}
pub async fn delete_document_route(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> AppResult<Response> {
    state.store.delete_document(&document_id).await?;
    Ok(ok(DeletedResponse {
        document_id,
        deleted: true,
    }))
}

/// DELETE /api/clear
pub async fn clear_route(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    state.store.clear().await?;
    Ok(ok(ClearedResponse {
        collection: state.store.collection().to_string(),
        cleared: true,
    }))
}
