//! POST /api/query and POST /api/query/stream: answer a question over the
//! selected documents.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{StreamExt, stream};
use tracing::{info, instrument};

use crate::{
    core::{app_state::AppState, http::response_envelope::ok},
    error_handler::AppResult,
    routes::query::query_request::QueryRequest,
};

pub const STREAM_DONE: &str = "[DONE]";

/// Handler: POST /api/query
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8000/api/query \
///   -H 'content-type: application/json' \
///   -d '{"query":"How is the pump primed?","active_documents":["manual.pdf"],"language":"english"}'
/// ```
#[instrument(name = "query_route", skip_all, fields(documents = body.active_documents.len()))]
pub async fn query_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> AppResult<Response> {
    let (question, opts) = body.into_parts()?;
    let qa = state.contextor.ask(&question, opts).await?;
    info!(references = qa.references.len(), "query answered");
    Ok(ok(qa))
}

/// Handler: POST /api/query/stream
///
/// Server-sent events: one `data:` event per answer fragment, then `data: [DONE]`.
/// Retrieval errors are returned as a regular JSON error before the stream starts.
#[instrument(name = "query_stream_route", skip_all, fields(documents = body.active_documents.len()))]
pub async fn query_stream_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> AppResult<Response> {
    let (question, opts) = body.into_parts()?;
    let answer = state.contextor.ask_stream(&question, opts).await?;
    info!(references = answer.references.len(), "streaming answer");

    let events = answer
        .fragments
        .map(|fragment| Ok::<_, Infallible>(Event::default().data(fragment)))
        .chain(stream::once(async {
            Ok::<_, Infallible>(Event::default().data(STREAM_DONE))
        }));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}
