use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use contextor::ContextorError;
use rag_store::RagError;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::http::response_envelope::ApiResponse;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error("configuration error: {0}")]
    Config(String),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / routing ---
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Rich HTTP error mapped from lower layers with specific status & code.
    #[error("{message}")]
    Http {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Http { status, .. } => *status,
            AppError::Config(_) | AppError::Bind(_) | AppError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Http { code, .. } => code,
        }
    }

    fn http(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        AppError::Http {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), error = %self, "request failed");
        } else {
            warn!(code = self.error_code(), error = %self, "request rejected");
        }
        ApiResponse::<()>::failure(self.error_code(), self.to_string())
            .into_response_with_status(status)
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(err: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let msg = err.to_string();
        match err {
            RagError::Config(_) | RagError::Parse(_) | RagError::InvalidPredicate(_) => {
                AppError::BadRequest(msg)
            }
            RagError::CollectionMissing(_) => {
                AppError::http(StatusCode::NOT_FOUND, "COLLECTION_MISSING", msg)
            }
            RagError::Embedding(_) => {
                AppError::http(StatusCode::BAD_GATEWAY, "EMBEDDING_FAILED", msg)
            }
            RagError::VectorSizeMismatch { .. } => {
                AppError::http(StatusCode::INTERNAL_SERVER_ERROR, "VECTOR_SIZE_MISMATCH", msg)
            }
            RagError::Qdrant(_) => AppError::http(StatusCode::BAD_GATEWAY, "VECTOR_STORE_ERROR", msg),
            RagError::Io(_) => AppError::http(StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", msg),
        }
    }
}

impl From<ContextorError> for AppError {
    fn from(err: ContextorError) -> Self {
        let msg = err.to_string();
        match err {
            ContextorError::Rag(e) => e.into(),
            ContextorError::Config(_) => AppError::BadRequest(msg),
            ContextorError::Embedding(_) => {
                AppError::http(StatusCode::BAD_GATEWAY, "EMBEDDING_FAILED", msg)
            }
            ContextorError::Search(_) => AppError::http(StatusCode::BAD_GATEWAY, "SEARCH_FAILED", msg),
            ContextorError::Rerank(_)
            | ContextorError::DecompositionParse(_)
            | ContextorError::Synthesis(_) => {
                AppError::http(StatusCode::BAD_GATEWAY, "MODEL_ERROR", msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let e: AppError = RagError::CollectionMissing("rag_docs".into()).into();
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(e.error_code(), "COLLECTION_MISSING");

        let e: AppError = RagError::Config("document_id is empty".into()).into();
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn pipeline_errors_map_to_statuses() {
        let e: AppError = ContextorError::Embedding("down".into()).into();
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        let e: AppError = ContextorError::Rag(RagError::Qdrant("timeout".into())).into();
        assert_eq!(e.error_code(), "VECTOR_STORE_ERROR");

        let e: AppError = ContextorError::Search("all 3 sub-query searches failed".into()).into();
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(e.error_code(), "SEARCH_FAILED");
    }
}
