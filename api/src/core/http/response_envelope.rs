//! JSON body of every `/api` answer and of `/health`.
//!
//! Success: `{"success": true, "data": ...}` where `data` is a document list,
//! store stats, an insert report or a `{answer, sub_queries, references}` answer.
//! Failure: `{"success": false, "error": {"code", "message", "request_id"?, "details"?}}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Serialize)]
pub struct ApiError {
    /// One of `BAD_REQUEST`, `NOT_FOUND`, `COLLECTION_MISSING`, `EMBEDDING_FAILED`,
    /// `SEARCH_FAILED`, `VECTOR_STORE_ERROR`, `MODEL_ERROR`, ...
    pub code: &'static str,
    pub message: String,
    /// Set when the request passed through the rejection mapper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldIssue>,
}

/// A problem with one field of a query or document request body.
#[derive(Serialize)]
pub struct FieldIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl ApiResponse<()> {
    pub fn failure(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
                request_id: None,
                details: Vec::new(),
            }),
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        if let Some(err) = self.error.as_mut() {
            err.request_id = Some(id.into());
        }
        self
    }

    pub fn with_issue(mut self, issue: FieldIssue) -> Self {
        if let Some(err) = self.error.as_mut() {
            if issue.field.is_some() || issue.hint.is_some() {
                err.details.push(issue);
            }
        }
        self
    }
}

/// `200 OK` with `data`.
pub fn ok<T: Serialize>(data: T) -> Response {
    ApiResponse::success(data).into_response_with_status(StatusCode::OK)
}

/// `201 Created` with `data`; used when a document was stored.
pub fn created<T: Serialize>(data: T) -> Response {
    ApiResponse::success(data).into_response_with_status(StatusCode::CREATED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_only_data() {
        let v = serde_json::to_value(ApiResponse::success(vec!["manual.pdf"])).unwrap();
        assert_eq!(v, serde_json::json!({ "success": true, "data": ["manual.pdf"] }));
    }

    #[test]
    fn failure_lists_field_issues_and_request_id() {
        let v = serde_json::to_value(
            ApiResponse::<()>::failure("BAD_REQUEST", "active_documents must not be empty")
                .with_request_id("req-1")
                .with_issue(FieldIssue {
                    field: Some("active_documents".into()),
                    hint: None,
                })
                .with_issue(FieldIssue {
                    field: None,
                    hint: None,
                }),
        )
        .unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "success": false,
                "error": {
                    "code": "BAD_REQUEST",
                    "message": "active_documents must not be empty",
                    "request_id": "req-1",
                    "details": [{ "field": "active_documents" }]
                }
            })
        );
    }

    #[test]
    fn created_answers_201() {
        assert_eq!(created(1).status(), StatusCode::CREATED);
    }
}
