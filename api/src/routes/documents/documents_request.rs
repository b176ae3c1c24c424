use rag_store::ChunkInput;
use serde::{Deserialize, Serialize};

/// Query string of `GET /api/documents`.
#[derive(Debug, Default, Deserialize)]
pub struct ListDocumentsParams {
    #[serde(default)]
    pub only_blocked: Option<bool>,
}

/// Body of `POST /api/documents`: a document already split into chunks.
#[derive(Debug, Deserialize)]
pub struct InsertDocumentRequest {
    pub document_id: String,
    pub chunks: Vec<ChunkInput>,
}

/// Body of `PUT /api/documents/{document_id}/blocked`.
#[derive(Debug, Deserialize)]
pub struct SetBlockedRequest {
    pub blocked: bool,
}

#[derive(Debug, Serialize)]
pub struct BlockedResponse {
    pub document_id: String,
    pub blocked: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub document_id: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub collection: String,
    pub cleared: bool,
}
