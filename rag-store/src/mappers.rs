//! Mapping of normalized chunks into Qdrant points.

use std::collections::HashMap;

use qdrant_client::qdrant::{PointStruct, Value as QValue};
use uuid::Uuid;

use crate::record::fields;

/// A chunk ready for upsert: text already normalized, vector already computed.
#[derive(Clone, Debug)]
pub struct PreparedChunk {
    /// Position among the stored chunks of the document.
    pub ordinal: usize,
    pub text: String,
    pub page: i64,
}

/// Deterministic point id: UUIDv5 over `document_id#ordinal`.
///
/// Re-inserting a document reuses the ids of its previous chunks.
pub fn point_id(document_id: &str, ordinal: usize) -> String {
    let key = format!("{document_id}#{ordinal}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Builds the stored payload of a chunk. New chunks start unblocked.
pub fn chunk_payload(document_id: &str, chunk: &PreparedChunk) -> HashMap<String, QValue> {
    let mut payload = HashMap::with_capacity(4);
    payload.insert(fields::TEXT.to_string(), QValue::from(chunk.text.clone()));
    payload.insert(
        fields::DOCUMENT_ID.to_string(),
        QValue::from(document_id.to_string()),
    );
    payload.insert(fields::PAGE.to_string(), QValue::from(chunk.page));
    payload.insert(fields::BLOCKED.to_string(), QValue::from(false));
    payload
}

pub fn to_point(document_id: &str, chunk: &PreparedChunk, vector: Vec<f32>) -> PointStruct {
    PointStruct::new(
        point_id(document_id, chunk.ordinal),
        vector,
        chunk_payload(document_id, chunk),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_and_distinct() {
        assert_eq!(point_id("manual.pdf", 0), point_id("manual.pdf", 0));
        assert_ne!(point_id("manual.pdf", 0), point_id("manual.pdf", 1));
        assert_ne!(point_id("manual.pdf", 0), point_id("guide.pdf", 0));
        assert!(Uuid::parse_str(&point_id("manual.pdf", 3)).is_ok());
    }

    #[test]
    fn payload_carries_document_fields() {
        let chunk = PreparedChunk {
            ordinal: 2,
            text: "body".into(),
            page: 9,
        };
        let p = chunk_payload("guide.pdf", &chunk);
        assert_eq!(p.len(), 4);
        assert_eq!(p[fields::PAGE], QValue::from(9_i64));
        assert_eq!(p[fields::BLOCKED], QValue::from(false));
        assert_eq!(p[fields::DOCUMENT_ID], QValue::from("guide.pdf".to_string()));
    }
}
