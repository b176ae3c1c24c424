//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind a minimal API,
//! hiding away the verbose builder pattern and keeping the rest of the
//! crate decoupled from `qdrant-client`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
    Distance, FieldType, Filter, PointId, PointStruct, ScrollPointsBuilder, SearchParamsBuilder,
    SearchPointsBuilder, SetPayloadPointsBuilder, UpsertPointsBuilder, Value as QValue,
    VectorParamsBuilder, point_id::PointIdOptions,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info, instrument, warn};

use crate::config::{DistanceKind, RagConfig, VectorSpace};
use crate::errors::RagError;
use crate::filters::Predicate;
use crate::index::{ReadyFuture, SearchFuture, VectorIndex};
use crate::record::{DocumentSummary, SearchHit, fields};

const SCROLL_PAGE: u32 = 256;

/// A facade over the Qdrant client.
///
/// Holds the client, the target collection and the distance function used
/// to turn scores into distances.
pub struct QdrantFacade {
    client: Qdrant,
    collection: String,
    distance: DistanceKind,
    exact: bool,
    native_filter: bool,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url)
            .timeout(Duration::from_secs(cfg.qdrant_timeout_secs));
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build()?;

        info!(url = %cfg.qdrant_url, collection = %cfg.collection, "qdrant client ready");
        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            distance: cfg.distance,
            exact: cfg.exact_search,
            native_filter: cfg.native_filter,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn collection_exists(&self) -> Result<bool, RagError> {
        Ok(self.client.collection_exists(&self.collection).await?)
    }

    /// Ensures that the collection exists.
    ///
    /// - If the collection already exists → no-op.
    /// - If missing → creates it with the given vector space and payload
    ///   indexes on `document_id` (keyword) and `blocked` (bool).
    pub async fn ensure_collection(&self, space: &VectorSpace) -> Result<(), RagError> {
        if self.collection_exists().await? {
            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }
        warn!(
            collection = %self.collection,
            size = space.size,
            distance = ?space.distance,
            "collection not found, creating"
        );

        let distance = match space.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        };
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(space.size as u64, distance)),
            )
            .await?;

        for (field, kind) in [
            (fields::DOCUMENT_ID, FieldType::Keyword),
            (fields::BLOCKED, FieldType::Bool),
        ] {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(&self.collection, field, kind).wait(true),
                )
                .await?;
        }

        info!(collection = %self.collection, "collection created");
        Ok(())
    }

    /// Upserts a batch of points, waiting until they are searchable.
    pub async fn upsert_points(&self, points: Vec<PointStruct>) -> Result<usize, RagError> {
        if points.is_empty() {
            return Ok(0);
        }
        let n = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await?;
        debug!(points = n, collection = %self.collection, "upserted");
        Ok(n)
    }

    /// Raw similarity search; hits are closest first.
    #[instrument(skip_all, fields(collection = %self.collection, limit, filtered = filter.is_some()))]
    pub async fn search_points(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<SearchHit>, RagError> {
        let mut builder = SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit as u64)
            .with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }
        if self.exact {
            builder = builder.params(SearchParamsBuilder::default().exact(true));
        }

        let res = self.client.search_points(builder).await?;

        let mut out: Vec<SearchHit> = res
            .result
            .into_iter()
            .map(|p| {
                let payload = qpayload_to_json(p.payload);
                hit_from_payload(
                    point_id_to_string(p.id),
                    &payload,
                    self.distance.score_to_distance(p.score),
                )
            })
            .collect();
        out.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!(hits = out.len(), "search completed");
        Ok(out)
    }

    /// Scrolls every stored chunk (payload only) and groups it per document.
    pub async fn list_documents(
        &self,
        only_blocked: Option<bool>,
    ) -> Result<Vec<DocumentSummary>, RagError> {
        #[derive(Default)]
        struct Acc {
            pages: BTreeSet<i64>,
            chunks: usize,
            blocked_chunks: usize,
        }

        let mut docs: BTreeMap<String, Acc> = BTreeMap::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut req = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(o) = offset.take() {
                req = req.offset(o);
            }
            let page = self.client.scroll(req).await?;
            for p in page.result {
                let payload = qpayload_to_json(p.payload);
                let hit = hit_from_payload(String::new(), &payload, 0.0);
                let acc = docs.entry(hit.document_id).or_default();
                acc.pages.insert(hit.page);
                acc.chunks += 1;
                if hit.blocked {
                    acc.blocked_chunks += 1;
                }
            }
            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(docs
            .into_iter()
            .map(|(document_id, acc)| DocumentSummary {
                document_id,
                // A document counts as blocked once any of its chunks is.
                blocked: acc.blocked_chunks > 0,
                page_count: acc.pages.len(),
                chunk_count: acc.chunks,
            })
            .filter(|d| only_blocked.is_none_or(|b| d.blocked == b))
            .collect())
    }

    /// Sets the `blocked` flag on every chunk of a document.
    pub async fn set_blocked(&self, document_id: &str, blocked: bool) -> Result<(), RagError> {
        let mut payload = Payload::new();
        payload.insert(fields::BLOCKED, blocked);
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.collection, payload)
                    .points_selector(document_filter(document_id))
                    .wait(true),
            )
            .await?;
        info!(document_id, blocked, "document blocked flag updated");
        Ok(())
    }

    /// Removes every chunk of a document.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), RagError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(document_filter(document_id))
                    .wait(true),
            )
            .await?;
        info!(document_id, "document deleted");
        Ok(())
    }

    /// Drops the whole collection.
    pub async fn drop_collection(&self) -> Result<(), RagError> {
        self.client.delete_collection(&self.collection).await?;
        warn!(collection = %self.collection, "collection dropped");
        Ok(())
    }
}

impl VectorIndex for QdrantFacade {
    fn supports_filter(&self) -> bool {
        self.native_filter
    }

    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        predicate: Option<&'a Predicate>,
    ) -> SearchFuture<'a> {
        Box::pin(async move {
            let filter = predicate.and_then(Predicate::to_qdrant_filter);
            self.search_points(vector, limit, filter).await
        })
    }

    fn ready(&self) -> ReadyFuture<'_> {
        Box::pin(async move {
            if self.collection_exists().await? {
                Ok(())
            } else {
                Err(RagError::CollectionMissing(self.collection.clone()))
            }
        })
    }
}

fn document_filter(document_id: &str) -> Filter {
    Filter::must([Condition::matches(
        fields::DOCUMENT_ID,
        document_id.to_string(),
    )])
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

/// Builds a hit from a JSON payload; missing fields fall back to empty/zero.
pub(crate) fn hit_from_payload(id: String, payload: &serde_json::Value, distance: f32) -> SearchHit {
    let str_field = |k: &str| {
        payload
            .get(k)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    SearchHit {
        id,
        text: str_field(fields::TEXT),
        document_id: str_field(fields::DOCUMENT_ID),
        page: payload
            .get(fields::PAGE)
            .and_then(|v| v.as_i64())
            .unwrap_or_default(),
        blocked: payload
            .get(fields::BLOCKED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        distance,
    }
}

/// Converts a Qdrant payload (`HashMap<String, qdrant::Value>`) into JSON.
///
/// Nested objects/arrays are mapped to `Null`; stored chunks only carry scalars.
fn qpayload_to_json(mut p: HashMap<String, QValue>) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind as K;
    let mut m = serde_json::Map::new();
    for (k, v) in p.drain() {
        let j = match v.kind {
            Some(K::StringValue(s)) => serde_json::Value::String(s),
            Some(K::IntegerValue(i)) => serde_json::Value::Number(i.into()),
            Some(K::DoubleValue(f)) => serde_json::json!(f),
            Some(K::BoolValue(b)) => serde_json::Value::Bool(b),
            _ => serde_json::Value::Null,
        };
        m.insert(k, j);
    }
    serde_json::Value::Object(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_maps_to_hit() {
        let mut p = HashMap::new();
        p.insert(fields::TEXT.to_string(), QValue::from("chunk text"));
        p.insert(fields::DOCUMENT_ID.to_string(), QValue::from("manual.pdf"));
        p.insert(fields::PAGE.to_string(), QValue::from(7_i64));
        p.insert(fields::BLOCKED.to_string(), QValue::from(true));
        let json = qpayload_to_json(p);
        let hit = hit_from_payload("id-1".into(), &json, 0.25);
        assert_eq!(hit.document_id, "manual.pdf");
        assert_eq!(hit.page, 7);
        assert!(hit.blocked);
        assert_eq!(hit.text, "chunk text");
    }

    #[test]
    fn point_ids_render_as_strings() {
        let uuid = PointId::from("6f1c0a4e-0000-5000-8000-000000000000".to_string());
        assert_eq!(
            point_id_to_string(Some(uuid)),
            "6f1c0a4e-0000-5000-8000-000000000000"
        );
        assert_eq!(point_id_to_string(Some(PointId::from(42_u64))), "42");
        assert_eq!(point_id_to_string(None), "");
    }
}
