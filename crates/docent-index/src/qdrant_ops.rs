//! Qdrant-backed collections.

use std::collections::{HashMap, HashSet};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, GetPointsBuilder, PointId, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    point_id::PointIdOptions, value::Kind,
};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, UpsertReport, VectorPoint, VectorStore, VectorStoreError,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

const POINT_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x64, 0x6f, 0x63, 0x65, // "doce"
    0x6e, 0x74, 0x2d, 0x70, // "nt-p"
    0x6f, 0x69, 0x6e, 0x74, // "oint"
    0x00, 0x00, 0x00, 0x01, // version
]);

/// Payload keys carrying the caller's id and chunk text.
const ID_KEY: &str = "id";
const TEXT_KEY: &str = "text";

/// Qdrant only accepts integer or UUID point ids; string ids map to a stable UUIDv5.
#[must_use]
pub fn point_uuid(collection: &str, id: &str) -> String {
    let key = format!("{collection}/{id}");
    uuid::Uuid::new_v5(&POINT_NAMESPACE, key.as_bytes()).to_string()
}

/// Thin wrapper over [`Qdrant`] client encapsulating common collection operations.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str) -> QdrantResult<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self { client })
    }

    /// Ensure a collection exists with cosine distance vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached or collection creation fails.
    pub async fn ensure_collection(&self, collection: &str, vector_size: u64) -> QdrantResult<()> {
        if self.collection_exists(collection).await? {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached.
    pub async fn collection_exists(&self, collection: &str) -> QdrantResult<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(Box::new)
    }

    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached.
    pub async fn list_collections(&self) -> QdrantResult<Vec<String>> {
        let response = self.client.list_collections().await.map_err(Box::new)?;
        let mut names: Vec<String> = response.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    /// # Errors
    ///
    /// Returns an error if the count request fails.
    pub async fn count(&self, collection: &str) -> QdrantResult<u64> {
        if !self.collection_exists(collection).await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Box::new)?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn existing_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> QdrantResult<HashSet<String>> {
        if ids.is_empty() || !self.collection_exists(collection).await? {
            return Ok(HashSet::new());
        }
        let by_uuid: HashMap<String, String> = ids
            .into_iter()
            .map(|id| (point_uuid(collection, &id), id))
            .collect();
        let point_ids: Vec<PointId> = by_uuid.keys().cloned().map(PointId::from).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, point_ids)
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(Box::new)?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| point_id_string(p.id))
            .filter_map(|uuid| by_uuid.get(&uuid).cloned())
            .collect())
    }

    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> QdrantResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results.result)
    }

    /// Convert a JSON value to a Qdrant payload map.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if deserialization fails.
    pub fn json_to_payload(
        value: serde_json::Value,
    ) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ensure_collection(&collection, vector_size)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>> {
        Box::pin(async move {
            self.list_collections()
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.count(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn existing_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<HashSet<String>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.existing_ids(&collection, ids)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<UpsertReport, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();
            let existing = self
                .existing_ids(&collection, ids)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;

            let mut report = UpsertReport::default();
            let mut seen = HashSet::new();
            let mut qdrant_points = Vec::with_capacity(points.len());
            for p in points {
                if existing.contains(&p.id) || !seen.insert(p.id.clone()) {
                    report.skipped.push(p.id);
                    continue;
                }
                let mut payload = p.payload;
                payload.insert(ID_KEY.into(), serde_json::Value::String(p.id.clone()));
                payload.insert(TEXT_KEY.into(), serde_json::Value::String(p.text));
                let payload = Self::json_to_payload(serde_json::Value::Object(
                    payload.into_iter().collect(),
                ))
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                qdrant_points.push(PointStruct::new(
                    point_uuid(&collection, &p.id),
                    p.vector,
                    payload,
                ));
            }

            report.inserted = qdrant_points.len();
            self.upsert(&collection, qdrant_points)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            Ok(report)
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let results = self
                .search(&collection, vector, limit)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(results.into_iter().map(scored_point_to_vector).collect())
        })
    }
}

fn point_id_string(id: Option<PointId>) -> Option<String> {
    match id.and_then(|pid| pid.point_id_options)? {
        PointIdOptions::Uuid(u) => Some(u),
        PointIdOptions::Num(n) => Some(n.to_string()),
    }
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let mut payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = match payload.remove(ID_KEY) {
        Some(serde_json::Value::String(s)) => s,
        _ => point_id_string(point.id).unwrap_or_default(),
    };
    let text = match payload.remove(TEXT_KEY) {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    };

    ScoredVectorPoint {
        id,
        text,
        // Qdrant reports cosine similarity for `Distance::Cosine` collections.
        distance: 1.0 - point.score,
        payload,
    }
}
