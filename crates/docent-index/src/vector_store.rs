use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("collection {collection} holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One entry to be written: chunk text plus its embedding.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub text: String,
    /// Cosine distance, `1 - cosine_similarity`; smaller is closer.
    pub distance: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Outcome of an insert-if-absent write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    /// Ids already present in the collection, left untouched.
    pub skipped: Vec<String>,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage backend holding named collections of `(id, text, vector)` entries.
///
/// Writes never overwrite: ids already present are reported in [`UpsertReport::skipped`].
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing. No-op when it already exists.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    /// Names of all collections, sorted.
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>>;

    /// Number of entries in the collection; 0 when it does not exist.
    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;

    /// Subset of `ids` already stored in the collection.
    fn existing_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<HashSet<String>, VectorStoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<UpsertReport, VectorStoreError>>;

    /// Up to `limit` entries ordered by ascending cosine distance to `vector`.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// `1 - cosine_similarity`, in `[0, 2]`.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Sort by ascending distance, ties broken by id, then keep the first `limit`.
pub(crate) fn rank(mut scored: Vec<ScoredVectorPoint>, limit: u64) -> Vec<ScoredVectorPoint> {
    scored.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    scored
}

pub(crate) fn check_dimensions(
    collection: &str,
    expected: usize,
    actual: usize,
) -> Result<(), VectorStoreError> {
    if expected == actual {
        Ok(())
    } else {
        Err(VectorStoreError::DimensionMismatch {
            collection: collection.to_owned(),
            expected,
            actual,
        })
    }
}
