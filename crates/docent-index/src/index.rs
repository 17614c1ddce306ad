use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::vector_store::{
    ScoredVectorPoint, UpsertReport, VectorPoint, VectorStore, VectorStoreError,
};

/// Handle to a named collection returned by [`VectorIndex::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub distance: f32,
}

impl From<ScoredVectorPoint> for RetrievedChunk {
    fn from(p: ScoredVectorPoint) -> Self {
        Self {
            id: p.id,
            text: p.text,
            distance: p.distance,
        }
    }
}

/// Nearest chunks for one query, ordered by ascending distance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.text.as_str())
    }
}

/// Collection-oriented facade over a [`VectorStore`] backend.
///
/// Collections are created lazily with the index's configured dimensionality, on first write
/// or first query.
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    dimensions: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, dimensions: usize) -> Self {
        Self { store, dimensions }
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Idempotent: an existing collection and its contents are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create or look up the collection.
    pub async fn get_or_create(&self, name: &str) -> Result<Collection, VectorStoreError> {
        self.store
            .ensure_collection(name, self.dimensions as u64)
            .await?;
        Ok(Collection {
            name: name.to_owned(),
            dimensions: self.dimensions,
        })
    }

    /// Insert `ids[i] -> (chunks[i], vectors[i])`, skipping ids already present.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::Upsert`] when the three lists differ in length, or
    /// [`VectorStoreError::DimensionMismatch`] when a vector does not fit the collection.
    pub async fn upsert(
        &self,
        name: &str,
        ids: Vec<String>,
        chunks: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<UpsertReport, VectorStoreError> {
        if ids.len() != chunks.len() || ids.len() != vectors.len() {
            return Err(VectorStoreError::Upsert(format!(
                "length mismatch: {} ids, {} chunks, {} vectors",
                ids.len(),
                chunks.len(),
                vectors.len()
            )));
        }
        let points = ids
            .into_iter()
            .zip(chunks)
            .zip(vectors)
            .map(|((id, text), vector)| VectorPoint {
                id,
                text,
                vector,
                payload: HashMap::new(),
            })
            .collect();
        self.upsert_points(name, points).await
    }

    /// Insert prepared points (with payload), skipping ids already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be created or the write fails.
    pub async fn upsert_points(
        &self,
        name: &str,
        points: Vec<VectorPoint>,
    ) -> Result<UpsertReport, VectorStoreError> {
        self.get_or_create(name).await?;
        let report = self.store.upsert(name, points).await?;
        if !report.skipped.is_empty() {
            tracing::warn!(
                collection = %name,
                skipped = report.skipped.len(),
                first = %report.skipped[0],
                "ids already indexed, left unchanged"
            );
        }
        Ok(report)
    }

    /// Up to `k` nearest chunks by cosine distance. A missing collection is created empty.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::DimensionMismatch`] when the query vector does not fit the
    /// collection, or a backend search error.
    pub async fn query(
        &self,
        name: &str,
        vector: Vec<f32>,
        k: usize,
    ) -> Result<RetrievalResult, VectorStoreError> {
        if !self.store.collection_exists(name).await? {
            self.get_or_create(name).await?;
            tracing::debug!(collection = %name, "queried missing collection, created empty");
            return Ok(RetrievalResult::default());
        }
        if k == 0 {
            return Ok(RetrievalResult::default());
        }
        let points = self.store.search(name, vector, k as u64).await?;
        Ok(RetrievalResult {
            chunks: points.into_iter().map(RetrievedChunk::from).collect(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the backend lookup fails.
    pub async fn collection_exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        self.store.collection_exists(name).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend lookup fails.
    pub async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        self.store.list_collections().await
    }

    /// # Errors
    ///
    /// Returns an error if the backend lookup fails.
    pub async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
        self.store.count(name).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend lookup fails.
    pub async fn existing_ids(
        &self,
        name: &str,
        ids: Vec<String>,
    ) -> Result<HashSet<String>, VectorStoreError> {
        self.store.existing_ids(name, ids).await
    }
}
