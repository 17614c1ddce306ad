//! Per-collection vector index with SQLite, Qdrant and in-memory backends, plus the
//! document chunking and ingestion pipeline that fills it.

pub mod document;
pub mod in_memory_store;
pub mod index;
pub mod qdrant_ops;
pub mod sqlite_store;
pub mod vector_store;

pub use in_memory_store::InMemoryVectorStore;
pub use index::{Collection, RetrievalResult, RetrievedChunk, VectorIndex};
pub use qdrant_ops::QdrantOps;
pub use sqlite_store::SqliteVectorStore;
pub use vector_store::{
    ScoredVectorPoint, UpsertReport, VectorPoint, VectorStore, VectorStoreError, cosine_distance,
};
