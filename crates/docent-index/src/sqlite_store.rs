use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, UpsertReport, VectorPoint, VectorStore, VectorStoreError,
    check_dimensions, cosine_distance, rank,
};

/// On-disk vector store: every collection lives in one `SQLite` file and is searched exactly.
#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn open(path: &str) -> Result<Self, VectorStoreError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // A pooled in-memory database is per connection; keep it to one.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| VectorStoreError::Connection(format!("migration failed: {e}")))?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn vector_size(&self, collection: &str) -> Result<Option<usize>, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT vector_size FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(size,)| usize::try_from(size).unwrap_or_default()))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl VectorStore for SqliteVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = i64::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            sqlx::query("INSERT OR IGNORE INTO collections (name, vector_size) VALUES (?, ?)")
                .bind(&collection)
                .bind(size)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = self
                .vector_size(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(size.is_some())
        })
    }

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>> {
        Box::pin(async move {
            let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM collections ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(rows.into_iter().map(|(name,)| name).collect())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM points WHERE collection = ?")
                    .bind(&collection)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    fn existing_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<HashSet<String>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(HashSet::new());
            }
            let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM points WHERE collection = ?")
                .bind(&collection)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let stored: HashSet<String> = rows.into_iter().map(|(id,)| id).collect();
            Ok(ids.into_iter().filter(|id| stored.contains(id)).collect())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<UpsertReport, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let expected = self
                .vector_size(&collection)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?
                .ok_or_else(|| {
                    VectorStoreError::Upsert(format!("collection {collection} not found"))
                })?;
            for p in &points {
                check_dimensions(&collection, expected, p.vector.len())?;
            }

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let mut report = UpsertReport::default();
            for p in points {
                let payload = serde_json::to_string(&p.payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                let result = sqlx::query(
                    "INSERT OR IGNORE INTO points (collection, id, text, vector, payload) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&collection)
                .bind(&p.id)
                .bind(&p.text)
                .bind(encode_vector(&p.vector))
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
                if result.rows_affected() == 0 {
                    report.skipped.push(p.id);
                } else {
                    report.inserted += 1;
                }
            }
            tx.commit()
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
            let expected = self
                .vector_size(&collection)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?
                .ok_or_else(|| {
                    VectorStoreError::Search(format!("collection {collection} not found"))
                })?;
            check_dimensions(&collection, expected, vector.len())?;

            let rows: Vec<(String, String, Vec<u8>, String)> = sqlx::query_as(
                "SELECT id, text, vector, payload FROM points WHERE collection = ?",
            )
            .bind(&collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let scored = rows
                .into_iter()
                .map(|(id, text, blob, payload)| {
                    let stored = decode_vector(&blob);
                    let payload: HashMap<String, serde_json::Value> =
                        serde_json::from_str(&payload).unwrap_or_default();
                    ScoredVectorPoint {
                        id,
                        text,
                        distance: cosine_distance(&vector, &stored),
                        payload,
                    }
                })
                .collect();
            Ok(rank(scored, limit))
        })
    }
}
