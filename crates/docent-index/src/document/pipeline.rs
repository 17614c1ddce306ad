use std::collections::HashMap;
use std::path::{Path, PathBuf};

use docent_llm::LlmError;
use docent_llm::provider::EmbedFn;
use futures::StreamExt;
use serde_json::json;

use super::{
    Document, DocumentError, DocumentLoader, IngestError, TextSplitter, chunk_id,
    collection_name_for,
};
use crate::index::VectorIndex;
use crate::vector_store::VectorPoint;

/// Terminal state of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    Indexed {
        chunks: usize,
        inserted: usize,
        skipped: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub collection: String,
    pub source: PathBuf,
    pub status: IngestStatus,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl IngestReport {
    #[must_use]
    pub fn indexed(&self) -> usize {
        self.count(|s| matches!(s, IngestStatus::Indexed { .. }))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, IngestStatus::Skipped { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, IngestStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&IngestStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Load -> split -> embed -> insert, one collection per source document.
pub struct IngestionPipeline {
    splitter: TextSplitter,
    index: VectorIndex,
    loaders: Vec<Box<dyn DocumentLoader>>,
    embed_fn: EmbedFn,
    concurrency: usize,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(
        splitter: TextSplitter,
        index: VectorIndex,
        loaders: Vec<Box<dyn DocumentLoader>>,
        embed_fn: EmbedFn,
    ) -> Self {
        Self {
            splitter,
            index,
            loaders,
            embed_fn,
            concurrency: 1,
        }
    }

    /// Documents processed at once by [`ingest_dir`](Self::ingest_dir). Clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.loaders
            .iter()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
            .map(AsRef::as_ref)
    }

    /// Regular files in `dir` that some loader supports, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::ReadDir`] if the directory cannot be listed.
    pub async fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let read_err = |source: std::io::Error| IngestError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let path = entry.path();
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            if is_file && self.loader_for(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Index one loaded document into `collection`.
    ///
    /// Chunks whose ids already exist are neither embedded nor written. Returns
    /// [`IngestStatus::Skipped`] when nothing is left to embed or the embedder yields no usable
    /// vectors.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Storage`] on index failures and [`DocumentError::Embedding`] when
    /// the embedding provider call itself fails.
    pub async fn ingest(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<IngestStatus, DocumentError> {
        let chunks = self.splitter.split(&document);
        if chunks.is_empty() {
            return Ok(IngestStatus::Skipped {
                reason: "document has no text".into(),
            });
        }

        self.index.get_or_create(collection).await?;
        let ids: Vec<String> = chunks
            .iter()
            .map(|c| chunk_id(collection, c.chunk_index))
            .collect();
        let existing = self.index.existing_ids(collection, ids.clone()).await?;
        let pending: Vec<_> = ids
            .into_iter()
            .zip(&chunks)
            .filter(|(id, _)| !existing.contains(id))
            .collect();
        if pending.is_empty() {
            tracing::info!(
                collection,
                chunks = chunks.len(),
                "already indexed, skipping"
            );
            return Ok(IngestStatus::Skipped {
                reason: "already indexed".into(),
            });
        }

        let texts: Vec<String> = pending.iter().map(|(_, c)| c.content.clone()).collect();
        let vectors = match (self.embed_fn)(texts.clone()).await {
            Ok(v) => v,
            Err(LlmError::EmbeddingUnavailable(reason)) => {
                tracing::warn!(collection, "no embeddings generated: {reason}");
                return Ok(IngestStatus::Skipped { reason });
            }
            Err(e) => return Err(e.into()),
        };
        if vectors.len() != texts.len() || vectors.iter().any(Vec::is_empty) {
            tracing::warn!(
                collection,
                expected = texts.len(),
                returned = vectors.len(),
                "no usable embeddings generated"
            );
            return Ok(IngestStatus::Skipped {
                reason: format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    texts.len()
                ),
            });
        }

        let points = pending
            .into_iter()
            .zip(vectors)
            .map(|((id, chunk), vector)| VectorPoint {
                id,
                text: chunk.content.clone(),
                vector,
                payload: HashMap::from([
                    ("source".into(), json!(chunk.metadata.source)),
                    ("content_type".into(), json!(chunk.metadata.content_type)),
                    ("chunk_index".into(), json!(chunk.chunk_index)),
                ]),
            })
            .collect();
        let report = self.index.upsert_points(collection, points).await?;

        tracing::info!(
            collection,
            chunks = chunks.len(),
            inserted = report.inserted,
            "document indexed"
        );
        Ok(IngestStatus::Indexed {
            chunks: chunks.len(),
            inserted: report.inserted,
            skipped: existing.len() + report.skipped.len(),
        })
    }

    /// Load, split, embed and index one file. Never fails; errors become
    /// [`IngestStatus::Failed`].
    pub async fn ingest_path(&self, path: &Path) -> DocumentOutcome {
        let collection = collection_name_for(path).unwrap_or_default();
        let status = match self.load_and_ingest(&collection, path).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(collection, path = %path.display(), "ingestion failed: {e}");
                IngestStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        DocumentOutcome {
            collection,
            source: path.to_path_buf(),
            status,
        }
    }

    async fn load_and_ingest(
        &self,
        collection: &str,
        path: &Path,
    ) -> Result<IngestStatus, DocumentError> {
        if collection.is_empty() {
            return Err(DocumentError::UnsupportedFormat(format!(
                "no file name: {}",
                path.display()
            )));
        }
        let loader = self.loader_for(path).ok_or_else(|| {
            DocumentError::UnsupportedFormat(path.display().to_string())
        })?;
        let mut documents = loader.load(path).await?.into_iter();
        let Some(mut document) = documents.next() else {
            return Ok(IngestStatus::Skipped {
                reason: "loader produced no documents".into(),
            });
        };
        for more in documents {
            document.content.push_str("\n\n");
            document.content.push_str(&more.content);
        }
        self.ingest(collection, document).await
    }

    /// Ingest every supported file in `dir`; one document's failure never stops the others.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be listed or holds no supported files.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport, IngestError> {
        let files = self.discover(dir).await?;
        if files.is_empty() {
            return Err(IngestError::NoDocuments(dir.to_path_buf()));
        }
        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            concurrency = self.concurrency,
            "starting ingestion"
        );

        let mut outcomes: Vec<DocumentOutcome> = futures::stream::iter(files)
            .map(|path| async move { self.ingest_path(&path).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.source.cmp(&b.source));
        let report = IngestReport { outcomes };

        for outcome in &report.outcomes {
            if matches!(outcome.status, IngestStatus::Failed { .. }) {
                continue;
            }
            match self.index.count(&outcome.collection).await {
                Ok(count) => {
                    tracing::info!(
                        collection = %outcome.collection,
                        entries = count,
                        "collection size"
                    );
                }
                Err(e) => tracing::warn!(collection = %outcome.collection, "count failed: {e}"),
            }
        }
        tracing::info!(
            indexed = report.indexed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "ingestion finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use docent_llm::provider::EmbedFuture;

    use super::*;
    use crate::InMemoryVectorStore;
    use crate::document::loader::default_loaders;
    use crate::document::splitter::SplitterConfig;
    use crate::document::types::DocumentMetadata;

    fn make_document(content: &str) -> Document {
        Document {
            content: content.to_string(),
            metadata: DocumentMetadata {
                source: "test".to_string(),
                content_type: "text/plain".to_string(),
                extra: HashMap::new(),
            },
        }
    }

    fn counting_embed(dims: usize, calls: Arc<AtomicUsize>) -> EmbedFn {
        Box::new(move |texts: Vec<String>| -> EmbedFuture {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(texts.iter().map(|_| vec![0.5f32; dims]).collect()) })
        })
    }

    fn empty_embed() -> EmbedFn {
        Box::new(|_texts: Vec<String>| -> EmbedFuture { Box::pin(async move { Ok(Vec::new()) }) })
    }

    fn error_embed() -> EmbedFn {
        Box::new(|_texts: Vec<String>| -> EmbedFuture {
            Box::pin(async move { Err(LlmError::Other("mock embed error".into())) })
        })
    }

    fn pipeline(config: SplitterConfig, embed_fn: EmbedFn) -> IngestionPipeline {
        let index = VectorIndex::new(Arc::new(InMemoryVectorStore::new()), 4);
        IngestionPipeline::new(
            TextSplitter::new(config),
            index,
            default_loaders(1024),
            embed_fn,
        )
    }

    #[tokio::test]
    async fn ingest_assigns_sequential_chunk_ids() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            SplitterConfig {
                chunk_size: 50,
                chunk_overlap: 10,
                boundary_aware: true,
            },
            counting_embed(4, calls.clone()),
        );
        let doc = make_document("The cat sat on the mat. The dog ran in the park. Birds sing.");
        let status = p.ingest("Animals", doc).await.unwrap();
        assert_eq!(
            status,
            IngestStatus::Indexed {
                chunks: 2,
                inserted: 2,
                skipped: 0,
            }
        );
        let ids = p
            .index()
            .existing_ids(
                "Animals",
                vec![
                    "Animals_doc_0".into(),
                    "Animals_doc_1".into(),
                    "Animals_doc_2".into(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains("Animals_doc_2"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reingest_is_skipped_without_embedding() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(SplitterConfig::default(), counting_embed(4, calls.clone()));
        p.ingest("c", make_document("hello world")).await.unwrap();
        let status = p.ingest("c", make_document("hello world")).await.unwrap();
        assert!(matches!(
            status,
            IngestStatus::Skipped { ref reason } if reason == "already indexed"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_embeddings_skip_document() {
        let p = pipeline(SplitterConfig::default(), empty_embed());
        let status = p.ingest("c", make_document("some text")).await.unwrap();
        assert!(matches!(status, IngestStatus::Skipped { .. }));
        assert_eq!(p.index().count("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_document_is_skipped() {
        let p = pipeline(SplitterConfig::default(), empty_embed());
        let status = p.ingest("c", make_document("")).await.unwrap();
        assert!(matches!(status, IngestStatus::Skipped { .. }));
    }

    #[tokio::test]
    async fn embedding_error_propagates() {
        let p = pipeline(SplitterConfig::default(), error_embed());
        let result = p.ingest("c", make_document("hello world")).await;
        assert!(matches!(result, Err(DocumentError::Embedding(_))));
    }

    #[tokio::test]
    async fn dimension_mismatch_fails_document() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(SplitterConfig::default(), counting_embed(3, calls));
        let result = p.ingest("c", make_document("hello")).await;
        assert!(matches!(result, Err(DocumentError::Storage(_))));
    }

    #[tokio::test]
    async fn ingest_dir_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Alpha.txt"), "alpha content").unwrap();
        std::fs::write(dir.path().join("Beta.txt"), [0xff, 0xfe]).unwrap();
        std::fs::write(dir.path().join("Gamma.md"), "gamma content").unwrap();
        std::fs::write(dir.path().join("ignored.csv"), "a,b").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(SplitterConfig::default(), counting_embed(4, calls)).with_concurrency(2);
        let report = p.ingest_dir(dir.path()).await.unwrap();

        let names: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.collection.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(report.indexed(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.outcomes[1].status, IngestStatus::Failed { .. }));
        assert_eq!(
            p.index().store().list_collections().await.unwrap(),
            vec!["Alpha", "Gamma"]
        );
    }

    #[tokio::test]
    async fn ingest_dir_without_documents_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.csv"), "x").unwrap();
        let p = pipeline(SplitterConfig::default(), empty_embed());
        let result = p.ingest_dir(dir.path()).await;
        assert!(matches!(result, Err(IngestError::NoDocuments(_))));
    }

    #[tokio::test]
    async fn ingest_dir_missing_directory_is_an_error() {
        let p = pipeline(SplitterConfig::default(), empty_embed());
        let result = p.ingest_dir(Path::new("/nonexistent/docent/data")).await;
        assert!(matches!(result, Err(IngestError::ReadDir { .. })));
    }

    #[tokio::test]
    async fn ingest_path_unsupported_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("table.csv");
        std::fs::write(&file, "a,b").unwrap();
        let p = pipeline(SplitterConfig::default(), empty_embed());
        let outcome = p.ingest_path(&file).await;
        assert_eq!(outcome.collection, "table");
        assert!(matches!(outcome.status, IngestStatus::Failed { .. }));
    }
}
