use docent_index::{RetrievalResult, VectorIndex, VectorStoreError};
use docent_llm::any::AnyProvider;
use docent_llm::{EmbedMode, Embedder, Generator, LlmError};

use crate::prompt::{NO_ANSWER, build_answer_prompt};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("no embedding available for query: {0}")]
    EmbeddingUnavailable(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("retrieval failed: {0}")]
    Index(#[from] VectorStoreError),

    #[error("generation failed: {0}")]
    Generation(#[source] LlmError),
}

/// Answers a question from one named collection.
///
/// Collection choice belongs to the caller; the retriever never classifies.
#[derive(Debug, Clone)]
pub struct Retriever {
    index: VectorIndex,
    provider: AnyProvider,
    top_k: usize,
}

impl Retriever {
    #[must_use]
    pub fn new(index: VectorIndex, provider: AnyProvider) -> Self {
        Self {
            index,
            provider,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Nearest chunks for `query` in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`AnswerError::EmbeddingUnavailable`] when the embedder yields no vector for the
    /// query, [`AnswerError::Embedding`] when the provider call fails, and
    /// [`AnswerError::Index`] on search failures.
    pub async fn retrieve(
        &self,
        collection: &str,
        query: &str,
    ) -> Result<RetrievalResult, AnswerError> {
        let vector = self.embed_query(query).await?;
        let result = self.index.query(collection, vector, self.top_k).await?;
        tracing::debug!(collection, hits = result.len(), "retrieved context");
        Ok(result)
    }

    /// Retrieve context, build the grounded prompt and ask the generator.
    ///
    /// Empty retrieval still reaches the model with an empty context block. Blank model output
    /// becomes [`NO_ANSWER`].
    ///
    /// # Errors
    ///
    /// Everything [`retrieve`](Self::retrieve) returns, plus [`AnswerError::Generation`].
    pub async fn answer(&self, collection: &str, query: &str) -> Result<String, AnswerError> {
        let context = self.retrieve(collection, query).await?;
        let prompt = build_answer_prompt(&context, query);
        let text = self
            .provider
            .generate(&prompt)
            .await
            .map_err(AnswerError::Generation)?;
        if text.trim().is_empty() {
            tracing::warn!(collection, "model returned empty answer");
            return Ok(NO_ANSWER.to_owned());
        }
        Ok(text)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AnswerError> {
        let vectors = match self
            .provider
            .embed(&[query.to_owned()], EmbedMode::Query)
            .await
        {
            Ok(v) => v,
            Err(LlmError::EmbeddingUnavailable(reason)) => {
                return Err(AnswerError::EmbeddingUnavailable(reason));
            }
            Err(e) => return Err(AnswerError::Embedding(e)),
        };
        match vectors.into_iter().next() {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(AnswerError::EmbeddingUnavailable("embedder returned no vector".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docent_index::InMemoryVectorStore;
    use docent_llm::mock::MockProvider;

    use super::*;

    const DIMS: usize = 8;

    async fn seeded(mock: MockProvider) -> Retriever {
        let index = VectorIndex::new(Arc::new(InMemoryVectorStore::new()), DIMS);
        let texts: Vec<String> = ["Plans start at $99 per month.", "Our mission is care."]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let vectors = texts
            .iter()
            .map(|t| docent_llm::mock::histogram_embedding(t, DIMS))
            .collect();
        index
            .upsert(
                "Pricing_Plan",
                vec!["Pricing_Plan_doc_0".into(), "Pricing_Plan_doc_1".into()],
                texts,
                vectors,
            )
            .await
            .unwrap();
        Retriever::new(index, AnyProvider::Mock(mock.with_dimensions(DIMS)))
    }

    #[tokio::test]
    async fn answer_sends_grounded_prompt() {
        let mock = MockProvider::with_responses(vec!["It costs $99.".into()]);
        let retriever = seeded(mock.clone()).await;
        let answer = retriever
            .answer("Pricing_Plan", "How much does it cost?")
            .await
            .unwrap();
        assert_eq!(answer, "It costs $99.");

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Context:\n"));
        assert!(prompts[0].contains("Plans start at $99 per month."));
        assert!(prompts[0].contains("Question:\nHow much does it cost?"));
    }

    #[tokio::test]
    async fn blank_generation_yields_sentinel() {
        let mock = MockProvider::with_responses(vec!["  \n".into()]);
        let retriever = seeded(mock).await;
        let answer = retriever.answer("Pricing_Plan", "price?").await.unwrap();
        assert_eq!(answer, NO_ANSWER);
    }

    #[tokio::test]
    async fn empty_query_embedding_skips_generation() {
        let mock = MockProvider::default().with_empty_embeddings();
        let retriever = seeded(mock.clone()).await;
        let err = retriever
            .answer("Pricing_Plan", "price?")
            .await
            .unwrap_err();
        assert!(matches!(err, AnswerError::EmbeddingUnavailable(_)));
        assert_eq!(mock.generate_call_count(), 0);
    }

    #[tokio::test]
    async fn missing_collection_still_asks_model_with_empty_context() {
        let mock = MockProvider::default();
        let retriever = seeded(mock.clone()).await;
        let answer = retriever.answer("Unknown", "anything?").await.unwrap();
        assert_eq!(answer, "mock response");
        assert!(mock.prompts()[0].starts_with("Context:\n\n\nQuestion:"));
        assert!(
            retriever
                .index()
                .collection_exists("Unknown")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn retrieve_respects_top_k() {
        let retriever = seeded(MockProvider::default()).await.with_top_k(1);
        let result = retriever.retrieve("Pricing_Plan", "plans").await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn generator_failure_is_surfaced() {
        let mut mock = MockProvider::default();
        mock.fail_chat = true;
        let retriever = seeded(mock).await;
        let err = retriever
            .answer("Pricing_Plan", "price?")
            .await
            .unwrap_err();
        assert!(matches!(err, AnswerError::Generation(_)));
    }
}
