//! Test-only mock provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{
    ChatResponse, EmbedMode, Embedder, Generator, LlmProvider, Message, ToolDefinition,
};

/// Deterministic in-process provider.
///
/// Embeddings are character histograms folded into `dimensions` buckets, so texts sharing
/// characters land close together under cosine distance.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    tool_responses: Arc<Mutex<Vec<ChatResponse>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub dimensions: usize,
    /// Return an empty batch from `embed`.
    pub empty_embeddings: bool,
    pub fail_embed: bool,
    pub fail_chat: bool,
    pub tool_use: bool,
    pub embed_calls: Arc<AtomicUsize>,
    pub generate_calls: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            tool_responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            dimensions: 8,
            empty_embeddings: false,
            fail_embed: false,
            fail_chat: false,
            tool_use: true,
            embed_calls: Arc::new(AtomicUsize::new(0)),
            generate_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tool_responses(responses: Vec<ChatResponse>) -> Self {
        Self {
            tool_responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn with_empty_embeddings(mut self) -> Self {
        self.empty_embeddings = true;
        self
    }

    #[must_use]
    pub fn without_tool_use(mut self) -> Self {
        self.tool_use = false;
        self
    }

    /// Prompts received by `generate` and the last user message of each `chat` call, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    #[must_use]
    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn generate_call_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> String {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.default_response.clone()
        } else {
            responses.remove(0)
        }
    }
}

/// Character histogram embedding; never the zero vector.
#[must_use]
pub fn histogram_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(1);
    let mut v = vec![0.0f32; dims];
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            v[c as usize % dims] += 1.0;
        }
    }
    if v.iter().all(|x| *x == 0.0) {
        v[0] = 1.0;
    }
    v
}

impl Embedder for MockProvider {
    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        if self.empty_embeddings {
            return Ok(Vec::new());
        }
        Ok(texts
            .iter()
            .map(|t| histogram_embedding(t, self.dimensions))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Generator for MockProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_owned());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        Ok(self.next_response())
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        Ok(self.next_response())
    }

    fn supports_tool_use(&self) -> bool {
        self.tool_use
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let queued = {
            let mut tool_responses = self.tool_responses.lock().unwrap();
            (!tool_responses.is_empty()).then(|| tool_responses.remove(0))
        };
        match queued {
            Some(resp) => Ok(resp),
            None => self.chat(messages).await.map(ChatResponse::Text),
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_are_consumed_in_order_then_default() {
        let p = MockProvider::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(p.generate("a").await.unwrap(), "first");
        assert_eq!(p.generate("b").await.unwrap(), "second");
        assert_eq!(p.generate("c").await.unwrap(), "mock response");
        assert_eq!(p.generate_call_count(), 3);
        assert_eq!(p.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn embeddings_are_deterministic_and_sized() {
        let p = MockProvider::default().with_dimensions(16);
        let texts = vec!["hello".to_owned(), "world".to_owned()];
        let a = p.embed(&texts, EmbedMode::Document).await.unwrap();
        let b = p.embed(&texts, EmbedMode::Query).await.unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.len() == 16));
        assert_eq!(p.embed_call_count(), 2);
    }

    #[tokio::test]
    async fn empty_embeddings_flag() {
        let p = MockProvider::default().with_empty_embeddings();
        let out = p.embed(&["x".into()], EmbedMode::Query).await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn histogram_never_zero() {
        let v = histogram_embedding("   ", 4);
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn tool_responses_take_priority_over_text() {
        let call = ChatResponse::ToolUse {
            text: None,
            tool_calls: vec![],
        };
        let p = MockProvider::with_tool_responses(vec![call.clone()]);
        let first = p.chat_with_tools(&[Message::user("q")], &[]).await.unwrap();
        assert_eq!(first, call);
        let second = p.chat_with_tools(&[Message::user("q")], &[]).await.unwrap();
        assert_eq!(second, ChatResponse::Text("mock response".into()));
    }
}
