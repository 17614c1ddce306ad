use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Boxed future returned by type-erased embedding closures.
pub type EmbedFuture = Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send>>;

/// Type-erased batch embedding function, bound to one [`EmbedMode`].
pub type EmbedFn = Box<dyn Fn(Vec<String>) -> EmbedFuture + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Which side of a retrieval an embedding is produced for.
///
/// Providers that distinguish the two (Gemini task types) embed documents and queries
/// asymmetrically; vectors from both modes must come from the same model to be comparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    Document,
    Query,
}

/// Function tool exposed to a tool-capable chat model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolUseRequest {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatResponse {
    Text(String),
    ToolUse {
        text: Option<String>,
        tool_calls: Vec<ToolUseRequest>,
    },
}

pub trait Embedder: Send + Sync {
    /// Embed `texts` in order, one vector per input.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::EmbeddingUnavailable`] when the provider yields no vectors, a different
    /// number of vectors than inputs, or vectors of unexpected dimensionality.
    fn embed(
        &self,
        texts: &[String],
        mode: EmbedMode,
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Dimensionality every returned vector must have.
    fn dimensions(&self) -> usize;

    fn supports_embeddings(&self) -> bool {
        true
    }
}

pub trait Generator: Send + Sync {
    /// Generate a completion for a single prompt. May return an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;
}

pub trait LlmProvider: Send + Sync {
    /// Send a conversation to the model and return the assistant text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn supports_tool_use(&self) -> bool {
        false
    }

    /// Chat with function tools available. Providers without tool support answer in text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    fn chat_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> impl Future<Output = Result<ChatResponse, LlmError>> + Send {
        async move { self.chat(messages).await.map(ChatResponse::Text) }
    }

    fn name(&self) -> &str;
}

/// Check a provider's embedding response against the request.
///
/// # Errors
///
/// Returns [`LlmError::EmbeddingUnavailable`] describing the first violation found.
pub fn validate_embeddings(
    provider: &str,
    expected: usize,
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, LlmError> {
    if vectors.is_empty() {
        return Err(LlmError::EmbeddingUnavailable(format!("{provider} returned no embeddings")));
    }
    if vectors.len() != expected {
        return Err(LlmError::EmbeddingUnavailable(format!(
            "{provider} returned {} embeddings for {expected} inputs",
            vectors.len()
        )));
    }
    for (i, v) in vectors.iter().enumerate() {
        if v.is_empty() {
            return Err(LlmError::EmbeddingUnavailable(format!(
                "{provider} returned an empty vector at index {i}"
            )));
        }
        if dimensions != 0 && v.len() != dimensions {
            return Err(LlmError::EmbeddingUnavailable(format!(
                "{provider} vector {i} has {} dimensions, expected {dimensions}",
                v.len()
            )));
        }
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_as_str() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn message_serializes_lowercase_role() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn validate_accepts_matching_batch() {
        let out = validate_embeddings("t", 2, 3, vec![vec![0.0; 3], vec![1.0; 3]]).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn validate_rejects_empty_batch() {
        let err = validate_embeddings("t", 1, 3, vec![]).unwrap_err();
        assert!(matches!(err, LlmError::EmbeddingUnavailable(_)));
    }

    #[test]
    fn validate_rejects_count_mismatch() {
        let err = validate_embeddings("t", 2, 3, vec![vec![0.0; 3]]).unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 2 inputs"));
    }

    #[test]
    fn validate_rejects_empty_vector() {
        let err = validate_embeddings("t", 2, 3, vec![vec![0.0; 3], vec![]]).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn validate_rejects_wrong_dimensions() {
        let err = validate_embeddings("t", 1, 3072, vec![vec![0.0; 768]]).unwrap_err();
        assert!(err.to_string().contains("expected 3072"));
    }

    #[test]
    fn validate_zero_dimensions_skips_length_check() {
        assert!(validate_embeddings("t", 1, 0, vec![vec![0.0; 5]]).is_ok());
    }

    mod proptest_validate {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn uniform_batches_always_pass(n in 1usize..20, dims in 1usize..64) {
                let vectors = vec![vec![0.5f32; dims]; n];
                let out = validate_embeddings("p", n, dims, vectors).unwrap();
                prop_assert_eq!(out.len(), n);
                prop_assert!(out.iter().all(|v| v.len() == dims));
            }
        }
    }
}
