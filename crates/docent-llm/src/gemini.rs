use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{EmbedMode, Embedder, Generator, LlmProvider, Message, Role};
use crate::retry::send_with_retry;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
pub const DEFAULT_DIMENSIONS: usize = 3072;

/// Upper bound on requests per `batchEmbedContents` call.
const MAX_EMBED_BATCH: usize = 100;

/// Native Gemini REST client: `generateContent` for text, `batchEmbedContents` for vectors.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    dimensions: usize,
    max_retries: u32,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("dimensions", &self.dimensions)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String, chat_model: String, embedding_model: String) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            chat_model,
            embedding_model,
            dimensions: DEFAULT_DIMENSIONS,
            max_retries: 3,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<String, LlmError> {
        let response = send_with_retry("gemini", self.max_retries, || {
            self.client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            tracing::error!("Gemini API error {status}: {text}");
            return Err(LlmError::Api {
                provider: "gemini".into(),
                status: status.as_u16(),
            });
        }
        Ok(text)
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        mode: EmbedMode,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = format!("models/{}", self.embedding_model);
        let requests: Vec<EmbedContentRequest<'_>> = texts
            .iter()
            .map(|text| EmbedContentRequest {
                model: &model,
                content: Content {
                    role: None,
                    parts: vec![Part { text }],
                },
                task_type: task_type(mode),
                output_dimensionality: (self.dimensions > 0).then_some(self.dimensions),
            })
            .collect();

        let url = format!(
            "{}/models/{}:batchEmbedContents",
            self.base_url, self.embedding_model
        );
        let text = self.post_json(&url, &BatchEmbedRequest { requests }).await?;
        let resp: BatchEmbedResponse = serde_json::from_str(&text)?;
        Ok(resp.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn generate_content(
        &self,
        system: Option<&str>,
        contents: Vec<Content<'_>>,
    ) -> Result<String, LlmError> {
        let body = GenerateRequest {
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            contents,
        };
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.chat_model
        );
        let text = self.post_json(&url, &body).await?;
        let resp: GenerateResponse = serde_json::from_str(&text)?;
        Ok(resp.text())
    }
}

fn task_type(mode: EmbedMode) -> &'static str {
    match mode {
        EmbedMode::Document => "RETRIEVAL_DOCUMENT",
        EmbedMode::Query => "RETRIEVAL_QUERY",
    }
}

impl Embedder for GeminiProvider {
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_EMBED_BATCH) {
            let batch_vectors = self.embed_batch(batch, mode).await?;
            tracing::debug!(
                requested = batch.len(),
                returned = batch_vectors.len(),
                "gemini embedding batch"
            );
            vectors.extend(batch_vectors);
        }
        crate::provider::validate_embeddings("gemini", texts.len(), self.dimensions, vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Generator for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let contents = vec![Content {
            role: Some("user"),
            parts: vec![Part { text: prompt }],
        }];
        self.generate_content(None, contents).await
    }
}

impl LlmProvider for GeminiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(match m.role {
                    Role::Assistant => "model",
                    Role::User | Role::System => "user",
                }),
                parts: vec![Part { text: &m.content }],
            })
            .collect();
        let system = (!system.is_empty()).then_some(system.as_str());
        self.generate_content(system, contents).await
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate; empty when the model produced none.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
