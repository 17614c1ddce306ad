use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{
    ChatResponse, EmbedMode, Embedder, Generator, LlmProvider, Message, ToolDefinition,
    ToolUseRequest,
};
use crate::retry::send_with_retry;

/// Gemini endpoint speaking the `OpenAI` chat protocol, used for tool-calling chat by default.
pub const GEMINI_COMPAT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Client for any `OpenAI`-compatible `/chat/completions` + `/embeddings` API.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    embedding_model: Option<String>,
    dimensions: usize,
    max_retries: u32,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("embedding_model", &self.embedding_model)
            .field("dimensions", &self.dimensions)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            max_tokens: None,
            embedding_model: None,
            dimensions: 0,
            max_retries: 3,
        }
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: String, dimensions: usize) -> Self {
        self.embedding_model = Some(model);
        self.dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
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
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<String, LlmError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = send_with_retry("openai", self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            tracing::error!("OpenAI-compatible API error {status} on /{endpoint}: {text}");
            return Err(LlmError::Api {
                provider: "openai".into(),
                status: status.as_u16(),
            });
        }
        Ok(text)
    }

    async fn send_chat(
        &self,
        messages: &[Message],
        tools: &[OpenAiTool<'_>],
    ) -> Result<ChoiceMessage, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
            tools: (!tools.is_empty()).then_some(tools),
        };
        let text = self.post_json("chat/completions", &body).await?;
        let resp: ChatCompletion = serde_json::from_str(&text)?;
        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let message = self.send_chat(messages, &[]).await?;
        Ok(message.content.unwrap_or_default())
    }

    fn supports_tool_use(&self) -> bool {
        true
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        let api_tools: Vec<OpenAiTool<'_>> = tools
            .iter()
            .map(|t| OpenAiTool {
                r#type: "function",
                function: OpenAiFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();

        let message = self.send_chat(messages, &api_tools).await?;
        let content = message.content.unwrap_or_default();

        if let Some(tool_calls) = message.tool_calls
            && !tool_calls.is_empty()
        {
            let text = (!content.is_empty()).then_some(content);
            let calls = tool_calls
                .into_iter()
                .map(|tc| {
                    let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                        tracing::warn!(tool = %tc.function.name, "unparseable tool arguments: {e}");
                        serde_json::Value::Object(serde_json::Map::new())
                    });
                    ToolUseRequest {
                        id: tc.id,
                        name: tc.function.name,
                        input,
                    }
                })
                .collect();
            return Ok(ChatResponse::ToolUse {
                text,
                tool_calls: calls,
            });
        }

        Ok(ChatResponse::Text(content))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

impl Generator for OpenAiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.chat(&[Message::user(prompt)]).await
    }
}

impl Embedder for OpenAiProvider {
    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported {
                provider: "openai".into(),
            })?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            input: texts,
            model,
            dimensions: (self.dimensions > 0).then_some(self.dimensions),
        };
        let text = self.post_json("embeddings", &body).await?;
        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;
        resp.data.sort_by_key(|d| d.index);
        let vectors = resp.data.into_iter().map(|d| d.embedding).collect();
        crate::provider::validate_embeddings("openai", texts.len(), self.dimensions, vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect()
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiTool<'a> {
    r#type: &'a str,
    function: OpenAiFunction<'a>,
}

#[derive(Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [OpenAiTool<'a>]>,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    #[serde(default)]
    id: String,
    function: ToolCallFunction,
}

#[derive(Deserialize)]
struct ToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new("sk-test".into(), server.uri(), "gemini-2.5-flash".into())
            .with_max_retries(0)
    }

    fn route_tool() -> ToolDefinition {
        ToolDefinition {
            name: "get_answer_from_collection".into(),
            description: "Answer from a collection".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "collection_name": { "type": "string" },
                    "query": { "type": "string" }
                },
                "required": ["collection_name", "query"]
            }),
        }
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = OpenAiProvider::new("sk-secret".into(), "http://x".into(), "m".into());
        let debug = format!("{p:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let p = OpenAiProvider::new("k".into(), format!("{GEMINI_COMPAT_BASE_URL}/"), "m".into());
        assert_eq!(p.base_url, GEMINI_COMPAT_BASE_URL);
    }

    #[test]
    fn chat_request_omits_empty_tools_and_max_tokens() {
        let messages = [Message::user("hi")];
        let api = convert_messages(&messages);
        let req = ChatRequest {
            model: "m",
            messages: &api,
            max_tokens: None,
            tools: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({ "model": "m", "messages": [{ "role": "user", "content": "hi" }] })
        );
    }

    #[test]
    fn supports_embeddings_only_with_model() {
        let p = OpenAiProvider::new("k".into(), "http://x".into(), "m".into());
        assert!(!p.supports_embeddings());
        let p = p.with_embedding_model("text-embedding-3-small".into(), 8);
        assert!(p.supports_embeddings());
        assert_eq!(p.dimensions(), 8);
    }

    #[tokio::test]
    async fn chat_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
            })))
            .mount(&server)
            .await;

        let out = provider(&server)
            .chat(&[Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn chat_with_tools_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "tools": [{ "type": "function", "function": { "name": "get_answer_from_collection" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_answer_from_collection",
                            "arguments": "{\"collection_name\":\"Pricing_Plan\",\"query\":\"cost?\"}"
                        }
                    }]
                } }]
            })))
            .mount(&server)
            .await;

        let resp = provider(&server)
            .chat_with_tools(&[Message::user("how much?")], &[route_tool()])
            .await
            .unwrap();
        let ChatResponse::ToolUse { text, tool_calls } = resp else {
            panic!("expected tool use, got {resp:?}");
        };
        assert!(text.is_none());
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].id, "call_1");
        assert_eq!(tool_calls[0].input["collection_name"], "Pricing_Plan");
        assert_eq!(tool_calls[0].input["query"], "cost?");
    }

    #[tokio::test]
    async fn chat_with_tools_plain_text_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Hi there" } }]
            })))
            .mount(&server)
            .await;

        let resp = provider(&server)
            .chat_with_tools(&[Message::user("hello")], &[route_tool()])
            .await
            .unwrap();
        assert_eq!(resp, ChatResponse::Text("Hi there".into()));
    }

    #[tokio::test]
    async fn chat_api_error_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .chat(&[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn embed_orders_by_index_and_validates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "model": "emb", "dimensions": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [1.0, 1.0] },
                    { "index": 0, "embedding": [0.0, 0.0] }
                ]
            })))
            .mount(&server)
            .await;

        let p = provider(&server).with_embedding_model("emb".into(), 2);
        let out = p
            .embed(&["a".into(), "b".into()], EmbedMode::Document)
            .await
            .unwrap();
        assert_eq!(out, vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = OpenAiProvider::new("k".into(), "http://127.0.0.1:1".into(), "m".into());
        let err = p.embed(&["x".into()], EmbedMode::Query).await.unwrap_err();
        assert!(err.to_string().contains("embedding not supported"));
    }

    #[tokio::test]
    async fn chat_unreachable_endpoint_errors() {
        let p = OpenAiProvider::new("k".into(), "http://127.0.0.1:1".into(), "m".into())
            .with_max_retries(0);
        assert!(p.chat(&[Message::user("x")]).await.is_err());
    }
}
