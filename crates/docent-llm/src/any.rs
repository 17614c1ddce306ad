use crate::gemini::GeminiProvider;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{
    ChatResponse, EmbedFn, EmbedFuture, EmbedMode, Embedder, Generator, LlmProvider, Message,
    ToolDefinition,
};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given closure for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Gemini($p) => $expr,
            AnyProvider::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    Gemini(GeminiProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    /// Erase this provider into an owned embedding closure bound to `mode`.
    #[must_use]
    pub fn embed_fn(&self, mode: EmbedMode) -> EmbedFn {
        let provider = self.clone();
        Box::new(move |texts: Vec<String>| -> EmbedFuture {
            let provider = provider.clone();
            Box::pin(async move { provider.embed(&texts, mode).await })
        })
    }
}

impl Embedder for AnyProvider {
    async fn embed(
        &self,
        texts: &[String],
        mode: EmbedMode,
    ) -> Result<Vec<Vec<f32>>, crate::LlmError> {
        delegate_provider!(self, |p| p.embed(texts, mode).await)
    }

    fn dimensions(&self) -> usize {
        delegate_provider!(self, |p| p.dimensions())
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }
}

impl Generator for AnyProvider {
    async fn generate(&self, prompt: &str) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.generate(prompt).await)
    }
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    fn supports_tool_use(&self) -> bool {
        delegate_provider!(self, |p| p.supports_tool_use())
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, crate::LlmError> {
        delegate_provider!(self, |p| p.chat_with_tools(messages, tools).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_gemini_name_and_dimensions() {
        let provider = AnyProvider::Gemini(
            GeminiProvider::new("k".into(), "m".into(), "e".into()).with_dimensions(768),
        );
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.dimensions(), 768);
        assert!(!provider.supports_tool_use());
        assert!(provider.supports_embeddings());
    }

    #[test]
    fn any_openai_delegates() {
        let provider = AnyProvider::OpenAi(OpenAiProvider::new(
            "k".into(),
            "http://localhost".into(),
            "m".into(),
        ));
        assert_eq!(provider.name(), "openai");
        assert!(provider.supports_tool_use());
        assert!(!provider.supports_embeddings());
    }

    #[test]
    fn any_debug_redacts_key() {
        let provider =
            AnyProvider::Gemini(GeminiProvider::new("super-secret".into(), "m".into(), "e".into()));
        assert!(!format!("{provider:?}").contains("super-secret"));
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn embed_fn_uses_bound_mode() {
        let mock = MockProvider::default().with_dimensions(4);
        let calls = mock.embed_calls.clone();
        let provider = AnyProvider::Mock(mock);
        let f = provider.embed_fn(EmbedMode::Document);
        let out = f(vec!["a".into(), "b".into()]).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn any_mock_generate_and_chat() {
        let provider = AnyProvider::Mock(MockProvider::with_responses(vec!["one".into()]));
        assert_eq!(provider.generate("p").await.unwrap(), "one");
        assert_eq!(
            provider.chat(&[Message::user("x")]).await.unwrap(),
            "mock response"
        );
    }
}
