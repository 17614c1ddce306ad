use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use docent_llm::provider::Message;

use crate::retrieval::{AnswerError, Retriever};
use crate::router::{AnyRouter, RouteError, Router};
use crate::session::{SessionError, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Object-safe chat entry point consumed by the HTTP gateway.
pub trait ChatHandler: Send + Sync {
    fn chat<'a>(
        &'a self,
        session_id: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ChatError>> + Send + 'a>>;
}

/// One chat turn: record the message, route, answer, record the answer.
pub struct ChatService {
    router: AnyRouter,
    retriever: Retriever,
    sessions: Arc<dyn SessionStore>,
}

impl ChatService {
    #[must_use]
    pub fn new(router: AnyRouter, retriever: Retriever, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            router,
            retriever,
            sessions,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// # Errors
    ///
    /// Returns [`ChatError::EmptyMessage`] for blank input; routing, retrieval and session
    /// failures otherwise. The user message stays in history when a later step fails.
    pub async fn handle(&self, session_id: &str, message: &str) -> Result<String, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.sessions
            .append(session_id, vec![Message::user(message)])
            .await?;
        let history = self.sessions.get(session_id).await?;

        let route = self.router.route(&history).await?;
        let answer = self
            .retriever
            .answer(&route.collection, &route.query)
            .await?;

        self.sessions
            .append(session_id, vec![Message::assistant(answer.clone())])
            .await?;
        tracing::info!(
            session_id,
            router = self.router.name(),
            collection = %route.collection,
            "chat turn answered"
        );
        Ok(answer)
    }
}

impl ChatHandler for ChatService {
    fn chat<'a>(
        &'a self,
        session_id: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ChatError>> + Send + 'a>> {
        Box::pin(self.handle(session_id, message))
    }
}
