//! Collection routing: pick the collection and standalone query for a chat turn.

mod keyword;
mod llm;

use std::future::Future;

use docent_llm::LlmError;
use docent_llm::provider::{Message, Role};
use serde::{Deserialize, Serialize};

pub use keyword::KeywordRouter;
pub use llm::{LlmRouter, ROUTE_TOOL_NAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub collection: String,
    pub query: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("history contains no user message")]
    NoUserMessage,

    #[error("router model failed: {0}")]
    Llm(#[from] LlmError),
}

/// Router variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    #[default]
    Llm,
    Keyword,
    Fixed,
}

impl RouterKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Keyword => "keyword",
            Self::Fixed => "fixed",
        }
    }
}

impl std::fmt::Display for RouterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Router: Send + Sync {
    /// Choose a collection and query for the latest user message in `history`.
    fn route(&self, history: &[Message]) -> impl Future<Output = Result<Route, RouteError>> + Send;

    fn name(&self) -> &'static str;
}

/// Content of the most recent user message.
#[must_use]
pub fn last_user_message(history: &[Message]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

/// Always routes to one collection with the user's own words.
#[derive(Debug, Clone)]
pub struct FixedRouter {
    collection: String,
}

impl FixedRouter {
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

impl Router for FixedRouter {
    async fn route(&self, history: &[Message]) -> Result<Route, RouteError> {
        let query = last_user_message(history).ok_or(RouteError::NoUserMessage)?;
        Ok(Route {
            collection: self.collection.clone(),
            query: query.to_owned(),
        })
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[derive(Debug, Clone)]
pub enum AnyRouter {
    Llm(Box<LlmRouter>),
    Keyword(KeywordRouter),
    Fixed(FixedRouter),
}

impl Router for AnyRouter {
    async fn route(&self, history: &[Message]) -> Result<Route, RouteError> {
        match self {
            Self::Llm(r) => r.route(history).await,
            Self::Keyword(r) => r.route(history).await,
            Self::Fixed(r) => r.route(history).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Llm(r) => r.name(),
            Self::Keyword(r) => r.name(),
            Self::Fixed(r) => r.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_message_skips_assistant_turns() {
        let history = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
            Message::assistant("reply 2"),
        ];
        assert_eq!(last_user_message(&history), Some("second"));
        assert_eq!(last_user_message(&[Message::assistant("x")]), None);
    }

    #[tokio::test]
    async fn fixed_router_uses_configured_collection() {
        let router = AnyRouter::Fixed(FixedRouter::new("FAQs_DocuMedAi"));
        let route = router
            .route(&[Message::user("What is DocuMed?")])
            .await
            .unwrap();
        assert_eq!(
            route,
            Route {
                collection: "FAQs_DocuMedAi".into(),
                query: "What is DocuMed?".into(),
            }
        );
        assert_eq!(router.name(), "fixed");
    }

    #[tokio::test]
    async fn empty_history_is_an_error() {
        let router = FixedRouter::new("a");
        assert!(matches!(router.route(&[]).await, Err(RouteError::NoUserMessage)));
    }

    #[test]
    fn router_kind_parses_lowercase() {
        let kind: RouterKind = serde_json::from_str("\"keyword\"").unwrap();
        assert_eq!(kind, RouterKind::Keyword);
        assert_eq!(RouterKind::default().to_string(), "llm");
    }
}
