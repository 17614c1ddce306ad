use std::sync::Arc;

use docent_llm::LlmProvider;
use docent_llm::any::AnyProvider;
use docent_llm::provider::{ChatResponse, Message, ToolDefinition};
use schemars::JsonSchema;
use serde::Deserialize;

use super::{Route, RouteError, Router, last_user_message};
use crate::catalog::Catalog;
use crate::prompt::build_router_prompt;

pub const ROUTE_TOOL_NAME: &str = "get_answer_from_collection";

/// Arguments of the routing tool call.
#[derive(Debug, Deserialize, JsonSchema)]
struct CollectionQuery {
    /// Name of the document collection that best matches the question.
    collection_name: String,
    /// The user's question, rewritten to stand on its own.
    query: String,
}

fn route_tool() -> ToolDefinition {
    let mut parameters = serde_json::to_value(schemars::schema_for!(CollectionQuery))
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = parameters.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    ToolDefinition {
        name: ROUTE_TOOL_NAME.into(),
        description: "Answer the user's question from one document collection.".into(),
        parameters,
    }
}

/// Lets a tool-capable chat model pick the collection via `get_answer_from_collection`.
#[derive(Debug, Clone)]
pub struct LlmRouter {
    provider: AnyProvider,
    catalog: Arc<Catalog>,
    system_prompt: String,
    tool: ToolDefinition,
}

impl LlmRouter {
    #[must_use]
    pub fn new(provider: AnyProvider, catalog: Arc<Catalog>, instructions: &str) -> Self {
        let system_prompt = build_router_prompt(instructions, &catalog);
        Self {
            provider,
            catalog,
            system_prompt,
            tool: route_tool(),
        }
    }

    fn fallback(&self, query: &str) -> Route {
        Route {
            collection: self.catalog.default_collection.clone(),
            query: query.to_owned(),
        }
    }

    fn resolve(&self, call_input: serde_json::Value, user_query: &str) -> Route {
        let args: CollectionQuery = match serde_json::from_value(call_input) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("malformed routing arguments, using default collection: {e}");
                return self.fallback(user_query);
            }
        };
        let query = if args.query.trim().is_empty() {
            user_query.to_owned()
        } else {
            args.query
        };
        if self.catalog.contains(&args.collection_name) {
            Route {
                collection: args.collection_name,
                query,
            }
        } else {
            tracing::warn!(
                requested = %args.collection_name,
                default = %self.catalog.default_collection,
                "router chose unknown collection, using default"
            );
            Route {
                collection: self.catalog.default_collection.clone(),
                query,
            }
        }
    }
}

impl Router for LlmRouter {
    async fn route(&self, history: &[Message]) -> Result<Route, RouteError> {
        let user_query = last_user_message(history).ok_or(RouteError::NoUserMessage)?;

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);

        let response = self
            .provider
            .chat_with_tools(&messages, std::slice::from_ref(&self.tool))
            .await?;

        let route = match response {
            ChatResponse::ToolUse { tool_calls, .. } => {
                match tool_calls.into_iter().find(|c| c.name == ROUTE_TOOL_NAME) {
                    Some(call) => self.resolve(call.input, user_query),
                    None => {
                        tracing::warn!("router called an unknown tool, using default collection");
                        self.fallback(user_query)
                    }
                }
            }
            ChatResponse::Text(_) => {
                tracing::warn!("router answered without a tool call, using default collection");
                self.fallback(user_query)
            }
        };
        tracing::info!(collection = %route.collection, query = %route.query, "routed");
        Ok(route)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
