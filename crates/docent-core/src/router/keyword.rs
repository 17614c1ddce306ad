use std::sync::Arc;

use docent_llm::provider::Message;

use super::{Route, RouteError, Router, last_user_message};
use crate::catalog::Catalog;

/// Offline router: counts catalog keywords in the last user message.
///
/// A unique best score wins; ties and zero scores fall back to the catalog default.
#[derive(Debug, Clone)]
pub struct KeywordRouter {
    catalog: Arc<Catalog>,
}

impl KeywordRouter {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> &str {
        let text = text.to_lowercase();
        let mut best: Option<(&str, usize)> = None;
        let mut tied = false;
        for entry in &self.catalog.collections {
            let score = entry
                .keywords
                .iter()
                .filter(|kw| !kw.is_empty() && text.contains(kw.to_lowercase().as_str()))
                .count();
            match best {
                _ if score == 0 => {}
                Some((_, top)) if score < top => {}
                Some((_, top)) if score == top => tied = true,
                _ => {
                    best = Some((entry.name.as_str(), score));
                    tied = false;
                }
            }
        }
        match best {
            Some((name, _)) if !tied => name,
            _ => &self.catalog.default_collection,
        }
    }
}

impl Router for KeywordRouter {
    async fn route(&self, history: &[Message]) -> Result<Route, RouteError> {
        let query = last_user_message(history).ok_or(RouteError::NoUserMessage)?;
        let collection = self.classify(query).to_owned();
        tracing::debug!(collection = %collection, "keyword route");
        Ok(Route {
            collection,
            query: query.to_owned(),
        })
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
