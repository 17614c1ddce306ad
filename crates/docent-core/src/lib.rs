//! Configuration, collection routing, retrieval-augmented answering and chat sessions.

pub mod bootstrap;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod prompt;
pub mod retrieval;
pub mod router;
pub mod session;
pub mod vault;

pub use catalog::{Catalog, CollectionEntry};
pub use chat::{ChatError, ChatHandler, ChatService};
pub use config::Config;
pub use retrieval::{AnswerError, Retriever};
pub use router::{AnyRouter, Route, RouteError, Router};
pub use session::{InMemorySessionStore, SessionStore};
