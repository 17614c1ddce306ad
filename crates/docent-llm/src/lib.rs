//! Embedding and generation provider abstraction and backend implementations.

pub mod any;
pub mod error;
pub mod gemini;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
mod retry;

pub use error::LlmError;
pub use provider::{EmbedMode, Embedder, Generator, LlmProvider};
