//! HTTP chat API: `/chat` backed by a [`docent_core::ChatHandler`], plus liveness endpoints.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use server::GatewayServer;
