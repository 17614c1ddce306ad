use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use docent_core::ChatHandler;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::{RouterSettings, build_router};

#[derive(Clone)]
pub(crate) struct AppState {
    pub chat: Arc<dyn ChatHandler>,
    pub started_at: Instant,
}

pub struct GatewayServer {
    addr: SocketAddr,
    settings: RouterSettings,
    chat: Arc<dyn ChatHandler>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        chat: Arc<dyn ChatHandler>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, reachable from other hosts");
        }

        Self {
            addr,
            settings: RouterSettings::default(),
            chat,
            shutdown_rx,
        }
    }

    /// Require `Authorization: Bearer <token>` on `/chat`.
    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.settings.auth_token = token;
        self
    }

    /// Requests per minute per client IP; `0` disables limiting.
    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.settings.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.settings.max_body_size = size;
        self
    }

    /// Allowed CORS origins; `*` allows any.
    #[must_use]
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.settings.cors_origins = origins;
        self
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the HTTP gateway server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            chat: self.chat,
            started_at: Instant::now(),
        };

        let router = build_router(state, self.settings);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("gateway listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("gateway shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;

    use docent_core::ChatError;

    use super::*;

    struct Silent;

    impl ChatHandler for Silent {
        fn chat<'a>(
            &'a self,
            _session_id: &'a str,
            _message: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<String, ChatError>> + Send + 'a>> {
            Box::pin(async { Ok(String::new()) })
        }
    }

    #[test]
    fn server_builder_chain() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 8090, Arc::new(Silent), srx)
            .with_auth(Some("token".into()))
            .with_rate_limit(60)
            .with_max_body_size(512)
            .with_cors_origins(vec!["https://docs.example".into()]);

        assert_eq!(server.settings.rate_limit, 60);
        assert_eq!(server.settings.max_body_size, 512);
        assert!(server.settings.auth_token.is_some());
        assert_eq!(server.settings.cors_origins, vec!["https://docs.example"]);
        assert_eq!(server.local_addr().port(), 8090);
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("not_an_ip", 9999, Arc::new(Silent), srx);
        assert_eq!(
            server.local_addr(),
            SocketAddr::from(([127, 0, 0, 1], 9999))
        );
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let (stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 0, Arc::new(Silent), srx);
        let handle = tokio::spawn(server.serve());
        stx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
