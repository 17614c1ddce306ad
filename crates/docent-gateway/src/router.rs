use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{chat_handler, health_handler, preflight_handler, welcome_handler};
use super::server::AppState;

#[derive(Clone)]
pub(crate) struct RouterSettings {
    pub auth_token: Option<String>,
    pub rate_limit: u32,
    pub max_body_size: usize,
    pub cors_origins: Vec<String>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            auth_token: None,
            rate_limit: 120,
            max_body_size: 1_048_576,
            cors_origins: vec!["*".into()],
        }
    }
}

#[derive(Clone)]
struct AuthConfig {
    token: Option<String>,
}

const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct RateLimitState {
    limit: u32,
    counters: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

pub(crate) fn build_router(state: AppState, settings: RouterSettings) -> Router {
    let auth_cfg = AuthConfig {
        token: settings.auth_token,
    };
    let rate_state = RateLimitState {
        limit: settings.rate_limit,
        counters: Arc::new(Mutex::new(HashMap::new())),
    };

    let protected = Router::new()
        .route("/chat", post(chat_handler).options(preflight_handler))
        .layer(middleware::from_fn_with_state(rate_state, rate_limit_middleware))
        .layer(middleware::from_fn_with_state(auth_cfg, auth_middleware))
        .layer(RequestBodyLimitLayer::new(settings.max_body_size));

    Router::new()
        .route("/", get(welcome_handler))
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&settings.cors_origins)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| tracing::warn!("ignoring invalid CORS origin '{origin}': {e}"))
                .ok()
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn auth_middleware(
    axum::extract::State(cfg): axum::extract::State<AuthConfig>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(ref expected) = cfg.token
        && req.method() != Method::OPTIONS
    {
        let auth_header = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        let token = auth_header
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");

        // Fixed-length digests so the comparison does not leak token length.
        let token_hash = blake3::hash(token.as_bytes());
        let expected_hash = blake3::hash(expected.as_bytes());
        if !bool::from(token_hash.as_bytes().ct_eq(expected_hash.as_bytes())) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    next.run(req).await
}

async fn rate_limit_middleware(
    axum::extract::State(state): axum::extract::State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.limit == 0 {
        return next.run(req).await;
    }

    let ip = req
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());

    let mut counters = state.counters.lock().await;
    let admitted = admit(
        &mut counters,
        ip,
        Instant::now(),
        state.limit,
        MAX_RATE_LIMIT_ENTRIES,
    );
    drop(counters);

    if !admitted {
        tracing::debug!(%ip, "rate limit exceeded");
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    next.run(req).await
}

/// Count one request from `ip` in the current window. Stale windows are pruned
/// when the table is full, and the oldest entry is evicted if that frees nothing.
fn admit(
    counters: &mut HashMap<IpAddr, (u32, Instant)>,
    ip: IpAddr,
    now: Instant,
    limit: u32,
    max_entries: usize,
) -> bool {
    if counters.len() >= max_entries && !counters.contains_key(&ip) {
        counters.retain(|_, (_, ts)| now.duration_since(*ts) < RATE_WINDOW);
        if counters.len() >= max_entries
            && let Some(oldest) = counters
                .iter()
                .min_by_key(|(_, (_, ts))| *ts)
                .map(|(addr, _)| *addr)
        {
            counters.remove(&oldest);
        }
    }

    let entry = counters.entry(ip).or_insert((0, now));
    if now.duration_since(entry.1) >= RATE_WINDOW {
        *entry = (1, now);
        return true;
    }
    entry.0 += 1;
    entry.0 <= limit
}
