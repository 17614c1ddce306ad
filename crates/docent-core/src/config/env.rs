use std::str::FromStr;

use serde::de::DeserializeOwned;

use super::Config;

/// Parsed value of `key`, or `None` (with a warning) when set but invalid.
fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

/// Lowercase enum variant named by `key`, parsed through its serde representation.
fn parse_env_enum<T: DeserializeOwned>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.trim().to_lowercase())) {
        Some(kind)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_storage();
        self.apply_env_overrides_serving();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Some(kind) = parse_env_enum("DOCENT_LLM_PROVIDER") {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Some(dims) = parse_env("DOCENT_LLM_DIMENSIONS") {
            self.llm.dimensions = dims;
        }
        if let Some(kind) = parse_env_enum("DOCENT_ROUTER_KIND") {
            self.router.kind = kind;
        }
        if let Some(kind) = parse_env_enum("DOCENT_ROUTER_PROVIDER") {
            self.router.provider = kind;
        }
        if let Ok(v) = std::env::var("DOCENT_ROUTER_BASE_URL") {
            self.router.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCENT_ROUTER_MODEL") {
            self.router.model = v;
        }
    }

    fn apply_env_overrides_storage(&mut self) {
        if let Some(backend) = parse_env_enum("DOCENT_STORE_BACKEND") {
            self.store.backend = backend;
        }
        if let Ok(v) = std::env::var("DOCENT_SQLITE_PATH") {
            self.store.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("DOCENT_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("DOCENT_DATA_DIR") {
            self.ingest.data_dir = v;
        }
        if let Some(size) = parse_env("DOCENT_CHUNK_SIZE") {
            self.ingest.chunk_size = size;
        }
        if let Some(overlap) = parse_env("DOCENT_CHUNK_OVERLAP") {
            self.ingest.chunk_overlap = overlap;
        }
        if let Some(n) = parse_env("DOCENT_INGEST_CONCURRENCY") {
            self.ingest.concurrency = n;
        }
        if let Some(k) = parse_env("DOCENT_TOP_K") {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("DOCENT_DEFAULT_COLLECTION") {
            self.catalog.default_collection = v;
        }
    }

    fn apply_env_overrides_serving(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = parse_env("DOCENT_GATEWAY_PORT") {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("DOCENT_CORS_ORIGINS") {
            self.gateway.cors_origins = split_list(&v);
        }
        if let Some(rate) = parse_env("DOCENT_GATEWAY_RATE_LIMIT") {
            self.gateway.rate_limit = rate;
        }
        if let Some(bytes) = parse_env("DOCENT_GATEWAY_MAX_BODY") {
            self.gateway.max_body_size = bytes;
        }
        if let Some(secs) = parse_env("DOCENT_SESSION_IDLE_TTL") {
            self.session.idle_ttl_secs = secs;
        }
        if let Some(n) = parse_env("DOCENT_SESSION_MAX_HISTORY") {
            self.session.max_history = n;
        }
        if let Ok(v) = std::env::var("DOCENT_OBSERVABILITY_EXPORTER") {
            self.observability.exporter = v;
        }
        if let Ok(v) = std::env::var("DOCENT_OTLP_ENDPOINT") {
            self.observability.endpoint = v;
        }
    }
}
