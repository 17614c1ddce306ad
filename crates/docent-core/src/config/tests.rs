use std::io::Write;

use serial_test::serial;

use super::*;
use crate::vault::MockVaultProvider;

const ENV_KEYS: [&str; 29] = [
    "DOCENT_LLM_PROVIDER",
    "DOCENT_LLM_BASE_URL",
    "DOCENT_LLM_MODEL",
    "DOCENT_LLM_EMBEDDING_MODEL",
    "DOCENT_LLM_DIMENSIONS",
    "DOCENT_ROUTER_KIND",
    "DOCENT_ROUTER_PROVIDER",
    "DOCENT_ROUTER_BASE_URL",
    "DOCENT_ROUTER_MODEL",
    "DOCENT_STORE_BACKEND",
    "DOCENT_SQLITE_PATH",
    "DOCENT_QDRANT_URL",
    "DOCENT_DATA_DIR",
    "DOCENT_CHUNK_SIZE",
    "DOCENT_CHUNK_OVERLAP",
    "DOCENT_INGEST_CONCURRENCY",
    "DOCENT_TOP_K",
    "DOCENT_DEFAULT_COLLECTION",
    "DOCENT_GATEWAY_BIND",
    "DOCENT_GATEWAY_PORT",
    "DOCENT_CORS_ORIGINS",
    "DOCENT_GATEWAY_RATE_LIMIT",
    "DOCENT_GATEWAY_MAX_BODY",
    "DOCENT_SESSION_IDLE_TTL",
    "DOCENT_SESSION_MAX_HISTORY",
    "DOCENT_OBSERVABILITY_EXPORTER",
    "DOCENT_OTLP_ENDPOINT",
    "DOCENT_API_KEY",
    "GOOGLE_API_KEY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn with_key(mut config: Config) -> Config {
    config.secrets.api_key = Some(Secret::new("test-key"));
    config
}

#[test]
#[serial]
fn defaults_when_file_missing() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/docent.toml")).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Gemini);
    assert_eq!(config.llm.model, "gemini-2.5-flash");
    assert_eq!(config.llm.embedding_model, "gemini-embedding-001");
    assert_eq!(config.llm.dimensions, 3072);
    assert_eq!(config.router.kind, RouterKind::Llm);
    assert_eq!(config.router.provider, ProviderKind::OpenAi);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.ingest.chunk_size, 1000);
    assert_eq!(config.ingest.chunk_overlap, 200);
    assert_eq!(config.ingest.concurrency, 1);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.catalog.default_collection, "FAQs_DocuMedAi");
    assert_eq!(config.gateway.cors_origins, vec!["*"]);
    assert_eq!(config.session.idle_ttl_secs, 3600);
    assert_eq!(config.session.max_history, 50);
    assert!(config.secrets.api_key.is_none());
}

#[test]
#[serial]
fn parse_toml_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
provider = "openai"
base_url = "http://localhost:8080/v1"
model = "gpt-4o-mini"
dimensions = 768

[router]
kind = "keyword"

[store]
backend = "memory"

[ingest]
data_dir = "docs"
chunk_size = 500
chunk_overlap = 50

[retrieval]
top_k = 3

[catalog]
default_collection = "general"

[[catalog.collections]]
name = "general"
description = "Everything else"

[[catalog.collections]]
name = "billing"
description = "Invoices and plans"
keywords = ["invoice", "plan"]

[gateway]
port = 9000
cors_origins = ["https://example.com"]
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(
        config.llm.base_url.as_deref(),
        Some("http://localhost:8080/v1")
    );
    assert_eq!(config.llm.dimensions, 768);
    assert_eq!(config.llm.embedding_model, "gemini-embedding-001");
    assert_eq!(config.router.kind, RouterKind::Keyword);
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.ingest.data_dir, "docs");
    assert_eq!(config.ingest.chunk_size, 500);
    assert!(config.ingest.boundary_aware);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.catalog.collections.len(), 2);
    assert_eq!(
        config.catalog.collections[1].keywords,
        vec!["invoice", "plan"]
    );
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.bind, "127.0.0.1");
    assert_eq!(config.session.max_history, 50);
    with_key(config).validate().unwrap();
}

#[test]
#[serial]
fn malformed_toml_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[llm\nprovider = ").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
#[serial]
fn env_overrides_apply() {
    clear_env();
    unsafe {
        std::env::set_var("DOCENT_LLM_PROVIDER", "OpenAI");
        std::env::set_var("DOCENT_LLM_BASE_URL", "http://llm.local/v1");
        std::env::set_var("DOCENT_STORE_BACKEND", "qdrant");
        std::env::set_var("DOCENT_QDRANT_URL", "http://qdrant:6334");
        std::env::set_var("DOCENT_SQLITE_PATH", "/tmp/x.db");
        std::env::set_var("DOCENT_DATA_DIR", "/srv/docs");
        std::env::set_var("DOCENT_GATEWAY_PORT", "8181");
        std::env::set_var(
            "DOCENT_CORS_ORIGINS",
            "https://a.example, https://b.example,",
        );
        std::env::set_var("DOCENT_TOP_K", "7");
        std::env::set_var("DOCENT_ROUTER_KIND", "fixed");
    }
    let config = Config::load(Path::new("/nonexistent/docent.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.base_url.as_deref(), Some("http://llm.local/v1"));
    assert_eq!(config.store.backend, StoreBackend::Qdrant);
    assert_eq!(config.store.qdrant_url, "http://qdrant:6334");
    assert_eq!(config.store.sqlite_path, "/tmp/x.db");
    assert_eq!(config.ingest.data_dir, "/srv/docs");
    assert_eq!(config.gateway.port, 8181);
    assert_eq!(
        config.gateway.cors_origins,
        vec!["https://a.example", "https://b.example"]
    );
    assert_eq!(config.retrieval.top_k, 7);
    assert_eq!(config.router.kind, RouterKind::Fixed);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("DOCENT_LLM_PROVIDER", "llama-farm");
        std::env::set_var("DOCENT_GATEWAY_PORT", "not-a-port");
        std::env::set_var("DOCENT_CHUNK_SIZE", "-3");
        std::env::set_var("DOCENT_STORE_BACKEND", "postgres");
    }
    let config = Config::load(Path::new("/nonexistent/docent.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Gemini);
    assert_eq!(config.gateway.port, 8000);
    assert_eq!(config.ingest.chunk_size, 1000);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
}

#[tokio::test]
async fn resolve_secrets_prefers_docent_key() {
    let vault = MockVaultProvider::new()
        .with_secret("DOCENT_API_KEY", "docent-key")
        .with_secret("GOOGLE_API_KEY", "google-key")
        .with_secret("DOCENT_GATEWAY_TOKEN", "tok");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert_eq!(
        config.secrets.api_key.as_ref().unwrap().expose(),
        "docent-key"
    );
    assert_eq!(config.secrets.router_key().unwrap().expose(), "docent-key");
    assert_eq!(
        config.secrets.gateway_token.as_ref().unwrap().expose(),
        "tok"
    );
}

#[tokio::test]
async fn resolve_secrets_falls_back_to_google_key() {
    let vault = MockVaultProvider::new()
        .with_secret("GOOGLE_API_KEY", "google-key")
        .with_secret("DOCENT_ROUTER_API_KEY", "router-key");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert_eq!(
        config.secrets.api_key.as_ref().unwrap().expose(),
        "google-key"
    );
    assert_eq!(config.secrets.router_key().unwrap().expose(), "router-key");
    assert!(config.secrets.gateway_token.is_none());
}

#[test]
fn secrets_are_redacted_in_debug() {
    let config = with_key(Config::default());
    let debug = format!("{config:?}");
    assert!(!debug.contains("test-key"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn validate_accepts_defaults_with_key() {
    with_key(Config::default()).validate().unwrap();
}

#[test]
fn validate_requires_api_key_for_remote_provider() {
    let err = Config::default().validate().unwrap_err();
    assert!(err.to_string().contains("API key"));

    let mut config = Config::default();
    config.llm.provider = ProviderKind::Mock;
    config.router.kind = RouterKind::Keyword;
    config.validate().unwrap();
}

#[test]
fn validate_rejects_llm_router_without_key() {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::Mock;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("router"));
}

#[test]
fn validate_rejects_bad_chunking() {
    let mut config = with_key(Config::default());
    config.ingest.chunk_overlap = config.ingest.chunk_size;
    assert!(config.validate().is_err());

    let mut config = with_key(Config::default());
    config.ingest.chunk_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_zero_top_k_and_dimensions() {
    let mut config = with_key(Config::default());
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = with_key(Config::default());
    config.llm.dimensions = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_unknown_default_collection() {
    let mut config = with_key(Config::default());
    config.catalog.default_collection = "Recipes".into();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("catalog"));
}

#[test]
fn config_serialize_roundtrip() {
    let config = Config::default();
    let toml_str = toml::to_string_pretty(&config).expect("serialize");
    let back: Config = toml::from_str(&toml_str).expect("deserialize");
    assert_eq!(back.llm.provider, config.llm.provider);
    assert_eq!(back.llm.model, config.llm.model);
    assert_eq!(back.store.sqlite_path, config.store.sqlite_path);
    assert_eq!(back.catalog, config.catalog);
    assert_eq!(back.router.instructions, config.router.instructions);
}
