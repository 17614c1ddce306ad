use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::prompt::DEFAULT_ROUTER_INSTRUCTIONS;
use crate::retrieval::DEFAULT_TOP_K;
use crate::router::RouterKind;
use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }

    /// Whether this backend needs an API key.
    #[must_use]
    pub fn is_remote(self) -> bool {
        !matches!(self, Self::Mock)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Gemini
}

fn default_chat_model() -> String {
    docent_llm::gemini::DEFAULT_CHAT_MODEL.into()
}

fn default_embedding_model() -> String {
    docent_llm::gemini::DEFAULT_EMBEDDING_MODEL.into()
}

fn default_dimensions() -> usize {
    docent_llm::gemini::DEFAULT_DIMENSIONS
}

fn default_max_retries() -> u32 {
    3
}

/// Embedding and answer-generation provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Overrides the provider's default endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_chat_model(),
            embedding_model: default_embedding_model(),
            dimensions: default_dimensions(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_router_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_router_base_url() -> String {
    docent_llm::openai::GEMINI_COMPAT_BASE_URL.into()
}

fn default_router_instructions() -> String {
    DEFAULT_ROUTER_INSTRUCTIONS.into()
}

fn default_router_max_tokens() -> u32 {
    1024
}

/// Collection router; the `llm` kind talks to a tool-capable chat model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub kind: RouterKind,
    #[serde(default = "default_router_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_router_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_router_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_router_instructions")]
    pub instructions: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            kind: RouterKind::default(),
            provider: default_router_provider(),
            base_url: default_router_base_url(),
            model: default_chat_model(),
            max_tokens: default_router_max_tokens(),
            instructions: default_router_instructions(),
        }
    }
}

/// Vector store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Qdrant,
    Memory,
}

impl StoreBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Qdrant => "qdrant",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_sqlite_path() -> String {
    "data/docent.db".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            qdrant_url: default_qdrant_url(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_max_file_size() -> u64 {
    docent_index::document::DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub boundary_aware: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            boundary_aware: true,
            concurrency: default_concurrency(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_gateway_rate_limit() -> u32 {
    120
}

fn default_gateway_max_body() -> usize {
    1_048_576
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Requests per minute per client IP; 0 disables limiting.
    #[serde(default = "default_gateway_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            cors_origins: default_cors_origins(),
            rate_limit: default_gateway_rate_limit(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

fn default_idle_ttl_secs() -> u64 {
    3600
}

fn default_max_history() -> usize {
    50
}

fn default_sweep_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            max_history: default_max_history(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// `""` for none, `"otlp"` to export spans.
    #[serde(default)]
    pub exporter: String,
    #[serde(default = "default_otlp_endpoint")]
    pub endpoint: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            exporter: String::new(),
            endpoint: default_otlp_endpoint(),
        }
    }
}

/// Secrets resolved through the vault after loading; never read from or written to TOML.
#[derive(Debug, Default, Clone)]
pub struct ResolvedSecrets {
    pub api_key: Option<Secret>,
    pub router_api_key: Option<Secret>,
    pub gateway_token: Option<Secret>,
}

impl ResolvedSecrets {
    /// Router key, falling back to the main provider key.
    #[must_use]
    pub fn router_key(&self) -> Option<&Secret> {
        self.router_api_key.as_ref().or(self.api_key.as_ref())
    }
}
