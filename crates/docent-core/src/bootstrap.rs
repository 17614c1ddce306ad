//! Application bootstrap: config resolution and provider/store/service construction.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use docent_index::document::loader::default_loaders;
use docent_index::document::{IngestionPipeline, SplitterConfig, TextSplitter};
use docent_index::{InMemoryVectorStore, QdrantOps, SqliteVectorStore, VectorIndex, VectorStore};
use docent_llm::any::AnyProvider;
use docent_llm::gemini::GeminiProvider;
use docent_llm::openai::{GEMINI_COMPAT_BASE_URL, OpenAiProvider};
use docent_llm::{EmbedMode, Embedder};
use tokio::sync::watch;

use crate::catalog::Catalog;
use crate::chat::ChatService;
use crate::config::{Config, ProviderKind, StoreBackend};
use crate::retrieval::Retriever;
use crate::router::{AnyRouter, FixedRouter, KeywordRouter, LlmRouter, RouterKind};
use crate::session::InMemorySessionStore;
use crate::vault::{EnvVaultProvider, Secret, VaultProvider};

pub struct AppBuilder {
    config: Config,
}

impl AppBuilder {
    /// Load `path`, apply env overrides, resolve secrets from the environment and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed or fails validation.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        Self::load_with_vault(path, &EnvVaultProvider).await
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed, the vault fails, or validation fails.
    pub async fn load_with_vault(path: &Path, vault: &dyn VaultProvider) -> anyhow::Result<Self> {
        let mut config = Config::load(path)?;
        config.resolve_secrets(vault).await?;
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// # Errors
    ///
    /// Returns an error if the provider is unavailable or lacks an API key.
    pub fn build_provider(&self) -> anyhow::Result<AnyProvider> {
        create_provider(&self.config)
    }

    /// # Errors
    ///
    /// Returns an error if the configured store cannot be opened.
    pub async fn build_index(&self) -> anyhow::Result<VectorIndex> {
        let store = create_store(&self.config).await?;
        Ok(VectorIndex::new(store, self.config.llm.dimensions))
    }

    #[must_use]
    pub fn build_pipeline(&self, index: VectorIndex, provider: &AnyProvider) -> IngestionPipeline {
        let ingest = &self.config.ingest;
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: ingest.chunk_size,
            chunk_overlap: ingest.chunk_overlap,
            boundary_aware: ingest.boundary_aware,
        });
        IngestionPipeline::new(
            splitter,
            index,
            default_loaders(ingest.max_file_size),
            provider.embed_fn(EmbedMode::Document),
        )
        .with_concurrency(ingest.concurrency)
    }

    #[must_use]
    pub fn build_retriever(&self, index: VectorIndex, provider: AnyProvider) -> Retriever {
        Retriever::new(index, provider).with_top_k(self.config.retrieval.top_k)
    }

    /// # Errors
    ///
    /// Returns an error if the LLM router's provider cannot be created.
    pub fn build_router(&self) -> anyhow::Result<AnyRouter> {
        let catalog = Arc::new(self.config.catalog.clone());
        create_router(&self.config, catalog)
    }

    #[must_use]
    pub fn build_sessions(&self) -> Arc<InMemorySessionStore> {
        Arc::new(InMemorySessionStore::new(
            Duration::from_secs(self.config.session.idle_ttl_secs),
            self.config.session.max_history,
        ))
    }

    /// Wire provider, store, router, retriever and sessions into one chat service.
    ///
    /// # Errors
    ///
    /// Returns an error if any component cannot be built.
    pub async fn build_chat_service(
        &self,
        sessions: Arc<InMemorySessionStore>,
    ) -> anyhow::Result<ChatService> {
        let provider = self.build_provider()?;
        let index = self.build_index().await?;
        let router = self.build_router()?;
        let retriever = self.build_retriever(index, provider);
        Ok(ChatService::new(router, retriever, sessions))
    }

    #[must_use]
    pub fn build_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }
}

fn require_key(key: Option<&Secret>, what: &str) -> anyhow::Result<String> {
    key.map(|s| s.expose().to_owned())
        .with_context(|| format!("{what} requires an API key"))
}

/// Embedding and generation provider from `[llm]`.
///
/// # Errors
///
/// Returns an error if the API key is missing or the provider is not compiled in.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Gemini => {
            let key = require_key(config.secrets.api_key.as_ref(), "gemini provider")?;
            let mut provider =
                GeminiProvider::new(key, llm.model.clone(), llm.embedding_model.clone())
                    .with_dimensions(llm.dimensions)
                    .with_max_retries(llm.max_retries);
            if let Some(ref url) = llm.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(AnyProvider::Gemini(provider))
        }
        ProviderKind::OpenAi => {
            let key = require_key(config.secrets.api_key.as_ref(), "openai provider")?;
            let base_url = llm
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_COMPAT_BASE_URL.into());
            let provider = OpenAiProvider::new(key, base_url, llm.model.clone())
                .with_embedding_model(llm.embedding_model.clone(), llm.dimensions)
                .with_max_retries(llm.max_retries);
            Ok(AnyProvider::OpenAi(provider))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(
            docent_llm::mock::MockProvider::default().with_dimensions(llm.dimensions),
        )),
        #[allow(unreachable_patterns)]
        other => bail!("LLM provider {other} not available (feature not enabled)"),
    }
}

/// Tool-calling chat provider for the LLM router, from `[router]`.
///
/// # Errors
///
/// Returns an error if the API key is missing or the provider is not compiled in.
pub fn create_router_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let router = &config.router;
    match router.provider {
        ProviderKind::OpenAi => {
            let key = require_key(config.secrets.router_key(), "llm router")?;
            let provider = OpenAiProvider::new(key, router.base_url.clone(), router.model.clone())
                .with_max_tokens(router.max_tokens)
                .with_max_retries(config.llm.max_retries);
            Ok(AnyProvider::OpenAi(provider))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(docent_llm::mock::MockProvider::default())),
        other => bail!("router provider {other} does not support tool calling"),
    }
}

/// # Errors
///
/// Returns an error if the LLM router's provider cannot be created.
pub fn create_router(config: &Config, catalog: Arc<Catalog>) -> anyhow::Result<AnyRouter> {
    let router = match config.router.kind {
        RouterKind::Llm => {
            let provider = create_router_provider(config)?;
            let llm = LlmRouter::new(provider, catalog, &config.router.instructions);
            AnyRouter::Llm(Box::new(llm))
        }
        RouterKind::Keyword => AnyRouter::Keyword(KeywordRouter::new(catalog)),
        RouterKind::Fixed => AnyRouter::Fixed(FixedRouter::new(catalog.default_collection.clone())),
    };
    tracing::info!(router = %config.router.kind, "collection router ready");
    Ok(router)
}

/// # Errors
///
/// Returns an error if the backend cannot be opened or reached.
pub async fn create_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            let path = &config.store.sqlite_path;
            if path != ":memory:"
                && let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            Arc::new(
                SqliteVectorStore::open(path)
                    .await
                    .with_context(|| format!("failed to open vector store at {path}"))?,
            )
        }
        StoreBackend::Qdrant => {
            let url = &config.store.qdrant_url;
            let ops = QdrantOps::new(url)
                .with_context(|| format!("failed to connect to qdrant at {url}"))?;
            Arc::new(ops)
        }
        StoreBackend::Memory => Arc::new(InMemoryVectorStore::new()),
    };
    tracing::info!(backend = %config.store.backend, "vector store ready");
    Ok(store)
}

/// Log whether the provider can embed; failures are not fatal.
pub async fn warmup_provider(provider: &AnyProvider) {
    if !provider.supports_embeddings() {
        tracing::warn!("provider does not support embeddings");
        return;
    }
    match provider.embed(&["ping".to_owned()], EmbedMode::Query).await {
        Ok(v) => {
            let dimensions = v.first().map_or(0, Vec::len);
            tracing::info!(dimensions, "embedding provider reachable");
        }
        Err(e) => tracing::warn!("embedding provider warmup failed: {e}"),
    }
}
