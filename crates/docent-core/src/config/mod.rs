mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::router::RouterKind;
use crate::vault::{Secret, VaultProvider};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve API keys and the gateway token through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        for key in ["DOCENT_API_KEY", "GOOGLE_API_KEY"] {
            if let Some(val) = vault.get_secret(key).await? {
                self.secrets.api_key = Some(Secret::new(val));
                break;
            }
        }
        if let Some(val) = vault.get_secret("DOCENT_ROUTER_API_KEY").await? {
            self.secrets.router_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("DOCENT_GATEWAY_TOKEN").await? {
            self.secrets.gateway_token = Some(Secret::new(val));
        }
        Ok(())
    }

    /// Check parameter ranges, the catalog, and that remote providers have an API key.
    ///
    /// Call after [`resolve_secrets`](Self::resolve_secrets).
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be greater than 0");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be less than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        if self.ingest.concurrency == 0 {
            bail!("ingest.concurrency must be at least 1");
        }
        if self.llm.dimensions == 0 {
            bail!("llm.dimensions must be greater than 0");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.session.max_history == 0 {
            bail!("session.max_history must be at least 1");
        }
        self.catalog.validate().context("invalid catalog")?;

        if self.llm.provider.is_remote() && self.secrets.api_key.is_none() {
            bail!(
                "{} provider requires an API key (set GOOGLE_API_KEY or DOCENT_API_KEY)",
                self.llm.provider
            );
        }
        if self.router.kind == RouterKind::Llm
            && self.router.provider.is_remote()
            && self.secrets.router_key().is_none()
        {
            bail!("llm router requires an API key (set DOCENT_ROUTER_API_KEY or GOOGLE_API_KEY)");
        }
        Ok(())
    }
}
