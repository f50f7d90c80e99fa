//! Runtime configuration for the retriever.
//!
//! A [`CodeInsightConfig`] is built from defaults, an optional TOML file and
//! environment overrides, in that order, and is then handed to the
//! components that need it. There is no process-wide settings object.
//!
//! ```toml
//! vector_db_path = "/var/lib/codeinsight"
//! index_name = "codeinsight_codebase"
//! embedding_model = "all-MiniLM-L6-v2"
//! use_remote_embeddings = false
//! chunk_lines = 50
//!
//! [remote]
//! base_url = "https://api.mistral.ai"
//! embedding_model = "mistral-embed"
//! max_retries = 3
//! ```

use crate::error::{Result, RetrieverError};
use codeinsight_context::DEFAULT_CHUNK_LINES;
use codeinsight_embed::{
    CachedEmbeddingProvider, EmbedConfig, EmbeddingProvider, FastEmbedProvider,
    HashingEmbedProvider, RemoteEmbedConfig, RemoteEmbedProvider,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the index used when none is configured.
pub const DEFAULT_INDEX_NAME: &str = "codeinsight_codebase";

/// `embedding_model` value selecting the offline hashing provider.
pub const HASHING_MODEL: &str = "hashing";

pub const ENV_VECTOR_DB_PATH: &str = "CODEINSIGHT_VECTOR_DB_PATH";
pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const ENV_API_KEY: &str = "MISTRAL_API_KEY";
pub const ENV_USE_REMOTE: &str = "USE_MISTRAL_EMBEDDINGS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeInsightConfig {
    /// Directory holding `codeinsight.db`
    pub vector_db_path: PathBuf,
    /// Collection the index reads and writes
    pub index_name: String,
    /// Local model name, or `hashing` for the offline provider
    pub embedding_model: String,
    /// Where fastembed keeps downloaded model files
    pub model_cache_dir: Option<PathBuf>,
    /// Use the remote embedding API instead of a local model
    pub use_remote_embeddings: bool,
    pub remote: RemoteEmbedConfig,
    /// Lines per chunk for files without a language strategy
    pub chunk_lines: usize,
}

impl Default for CodeInsightConfig {
    fn default() -> Self {
        Self {
            vector_db_path: home_dir().join(".codeinsight").join("vectordb"),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            embedding_model: codeinsight_embed::config::DEFAULT_MODEL_NAME.to_string(),
            model_cache_dir: None,
            use_remote_embeddings: false,
            remote: RemoteEmbedConfig::default(),
            chunk_lines: DEFAULT_CHUNK_LINES,
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Expands a leading `~` to the home directory.
fn expand_path(path: &str) -> PathBuf {
    if path == "~" {
        home_dir()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(path)
    }
}

impl CodeInsightConfig {
    /// `~/.codeinsight/config.toml`
    pub fn default_path() -> PathBuf {
        home_dir().join(".codeinsight").join("config.toml")
    }

    /// Loads `path` (or the default file when it exists), then applies the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)
            .map_err(|e| RetrieverError::invalid_config(format!("Failed to parse config: {e}")))?;
        if let Some(path) = config.vector_db_path.to_str() {
            config.vector_db_path = expand_path(path);
        }
        Ok(config)
    }

    /// Overrides fields from variables returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_VECTOR_DB_PATH).filter(|v| !v.is_empty()) {
            self.vector_db_path = expand_path(&path);
        }
        if let Some(model) = lookup(ENV_EMBEDDING_MODEL).filter(|v| !v.is_empty()) {
            self.embedding_model = model;
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.remote.api_key = key;
        }
        if let Some(flag) = lookup(ENV_USE_REMOTE) {
            self.use_remote_embeddings = matches!(flag.to_lowercase().as_str(), "true" | "1");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(RetrieverError::invalid_config("index_name must not be empty"));
        }
        if self.chunk_lines == 0 {
            return Err(RetrieverError::invalid_config("chunk_lines must be positive"));
        }
        if self.use_remote_embeddings && self.remote.api_key.trim().is_empty() {
            return Err(RetrieverError::invalid_config(format!(
                "remote embeddings need an API key; set {ENV_API_KEY}"
            )));
        }
        Ok(())
    }

    pub fn embed_config(&self) -> EmbedConfig {
        let config = EmbedConfig::new(&self.embedding_model);
        match &self.model_cache_dir {
            Some(dir) => config.with_cache_dir(dir),
            None => config,
        }
    }

    /// Builds the configured embedding provider, memoised by input text.
    pub async fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = if self.use_remote_embeddings {
            tracing::info!(
                "Using remote embeddings: {} at {}",
                self.remote.embedding_model,
                self.remote.base_url
            );
            let remote = RemoteEmbedProvider::new(self.remote.clone())?;
            Arc::new(CachedEmbeddingProvider::new(remote))
        } else if self.embedding_model.eq_ignore_ascii_case(HASHING_MODEL) {
            tracing::info!("Using offline hashing embeddings");
            Arc::new(HashingEmbedProvider::default())
        } else {
            let local = FastEmbedProvider::create(self.embed_config()).await?;
            Arc::new(CachedEmbeddingProvider::new(local))
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CodeInsightConfig::default();
        assert_eq!(config.index_name, "codeinsight_codebase");
        assert_eq!(config.embedding_model, "all-MiniLM-L6-v2");
        assert_eq!(config.chunk_lines, 50);
        assert!(!config.use_remote_embeddings);
        assert!(config.vector_db_path.ends_with(".codeinsight/vectordb"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CodeInsightConfig::from_toml(
            r#"
            index_name = "project"
            vector_db_path = "~/indexes"

            [remote]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.index_name, "project");
        assert_eq!(config.vector_db_path, home_dir().join("indexes"));
        assert_eq!(config.remote.max_retries, 5);
        assert_eq!(config.remote.embedding_model, "mistral-embed");
        assert_eq!(config.chunk_lines, 50);
    }

    #[test]
    fn test_invalid_toml() {
        let err = CodeInsightConfig::from_toml("chunk_lines = \"many\"").unwrap_err();
        assert!(matches!(err, RetrieverError::InvalidConfig { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CodeInsightConfig::default();
        config.apply_env(env(&[
            ("CODEINSIGHT_VECTOR_DB_PATH", "/tmp/vectors"),
            ("EMBEDDING_MODEL", "bge-small-en-v1.5"),
            ("MISTRAL_API_KEY", "secret"),
            ("USE_MISTRAL_EMBEDDINGS", "TRUE"),
        ]));

        assert_eq!(config.vector_db_path, PathBuf::from("/tmp/vectors"));
        assert_eq!(config.embedding_model, "bge-small-en-v1.5");
        assert_eq!(config.remote.api_key, "secret");
        assert!(config.use_remote_embeddings);
        assert!(config.validate().is_ok());

        config.apply_env(env(&[("USE_MISTRAL_EMBEDDINGS", "no")]));
        assert!(!config.use_remote_embeddings);
    }

    #[test]
    fn test_remote_without_key_is_invalid() {
        let mut config = CodeInsightConfig::default();
        config.apply_env(env(&[("USE_MISTRAL_EMBEDDINGS", "true")]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "embedding_model = \"hashing\"\nchunk_lines = 10\n").unwrap();

        let config = CodeInsightConfig::from_file(&path).unwrap();
        assert_eq!(config.embedding_model, "hashing");
        assert_eq!(config.chunk_lines, 10);

        let missing = CodeInsightConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(RetrieverError::Io { .. })));
    }

    #[tokio::test]
    async fn test_hashing_provider_needs_no_model() {
        let config = CodeInsightConfig {
            embedding_model: "hashing".to_string(),
            ..CodeInsightConfig::default()
        };
        let provider = config.embedding_provider().await.unwrap();
        assert_eq!(provider.provider_name(), "hashing");
        assert_eq!(provider.embedding_dimension(), 384);
    }
}
