//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the local model used when none is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Local model names understood by [`EmbedConfig::fastembed_model`], with the
/// fastembed model each one loads.
const KNOWN_MODELS: &[(&str, EmbeddingModel)] = &[
    ("all-minilm-l6-v2", EmbeddingModel::AllMiniLML6V2),
    ("all-minilm-l12-v2", EmbeddingModel::AllMiniLML12V2),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15),
    ("bge-large-en-v1.5", EmbeddingModel::BGELargeENV15),
    ("nomic-embed-text-v1.5", EmbeddingModel::NomicEmbedTextV15),
    (
        "paraphrase-multilingual-minilm-l12-v2",
        EmbeddingModel::ParaphraseMLMiniLML12V2,
    ),
    ("multilingual-e5-small", EmbeddingModel::MultilingualE5Small),
    ("mxbai-embed-large-v1", EmbeddingModel::MxbaiEmbedLargeV1),
];

/// Configuration for the local fastembed model
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    #[builder(default = r#"DEFAULT_MODEL_NAME.to_string()"#)]
    pub model_name: String,
    /// Directory fastembed downloads and caches model files in
    #[builder(default)]
    pub cache_dir: Option<PathBuf>,
    /// Maximum batch size for embedding generation
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to print download progress when fetching a model
    #[builder(default = "false")]
    pub show_download_progress: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Configuration for `model_name` with every other field at its default.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: Some(cache_dir.as_ref().to_path_buf()),
            ..self
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolves the configured name to a fastembed model.
    ///
    /// Matching ignores case and any organisation prefix such as
    /// `sentence-transformers/`.
    pub fn fastembed_model(&self) -> Result<EmbeddingModel> {
        let lowered = self.model_name.to_lowercase();
        let bare = lowered.rsplit('/').next().unwrap_or(&lowered);
        KNOWN_MODELS
            .iter()
            .find(|(name, _)| *name == bare)
            .map(|(_, model)| model.clone())
            .ok_or_else(|| {
                EmbedError::invalid_config(format!(
                    "Unknown embedding model '{}'",
                    self.model_name
                ))
            })
    }

    /// Checks the configuration without loading anything.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be positive"));
        }
        self.fastembed_model()?;
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: None,
            batch_size: 32,
            show_download_progress: false,
        }
    }
}

/// Default base URL of the remote embedding API.
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://api.mistral.ai";
/// Default remote embedding model.
pub const DEFAULT_REMOTE_MODEL: &str = "mistral-embed";

/// Configuration for an OpenAI/Mistral-compatible embedding API.
///
/// Missing fields take their defaults when deserializing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEmbedConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    /// Total attempts for one request, the first one included
    pub max_retries: u32,
    /// Per-request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Sleep before the second attempt; doubles for each one after
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
    /// Dimension reported before the first response is seen
    pub dimension: usize,
}

impl std::fmt::Debug for RemoteEmbedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEmbedConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("retry_delay", &self.retry_delay)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl Default for RemoteEmbedConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            embedding_model: DEFAULT_REMOTE_MODEL.to_string(),
            max_retries: 3,
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            dimension: 1024,
        }
    }
}

impl RemoteEmbedConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    pub fn with_model(self, embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            ..self
        }
    }

    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_retry_delay(self, retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            ..self
        }
    }

    /// Full URL of the embeddings endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }

    /// Delay before attempt number `attempt` (1-based; the first attempt has none).
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(2)))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
