//! Embedding provider trait and the local fastembed backend

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector, or 0 when
    /// there are none.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text.
///
/// Implementations return L2-normalised vectors, one per input text, in input
/// order. Identical input yields identical output.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::unexpected_response("No embedding generated for text"))
    }

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

#[async_trait]
impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        (**self).embed_text(text).await
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        (**self).embed_texts(texts).await
    }

    fn embedding_dimension(&self) -> usize {
        (**self).embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}

/// Converts an f32 vector to f16 and scales it to unit length.
///
/// A zero vector stays zero.
pub fn normalize_to_f16(embedding: &[f32]) -> Vec<f16> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    embedding
        .iter()
        .map(|&x| f16::from_f32(if norm > 0.0 { x / norm } else { x }))
        .collect()
}

/// Cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn model_cache() -> MutexGuard<'static, HashMap<String, ModelCacheEntry>> {
    lock(MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new())))
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Local ONNX sentence-embedding model run through fastembed.
///
/// Loading happens once per configuration per process; later providers with
/// an equal [`EmbedConfig`] share the loaded model.
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Loads (or reuses) the configured model.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            config.model_name()
        );

        let cache_key = Self::cache_key(&config)?;
        let cached = model_cache()
            .get(&cache_key)
            .map(|(model, dim)| (Arc::clone(model), *dim));

        let (model, dimension) = match cached {
            Some(entry) => {
                tracing::info!("Using cached model for: {}", config.model_name());
                entry
            }
            None => {
                let (model, dimension) = Self::load(config.clone()).await?;
                let model = Arc::new(Mutex::new(model));
                model_cache().insert(cache_key, (Arc::clone(&model), dimension));
                (model, dimension)
            }
        };

        Ok(Self {
            config,
            model,
            dimension,
        })
    }

    /// Cache key: FNV hash of the serialized configuration
    fn cache_key(config: &EmbedConfig) -> Result<String> {
        let config_json = serde_json::to_string(config)
            .map_err(|e| EmbedError::External { source: e.into() })?;

        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(config_json.as_bytes());

        Ok(format!("v1:{:x}", hasher.finish()))
    }

    async fn load(config: EmbedConfig) -> Result<(TextEmbedding, usize)> {
        let model_kind = config.fastembed_model()?;
        tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
            tracing::info!("Loading embedding model: {}", config.model_name());

            let mut init_options = InitOptions::new(model_kind)
                .with_show_download_progress(config.show_download_progress);
            if let Some(cache_dir) = &config.cache_dir {
                init_options = init_options.with_cache_dir(cache_dir.clone());
            }

            let mut model = TextEmbedding::try_new(init_options)
                .map_err(|e| EmbedError::External { source: e })?;

            // Probe once to learn the dimension and catch a broken model early
            let probe = model
                .embed(vec!["validation test".to_string()], None)
                .map_err(|e| EmbedError::External { source: e })?;
            let dimension = match probe.first() {
                Some(embedding) if !embedding.is_empty() => embedding.len(),
                _ => {
                    return Err(EmbedError::invalid_config(
                        "Model validation failed: empty embedding",
                    ));
                }
            };
            if probe.iter().flatten().any(|value| !value.is_finite()) {
                return Err(EmbedError::invalid_config(
                    "Model validation failed: non-finite values in embedding",
                ));
            }

            tracing::info!("Model loaded successfully. Dimension: {}", dimension);
            Ok((model, dimension))
        })
        .await?
    }

    /// Clears the global model cache.
    pub fn clear_cache() {
        model_cache().clear();
        tracing::info!("Model cache cleared");
    }

    /// Returns the number of cached models.
    pub fn cache_size() -> usize {
        model_cache().len()
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let model = Arc::clone(&self.model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", chunk.len());
                lock(&model)
                    .embed(chunk, None)
                    .map_err(|e| EmbedError::External { source: e })
            })
            .await??;

            all_embeddings.extend(batch_embeddings.iter().map(|e| normalize_to_f16(e)));
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let embeddings = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let result = EmbeddingResult::new(embeddings);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert_eq!(EmbeddingResult::new(vec![]).dimension, 0);
    }

    #[test]
    fn test_normalize_to_f16() {
        let normalized = normalize_to_f16(&[3.0, 4.0]);
        assert!((normalized[0].to_f32() - 0.6).abs() < 1e-3);
        assert!((normalized[1].to_f32() - 0.8).abs() < 1e-3);

        let zero = normalize_to_f16(&[0.0, 0.0, 0.0]);
        assert!(zero.iter().all(|x| x.to_f32() == 0.0));
    }

    #[test]
    fn test_cache_key_is_stable() {
        let a = FastEmbedProvider::cache_key(&EmbedConfig::default()).unwrap();
        let b = FastEmbedProvider::cache_key(&EmbedConfig::default()).unwrap();
        let c = FastEmbedProvider::cache_key(&EmbedConfig::new("bge-small-en-v1.5")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("v1:"));
    }

    #[tokio::test]
    async fn test_unknown_model_fails_before_loading() {
        let err = FastEmbedProvider::create(EmbedConfig::new("no-such-model"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }

    #[tokio::test]
    #[ignore] // Downloads the all-MiniLM-L6-v2 model - run with: cargo test test_fastembed_embeddings -- --ignored
    async fn test_fastembed_embeddings() -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();

        FastEmbedProvider::clear_cache();
        let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(FastEmbedProvider::cache_size(), 1);
        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.embedding_dimension(), 384);

        let texts = vec![
            "def add(a, b): return a + b".to_string(),
            "def sub(a, b): return a - b".to_string(),
            "The weather is sunny today.".to_string(),
        ];
        let result = provider.embed_texts(&texts).await?;
        assert_eq!(result.len(), 3);
        assert_eq!(result.dimension, 384);

        let norm: f32 = result.embeddings[0]
            .iter()
            .map(|x| x.to_f32() * x.to_f32())
            .sum::<f32>()
            .sqrt();
        assert!((norm - 1.0).abs() < 0.01);

        // Identical input, identical output; second provider reuses the model
        let again = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(FastEmbedProvider::cache_size(), 1);
        assert_eq!(again.embed_text(&texts[0]).await?, result.embeddings[0]);

        FastEmbedProvider::clear_cache();
        Ok(())
    }
}
