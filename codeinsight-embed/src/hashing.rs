//! Offline embeddings by feature hashing.
//!
//! Each lowercased word token is hashed with blake3; the hash picks a bucket
//! and a sign, and the token adds ±1 to that bucket. The resulting vector is
//! L2-normalised. Texts sharing words end up close under cosine distance,
//! which is enough for tests and for indexing without a model.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, normalize_to_f16};
use async_trait::async_trait;
use half::f16;

pub const DEFAULT_HASHING_DIMENSION: usize = 384;

#[derive(Debug, Clone)]
pub struct HashingEmbedProvider {
    dimension: usize,
}

impl Default for HashingEmbedProvider {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

impl HashingEmbedProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hashing dimension must be positive",
            ));
        }
        Ok(Self { dimension })
    }

    /// Embeds one text synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f16> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize_to_f16(&vector)
    }
}

/// Lowercased runs of alphanumeric characters.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings: Vec<Vec<f16>> = texts.iter().map(|t| self.embed_sync(t)).collect();
        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn cosine(a: &[f16], b: &[f16]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
    }

    #[test]
    fn test_dimension_validation() {
        assert_err!(HashingEmbedProvider::new(0));
        let provider = assert_ok!(HashingEmbedProvider::new(64));
        assert_eq!(provider.embedding_dimension(), 64);
    }

    #[test]
    fn test_deterministic_and_normalised() {
        let provider = HashingEmbedProvider::default();
        let a = provider.embed_sync("Subtract two numbers");
        let b = provider.embed_sync("subtract TWO numbers!");
        assert_eq!(a, b);
        assert!((cosine(&a, &a) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let provider = HashingEmbedProvider::default();
        let query = provider.embed_sync("subtract two numbers");
        let sub = provider.embed_sync("def sub(a, b):\n    \"\"\"Subtract two numbers.\"\"\"");
        let add = provider.embed_sync("def add(a, b):\n    \"\"\"Add two numbers.\"\"\"");
        assert!(cosine(&query, &sub) > cosine(&query, &add));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = HashingEmbedProvider::new(8).unwrap();
        assert!(provider.embed_sync("  ").iter().all(|x| x.to_f32() == 0.0));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let provider = HashingEmbedProvider::default();
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let result = provider.embed_texts(&texts).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.embeddings[0], provider.embed_sync("alpha"));
        assert_eq!(result.embeddings[1], provider.embed_sync("beta"));
        assert_eq!(provider.embed_text("beta").await.unwrap(), result.embeddings[1]);
    }
}
