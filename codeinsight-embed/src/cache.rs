//! Memoisation of embeddings by exact input text.
//!
//! [`EmbeddingCache`] is the storage seam; [`UnboundedCache`] never evicts and
//! [`LruEmbeddingCache`] keeps the most recently used entries up to a
//! capacity. [`CachedEmbeddingProvider`] wraps any provider with any cache and
//! only forwards texts it has not seen. Failed embeddings are never cached.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, lock};
use async_trait::async_trait;
use fnv::{FnvHashMap, FnvHashSet};
use half::f16;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Thread-safe text → embedding store.
pub trait EmbeddingCache: Send + Sync {
    fn get(&self, text: &str) -> Option<Vec<f16>>;
    fn insert(&self, text: &str, embedding: Vec<f16>);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache with no eviction.
#[derive(Debug, Default)]
pub struct UnboundedCache {
    entries: Mutex<FnvHashMap<String, Vec<f16>>>,
}

impl UnboundedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EmbeddingCache for UnboundedCache {
    fn get(&self, text: &str) -> Option<Vec<f16>> {
        lock(&self.entries).get(text).cloned()
    }

    fn insert(&self, text: &str, embedding: Vec<f16>) {
        lock(&self.entries).insert(text.to_string(), embedding);
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

/// Least-recently-used cache holding at most `capacity` embeddings.
#[derive(Debug)]
pub struct LruEmbeddingCache {
    entries: Mutex<LruCache<String, Vec<f16>>>,
}

impl LruEmbeddingCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        lock(&self.entries).cap().get()
    }
}

impl EmbeddingCache for LruEmbeddingCache {
    fn get(&self, text: &str) -> Option<Vec<f16>> {
        lock(&self.entries).get(text).cloned()
    }

    fn insert(&self, text: &str, embedding: Vec<f16>) {
        lock(&self.entries).put(text.to_string(), embedding);
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

/// Wraps `P` so repeated texts are embedded once.
pub struct CachedEmbeddingProvider<P, C = UnboundedCache> {
    inner: P,
    cache: C,
}

impl<P: EmbeddingProvider> CachedEmbeddingProvider<P, UnboundedCache> {
    pub fn new(inner: P) -> Self {
        Self::with_cache(inner, UnboundedCache::new())
    }
}

impl<P: EmbeddingProvider, C: EmbeddingCache> CachedEmbeddingProvider<P, C> {
    pub fn with_cache(inner: P, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: EmbeddingProvider, C: EmbeddingCache> EmbeddingProvider for CachedEmbeddingProvider<P, C> {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut results: Vec<Option<Vec<f16>>> = texts.iter().map(|t| self.cache.get(t)).collect();

        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();

        if !missing.is_empty() {
            // Embed each distinct missing text once
            let mut seen = FnvHashSet::default();
            let unique: Vec<String> = missing
                .iter()
                .map(|&i| &texts[i])
                .filter(|text| seen.insert(text.as_str()))
                .cloned()
                .collect();
            tracing::debug!(
                "Embedding cache: {} hits, {} misses",
                texts.len() - missing.len(),
                unique.len()
            );

            let computed = self.inner.embed_texts(&unique).await?;
            if computed.len() != unique.len() {
                return Err(EmbedError::unexpected_response(format!(
                    "expected {} embeddings, got {}",
                    unique.len(),
                    computed.len()
                )));
            }

            let fresh: FnvHashMap<&str, Vec<f16>> = unique
                .iter()
                .map(String::as_str)
                .zip(computed.embeddings)
                .collect();
            for (text, embedding) in &fresh {
                self.cache.insert(text, embedding.clone());
            }
            for i in missing {
                results[i] = fresh.get(texts[i].as_str()).cloned();
            }
        }

        let embeddings: Vec<Vec<f16>> = results.into_iter().flatten().collect();
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.inner.embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingEmbedProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts the texts it is asked to embed.
    struct CountingProvider {
        inner: HashingEmbedProvider,
        embedded: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                inner: HashingEmbedProvider::new(16).unwrap(),
                embedded: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
            if self.fail {
                return Err(EmbedError::Http {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed_texts(texts).await
        }

        fn embedding_dimension(&self) -> usize {
            16
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_only_misses_are_forwarded() {
        let provider = CachedEmbeddingProvider::new(CountingProvider::new());

        let first = provider.embed_text("alpha").await.unwrap();
        assert_eq!(provider.inner().embedded.load(Ordering::SeqCst), 1);

        let texts = vec![
            "beta".to_string(),
            "alpha".to_string(),
            "beta".to_string(),
            "gamma".to_string(),
        ];
        let result = provider.embed_texts(&texts).await.unwrap();
        // alpha was cached, beta is embedded once despite appearing twice
        assert_eq!(provider.inner().embedded.load(Ordering::SeqCst), 3);
        assert_eq!(result.len(), 4);
        assert_eq!(result.embeddings[1], first);
        assert_eq!(result.embeddings[0], result.embeddings[2]);
        assert_eq!(provider.cache().len(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut counting = CountingProvider::new();
        counting.fail = true;
        let provider = CachedEmbeddingProvider::new(counting);

        assert!(provider.embed_text("alpha").await.is_err());
        assert!(provider.cache().is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = LruEmbeddingCache::new(2);
        cache.insert("a", vec![f16::from_f32(1.0)]);
        cache.insert("b", vec![f16::from_f32(2.0)]);
        assert!(cache.get("a").is_some());
        cache.insert("c", vec![f16::from_f32(3.0)]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(LruEmbeddingCache::new(0).capacity(), 1);
    }

    #[tokio::test]
    async fn test_lru_backed_provider() {
        let provider =
            CachedEmbeddingProvider::with_cache(CountingProvider::new(), LruEmbeddingCache::new(1));
        provider.embed_text("a").await.unwrap();
        provider.embed_text("b").await.unwrap();
        provider.embed_text("a").await.unwrap();
        assert_eq!(provider.inner().embedded.load(Ordering::SeqCst), 3);
        assert_eq!(provider.provider_name(), "counting");
    }
}
