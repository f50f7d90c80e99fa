//! Storage abstraction layer for indexed snippets
//!
//! Entries live in named collections. Each entry is a document, its string
//! metadata and its embedding. The traits separate text storage from vector
//! search so the vector index does not depend on SQLite directly.
//!
//! ```text
//! EntryStore ─────┐
//!                 ├─ CombinedStore ── SqliteStore
//! EmbeddingStore ─┘
//! ```

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use half::f16;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod sqlite_store;

/// Flattened snippet attributes. Absent optional values are omitted.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key holding the source file of an entry.
pub const FILE_PATH_KEY: &str = "file_path";

/// One indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    #[serde(skip)]
    pub embedding: Vec<f16>,
    /// None until the entry has been stored
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(id: impl Into<String>, document: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            document: document.into(),
            metadata,
            embedding: Vec::new(),
            updated_at: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f16>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get(FILE_PATH_KEY).map(String::as_str)
    }
}

/// Equality filter over metadata; an entry matches when every pair matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pairs: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.pairs
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Fields to replace in a stored entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub document: Option<String>,
    pub metadata: Option<Metadata>,
    pub embedding: Option<Vec<f16>>,
}

/// Text and metadata operations.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert entries, overwriting any with the same id, and return their ids
    async fn upsert_entries(&self, collection: &str, entries: Vec<Entry>) -> Result<Vec<String>>;

    async fn get_entry(&self, collection: &str, id: &str) -> Result<Option<Entry>>;

    /// Replace the given fields; fails with `NotFound` when the id is absent
    async fn update_entry(&self, collection: &str, id: &str, update: EntryUpdate) -> Result<()>;

    /// Delete every entry whose `file_path` is `file_path`
    async fn delete_by_file(&self, collection: &str, file_path: &str) -> Result<usize>;

    async fn list_entries(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Entry>>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// Remove every entry of the collection
    async fn clear(&self, collection: &str) -> Result<usize>;
}

/// Vector similarity operations.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    async fn get_embedding(&self, collection: &str, id: &str) -> Result<Option<Vec<f16>>>;

    /// Ids and cosine distances of the closest matching entries, nearest first
    async fn search_similar(
        &self,
        collection: &str,
        query: &[f16],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(String, f32)>>;
}

/// Unified store combining text and vector operations.
#[async_trait]
pub trait CombinedStore: EntryStore + EmbeddingStore + Send + Sync {
    /// Like [`EmbeddingStore::search_similar`] but returns whole entries
    async fn search_entries(
        &self,
        collection: &str,
        query: &[f16],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(Entry, f32)>>;
}

/// `1 - cosine_similarity`, computed in f32. A zero vector is at distance 1
/// from everything.
pub fn cosine_distance(a: &[f16], b: &[f16]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x.to_f32(), y.to_f32());
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm = norm_a.sqrt() * norm_b.sqrt();
    if norm == 0.0 { 1.0 } else { 1.0 - dot / norm }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> Vec<f16> {
        values.iter().copied().map(f16::from_f32).collect()
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&v(&[1.0, 0.0]), &v(&[1.0, 0.0])).abs() < 1e-6);
        assert!((cosine_distance(&v(&[1.0, 0.0]), &v(&[0.0, 1.0])) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&v(&[1.0, 0.0]), &v(&[-1.0, 0.0])) - 2.0).abs() < 1e-6);
        assert!((cosine_distance(&v(&[0.6, 0.8]), &v(&[0.8, 0.6])) - 0.04).abs() < 0.01);
        assert_eq!(cosine_distance(&v(&[0.0, 0.0]), &v(&[1.0, 1.0])), 1.0);
    }

    #[test]
    fn test_metadata_filter() {
        let metadata: Metadata = [("file_path", "a.py"), ("language", "python")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(MetadataFilter::new().matches(&metadata));
        assert!(MetadataFilter::new().with("file_path", "a.py").matches(&metadata));
        assert!(
            !MetadataFilter::new()
                .with("file_path", "a.py")
                .with("language", "go")
                .matches(&metadata)
        );
        assert!(!MetadataFilter::new().with("name", "add").matches(&metadata));

        let filter: MetadataFilter = [("language", "python")].into_iter().collect();
        assert_eq!(filter.get("language"), Some("python"));
    }
}
