//! Embedding-backed index of documents.
//!
//! [`VectorIndex`] couples a [`CombinedStore`] with an
//! [`EmbeddingProvider`]: documents are embedded on the way in, queries are
//! embedded and ranked by cosine distance on the way out. One index reads and
//! writes a single named collection of the store.

use crate::error::{Result, RetrieverError};
use crate::storage::sqlite_store::SqliteStore;
use crate::storage::{CombinedStore, Entry, EntryUpdate, FILE_PATH_KEY, Metadata, MetadataFilter};
use codeinsight_context::CodeSnippet;
use codeinsight_embed::EmbeddingProvider;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stable id of a document: blake3 hex digest of its text.
pub fn content_id(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Flattens a snippet's attributes into entry metadata.
pub fn snippet_metadata(snippet: &CodeSnippet) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(FILE_PATH_KEY.to_string(), snippet.file_path.clone());
    metadata.insert("language".to_string(), snippet.language.as_str().to_string());
    metadata.insert(
        "snippet_type".to_string(),
        snippet.snippet_type.as_str().to_string(),
    );
    metadata.insert("start_line".to_string(), snippet.start_line.to_string());
    metadata.insert("end_line".to_string(), snippet.end_line.to_string());
    if let Some(name) = &snippet.name {
        metadata.insert("name".to_string(), name.clone());
    }
    if let Some(docstring) = &snippet.docstring {
        metadata.insert("docstring".to_string(), docstring.clone());
    }
    metadata
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// Cosine distance to the query; lower is closer
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub query: String,
    /// Nearest first
    pub results: Vec<SearchHit>,
    pub count: usize,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Documents joined by blank lines, in result order.
    pub fn context(&self) -> String {
        self.results
            .iter()
            .map(|hit| hit.document.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub index_name: String,
    /// Database file, or `:memory:`
    pub location: String,
}

pub struct VectorIndex {
    store: Arc<dyn CombinedStore>,
    provider: Arc<dyn EmbeddingProvider>,
    index_name: String,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("index_name", &self.index_name)
            .field("location", &self.location)
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

impl VectorIndex {
    /// Opens the index `index_name` in `<location>/codeinsight.db`, creating
    /// the directory and database if needed.
    pub async fn open(
        location: &Path,
        index_name: impl Into<String>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let store = SqliteStore::open(location).await?;
        let db_path = store.db_path().map(Path::to_path_buf);
        let mut index = Self::with_store(Arc::new(store), index_name, provider)?;
        index.location = db_path;
        tracing::info!(
            "Opened index '{}' at {}",
            index.index_name,
            location.display()
        );
        Ok(index)
    }

    pub async fn open_memory(
        index_name: impl Into<String>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let store = SqliteStore::open_memory().await?;
        Self::with_store(Arc::new(store), index_name, provider)
    }

    pub fn with_store(
        store: Arc<dyn CombinedStore>,
        index_name: impl Into<String>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let index_name = index_name.into();
        if index_name.trim().is_empty() {
            return Err(RetrieverError::invalid_config("index name must not be empty"));
        }
        Ok(Self {
            store,
            provider,
            index_name,
            location: None,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embeds and stores one document, returning its id.
    ///
    /// Without an explicit id the content hash is used, so adding the same
    /// text twice keeps a single entry.
    pub async fn add(
        &self,
        content: &str,
        metadata: Metadata,
        id: Option<String>,
    ) -> Result<String> {
        let embedding = self.provider.embed_text(content).await?;
        let id = id.unwrap_or_else(|| content_id(content));
        let entry = Entry::new(id, content, metadata).with_embedding(embedding);

        let mut ids = self.store.upsert_entries(&self.index_name, vec![entry]).await?;
        ids.pop()
            .ok_or_else(|| RetrieverError::corrupt("store returned no id for an insert"))
    }

    /// Embeds all snippets in one batch and stores them in one transaction.
    pub async fn add_snippets(&self, snippets: &[CodeSnippet]) -> Result<Vec<String>> {
        if snippets.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = snippets.iter().map(|s| s.content.clone()).collect();
        let embeddings = self.provider.embed_texts(&texts).await?;
        if embeddings.len() != snippets.len() {
            return Err(codeinsight_embed::EmbedError::unexpected_response(format!(
                "expected {} embeddings, got {}",
                snippets.len(),
                embeddings.len()
            ))
            .into());
        }

        let entries: Vec<Entry> = snippets
            .iter()
            .zip(embeddings.embeddings)
            .map(|(snippet, embedding)| {
                Entry::new(
                    content_id(&snippet.content),
                    snippet.content.clone(),
                    snippet_metadata(snippet),
                )
                .with_embedding(embedding)
            })
            .collect();

        let ids = self.store.upsert_entries(&self.index_name, entries).await?;
        tracing::debug!("Stored {} snippets in '{}'", ids.len(), self.index_name);
        Ok(ids)
    }

    /// The `n_results` entries nearest to `query` that match `filter`.
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<QueryResult> {
        let embedding = self.provider.embed_text(query).await?;
        let filter = filter.cloned().unwrap_or_default();

        let ranked = self
            .store
            .search_entries(&self.index_name, &embedding, n_results, &filter)
            .await?;

        let results: Vec<SearchHit> = ranked
            .into_iter()
            .map(|(entry, distance)| SearchHit {
                id: entry.id,
                document: entry.document,
                metadata: entry.metadata,
                distance,
            })
            .collect();
        tracing::info!(
            "Query '{}' matched {} entries in '{}'",
            query,
            results.len(),
            self.index_name
        );

        Ok(QueryResult {
            query: query.to_string(),
            count: results.len(),
            results,
        })
    }

    /// Removes every entry that came from `file_path`.
    pub async fn delete_by_file(&self, file_path: &str) -> Result<usize> {
        let deleted = self.store.delete_by_file(&self.index_name, file_path).await?;
        tracing::info!("Deleted {} entries for {}", deleted, file_path);
        Ok(deleted)
    }

    /// Replaces the content and/or metadata of an existing entry. New content
    /// is re-embedded.
    pub async fn update(
        &self,
        id: &str,
        content: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let embedding = match content {
            Some(content) => Some(self.provider.embed_text(content).await?),
            None => None,
        };
        let update = EntryUpdate {
            document: content.map(str::to_string),
            metadata,
            embedding,
        };
        self.store.update_entry(&self.index_name, id, update).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Entry>> {
        self.store.get_entry(&self.index_name, id).await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            count: self.store.count(&self.index_name).await?,
            index_name: self.index_name.clone(),
            location: self
                .location
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string()),
        })
    }

    /// Empties the index.
    pub async fn clear(&self) -> Result<usize> {
        let removed = self.store.clear(&self.index_name).await?;
        tracing::info!("Cleared {} entries from '{}'", removed, self.index_name);
        Ok(removed)
    }
}
