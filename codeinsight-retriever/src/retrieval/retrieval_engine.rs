//! Ingestion and question answering over one index.

use super::analyzer::CodeAnalyzer;
use super::generation::Generator;
use super::vector_index::{IndexStats, QueryResult, SearchHit, VectorIndex};
use crate::config::CodeInsightConfig;
use crate::error::{Result, RetrieverError};
use codeinsight_context::{CodeSnippet, ExtractorConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Answer given when retrieval finds nothing.
pub const NO_RESULTS_ANSWER: &str = "No relevant code snippets found in the knowledge base.";

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files that produced at least one snippet
    pub files: usize,
    pub snippets: usize,
    pub ids: Vec<String>,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.files += other.files;
        self.snippets += other.snippets;
        self.ids.extend(other.ids);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SearchHit>,
}

#[derive(Debug)]
pub struct RetrievalEngine {
    analyzer: CodeAnalyzer,
    index: VectorIndex,
}

impl RetrievalEngine {
    pub fn new(analyzer: CodeAnalyzer, index: VectorIndex) -> Self {
        Self { analyzer, index }
    }

    /// Opens the configured index with the configured embedding provider.
    pub async fn from_config(config: &CodeInsightConfig) -> Result<Self> {
        let provider = config.embedding_provider().await?;
        let index = VectorIndex::open(&config.vector_db_path, &config.index_name, provider).await?;
        let analyzer =
            CodeAnalyzer::new(ExtractorConfig::default().with_chunk_lines(config.chunk_lines));
        Ok(Self::new(analyzer, index))
    }

    /// An engine over a fresh in-memory index, discarded when dropped.
    pub async fn in_memory(config: &CodeInsightConfig) -> Result<Self> {
        let provider = config.embedding_provider().await?;
        let index = VectorIndex::open_memory(&config.index_name, provider).await?;
        let analyzer =
            CodeAnalyzer::new(ExtractorConfig::default().with_chunk_lines(config.chunk_lines));
        Ok(Self::new(analyzer, index))
    }

    pub fn analyzer(&self) -> &CodeAnalyzer {
        &self.analyzer
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    async fn ingest(&self, snippets: Vec<CodeSnippet>) -> Result<IngestReport> {
        let mut files: Vec<&str> = snippets.iter().map(|s| s.file_path.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        let files = files.len();

        let ids = self.index.add_snippets(&snippets).await?;
        Ok(IngestReport {
            files,
            snippets: snippets.len(),
            ids,
        })
    }

    pub async fn add_file(&self, path: &Path) -> Result<IngestReport> {
        let report = self.ingest(self.analyzer.analyze_file(path)).await?;
        tracing::info!(
            "Indexed {} snippets from {}",
            report.snippets,
            path.display()
        );
        Ok(report)
    }

    /// Indexes each file in turn. A file that yields no snippets is skipped.
    pub async fn add_files(&self, paths: &[PathBuf]) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for path in paths {
            report.merge(self.add_file(path).await?);
        }
        Ok(report)
    }

    /// Indexes uploaded content named `file_name`.
    pub async fn add_source(&self, file_name: &str, content: &str) -> Result<IngestReport> {
        self.ingest(self.analyzer.analyze_source(file_name, content))
            .await
    }

    pub async fn add_directory(&self, root: &Path, recursive: bool) -> Result<IngestReport> {
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            )
            .into());
        }
        let report = self
            .ingest(self.analyzer.analyze_directory(root, recursive))
            .await?;
        tracing::info!(
            "Indexed {} snippets from {} files under {}",
            report.snippets,
            report.files,
            root.display()
        );
        Ok(report)
    }

    pub async fn query(&self, text: &str, limit: usize) -> Result<QueryResult> {
        self.index.search(text, limit, None).await
    }

    /// Retrieves up to `limit` snippets and asks `generator` to answer from them.
    pub async fn ask(&self, text: &str, limit: usize, generator: &dyn Generator) -> Result<Answer> {
        let result = self.query(text, limit).await?;
        if result.is_empty() {
            return Ok(Answer {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let answer = generator
            .generate_with_context(text, &result.context())
            .await
            .map_err(|source| RetrieverError::Generation { source })?;
        Ok(Answer {
            answer,
            sources: result.results,
        })
    }

    pub async fn delete_by_file(&self, file_path: &str) -> Result<usize> {
        self.index.delete_by_file(file_path).await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.stats().await
    }

    pub async fn clear(&self) -> Result<usize> {
        self.index.clear().await
    }
}
