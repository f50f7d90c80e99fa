//! Error types for indexing and retrieval

use codeinsight_embed::EmbedError;

/// Result type for retriever operations.
pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Errors surfaced by the storage layer, the vector index and the retrieval
/// engine. Extraction problems never appear here; they are handled inside the
/// snippet extractor.
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// The SQLite database could not be opened, read or written
    #[error("Storage error: {source}")]
    Storage {
        #[from]
        source: sqlx::Error,
    },

    /// The embedding provider failed after its own retries
    #[error("Embedding error: {source}")]
    Embedding {
        #[from]
        source: EmbedError,
    },

    /// No entry with this id exists in the index
    #[error("No entry with id '{id}'")]
    NotFound { id: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A stored row could not be decoded
    #[error("Corrupt entry: {message}")]
    Corrupt { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The generation collaborator failed
    #[error("Generation failed: {source}")]
    Generation { source: anyhow::Error },
}

impl RetrieverError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
