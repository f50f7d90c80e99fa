//! Error types for the embedding system

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems, model loading, local inference and the
/// remote embedding API. Failures are surfaced to the caller; no provider ever
/// substitutes a zero vector for a failed embedding.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// The remote provider was configured without credentials
    #[error("No API key configured for {provider}")]
    MissingApiKey { provider: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The remote API answered with a non-success status
    #[error("Embedding API returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The remote API answered with a body that is not an embedding list
    #[error("Unexpected embedding API response: {message}")]
    UnexpectedResponse { message: String },

    /// Every attempt at a transient failure was used up
    #[error("Embedding request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Transport-level failure talking to the remote API
    #[error("HTTP request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// IO errors when reading model files
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Wraps an error raised while loading a model.
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Wraps an error raised while computing embeddings.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingGeneration {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    ///
    /// # Example
    ///
    /// ```
    /// use codeinsight_embed::EmbedError;
    ///
    /// let err = EmbedError::invalid_config("dimension must be positive");
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Invalid model configuration: dimension must be positive"
    /// );
    /// ```
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn unexpected_response<S: Into<String>>(message: S) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Transport errors, rate limiting (429) and server errors (5xx) are
    /// transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } => true,
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
