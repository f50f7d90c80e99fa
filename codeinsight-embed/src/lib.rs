//! # codeinsight-embed
//!
//! Text embeddings for code retrieval behind one async trait,
//! [`EmbeddingProvider`], with three backends:
//!
//! - [`FastEmbedProvider`]: a local ONNX sentence-embedding model run through
//!   fastembed (`all-MiniLM-L6-v2` by default), loaded once per process.
//! - [`RemoteEmbedProvider`]: an OpenAI/Mistral-compatible HTTP API with
//!   bounded retries and exponential backoff.
//! - [`HashingEmbedProvider`]: deterministic feature hashing, no model needed.
//!
//! Any provider can be wrapped in a [`CachedEmbeddingProvider`] backed by an
//! [`UnboundedCache`] or an [`LruEmbeddingCache`].
//!
//! All vectors are L2-normalised and stored as half-precision `f16`.
//!
//! ## Quick Start
//!
//! ```
//! use codeinsight_embed::{CachedEmbeddingProvider, EmbeddingProvider, HashingEmbedProvider};
//!
//! # async fn example() -> codeinsight_embed::Result<()> {
//! let provider = CachedEmbeddingProvider::new(HashingEmbedProvider::default());
//!
//! let texts = vec!["fn add(a: i32, b: i32)".to_string(), "fn sub(a: i32, b: i32)".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! assert_eq!(result.len(), 2);
//! assert_eq!(result.dimension, provider.embedding_dimension());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;
pub mod remote;

pub use cache::{CachedEmbeddingProvider, EmbeddingCache, LruEmbeddingCache, UnboundedCache};
pub use config::{EmbedConfig, EmbedConfigBuilder, RemoteEmbedConfig};
pub use error::{EmbedError, Result};
pub use hashing::HashingEmbedProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, normalize_to_f16};
pub use remote::RemoteEmbedProvider;
