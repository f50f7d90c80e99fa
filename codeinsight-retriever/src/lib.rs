//! codeinsight-retriever: semantic search over code snippets
//!
//! Source files are split into snippets by `codeinsight-context`, embedded by
//! a `codeinsight-embed` provider and stored in SQLite. Queries are embedded
//! the same way and answered with the nearest snippets by cosine distance.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: directory walking, the vector index, the retrieval
//!   engine and the generation boundary
//! - **[`storage`]**: storage traits with the SQLite implementation
//! - **[`config`]**: file and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codeinsight_embed::HashingEmbedProvider;
//! use codeinsight_retriever::retrieval::{
//!     analyzer::CodeAnalyzer, retrieval_engine::RetrievalEngine, vector_index::VectorIndex,
//! };
//! use std::{path::Path, sync::Arc};
//!
//! # async fn example() -> codeinsight_retriever::Result<()> {
//! let index = VectorIndex::open(
//!     Path::new("/tmp/codeinsight"),
//!     "my-project",
//!     Arc::new(HashingEmbedProvider::default()),
//! )
//! .await?;
//! let engine = RetrievalEngine::new(CodeAnalyzer::default(), index);
//! engine.add_directory(Path::new("."), true).await?;
//! for hit in engine.query("parse the config file", 5).await?.results {
//!     println!("{:.3} {}", hit.distance, hit.metadata["file_path"]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Files → CodeAnalyzer → Snippets → EmbeddingProvider → SqliteStore
//!                                                          ↓
//!                     Generator ← RetrievalEngine ← VectorIndex.search
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::CodeInsightConfig;
pub use error::{Result, RetrieverError};
