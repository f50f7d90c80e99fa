//! Language classification and snippet extraction for source files.
//!
//! [`Language::classify`] maps a path to a language tag and
//! [`SnippetExtractor`] turns file content into [`CodeSnippet`]s: functions,
//! classes, structs and module docstrings where a language strategy exists,
//! fixed-size line chunks everywhere else.

pub mod error;
pub mod extract;
pub mod language;
pub mod snippet;

pub use error::ExtractError;
pub use extract::{
    DEFAULT_CHUNK_LINES, ExtractionStrategy, ExtractorConfig, GenericChunker, GoExtractor,
    JavaScriptExtractor, PythonExtractor, SnippetExtractor,
};
pub use language::Language;
pub use snippet::{CodeSnippet, SnippetType};
