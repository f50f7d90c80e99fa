//! Snippet extraction: per-language strategies with a generic fallback.
//!
//! [`SnippetExtractor`] keeps a registry of [`ExtractionStrategy`] values keyed by
//! [`Language`]. Languages without a registered strategy, and files a strategy
//! cannot parse, are split into fixed-size line chunks by [`GenericChunker`].
//!
//! ## Default strategies
//!
//! - **Python** ([`PythonExtractor`]): tree-sitter parse, functions, classes and the
//!   module docstring.
//! - **JavaScript** ([`JavaScriptExtractor`]): regex matches plus naive brace matching.
//! - **Go** ([`GoExtractor`]): regex matches for `func` and `type ... struct`, brace
//!   matching or end-of-line spans.
//!
//! ```
//! use codeinsight_context::{Language, SnippetExtractor, SnippetType};
//!
//! let extractor = SnippetExtractor::default();
//! let source = "def greet(name):\n    \"\"\"Say hello.\"\"\"\n    return f\"hi {name}\"\n";
//! let snippets = extractor.extract(source, "greet.py", Language::Python);
//!
//! assert_eq!(snippets.len(), 1);
//! assert_eq!(snippets[0].snippet_type, SnippetType::Function);
//! assert_eq!(snippets[0].name.as_deref(), Some("greet"));
//! assert_eq!(snippets[0].docstring.as_deref(), Some("Say hello."));
//! ```

use crate::error::{ExtractError, Result};
use crate::language::Language;
use crate::snippet::CodeSnippet;
use std::collections::HashMap;
use std::sync::Arc;

pub mod generic;
pub mod golang;
pub mod javascript;
pub mod python;

pub use generic::GenericChunker;
pub use golang::GoExtractor;
pub use javascript::JavaScriptExtractor;
pub use python::PythonExtractor;

/// Lines per chunk used by the generic fallback.
pub const DEFAULT_CHUNK_LINES: usize = 50;

/// Configuration for snippet extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Lines per generic chunk
    pub chunk_lines: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            chunk_lines: DEFAULT_CHUNK_LINES,
        }
    }
}

impl ExtractorConfig {
    pub fn with_chunk_lines(mut self, chunk_lines: usize) -> Self {
        self.chunk_lines = chunk_lines.max(1);
        self
    }
}

/// A language-specific way of turning file content into snippets.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Extract snippets from `content`.
    ///
    /// [`ExtractError::Parse`] makes the extractor chunk the whole file
    /// generically; any other error yields no snippets for the file.
    fn extract(&self, content: &str, file_path: &str, language: Language)
    -> Result<Vec<CodeSnippet>>;
}

/// Dispatches files to the strategy registered for their language.
#[derive(Clone)]
pub struct SnippetExtractor {
    strategies: HashMap<Language, Arc<dyn ExtractionStrategy>>,
    fallback: GenericChunker,
}

impl std::fmt::Debug for SnippetExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<&str> = self.strategies.keys().map(|l| l.as_str()).collect();
        languages.sort_unstable();
        f.debug_struct("SnippetExtractor")
            .field("strategies", &languages)
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl Default for SnippetExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl SnippetExtractor {
    /// Creates an extractor with the Python, JavaScript and Go strategies registered.
    pub fn new(config: ExtractorConfig) -> Self {
        let mut extractor = Self::without_strategies(config);
        extractor.register(Language::Python, PythonExtractor::new());
        extractor.register(Language::JavaScript, JavaScriptExtractor::new());
        extractor.register(Language::Go, GoExtractor::new());
        extractor
    }

    /// Creates an extractor that chunks every language generically.
    pub fn without_strategies(config: ExtractorConfig) -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: GenericChunker::new(config.chunk_lines),
        }
    }

    /// Registers `strategy` for `language`, replacing any previous one.
    pub fn register<S>(&mut self, language: Language, strategy: S) -> &mut Self
    where
        S: ExtractionStrategy + 'static,
    {
        self.strategies.insert(language, Arc::new(strategy));
        self
    }

    pub fn has_strategy(&self, language: Language) -> bool {
        self.strategies.contains_key(&language)
    }

    pub fn chunk_lines(&self) -> usize {
        self.fallback.chunk_lines()
    }

    /// Extracts snippets from one file's content.
    ///
    /// Never fails: strategy errors are logged. A parse failure falls back to
    /// generic chunks, anything else yields an empty list.
    pub fn extract(&self, content: &str, file_path: &str, language: Language) -> Vec<CodeSnippet> {
        let Some(strategy) = self.strategies.get(&language) else {
            return self.fallback.chunk(content, file_path, language);
        };

        match strategy.extract(content, file_path, language) {
            Ok(snippets) => {
                tracing::debug!(
                    "{} extracted {} snippets from {}",
                    strategy.name(),
                    snippets.len(),
                    file_path
                );
                snippets
            }
            Err(e @ ExtractError::Parse { .. }) => {
                tracing::warn!("{e}; falling back to line chunks");
                self.fallback.chunk(content, file_path, language)
            }
            Err(e) => {
                tracing::error!("{} failed on {}: {e}", strategy.name(), file_path);
                Vec::new()
            }
        }
    }
}

/// 1-based line number of the byte at `offset`.
pub(crate) fn line_at(content: &str, offset: usize) -> usize {
    content.as_bytes()[..offset.min(content.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Scans forward from `from` with a brace depth of one and returns the offset just
/// past the brace that closes it, or the end of `content` if none does.
///
/// Braces inside string literals and comments are counted like any other.
pub(crate) fn match_braces(content: &str, from: usize) -> usize {
    let bytes = content.as_bytes();
    let mut depth = 1usize;
    let mut end = from;
    while depth > 0 && end < bytes.len() {
        match bytes[end] {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
        }
        end += 1;
    }
    end
}

/// Builds a snippet spanning byte range `start..end`, with lines derived from the offsets.
pub(crate) fn span_snippet(
    content: &str,
    start: usize,
    end: usize,
    file_path: &str,
    language: Language,
    snippet_type: crate::SnippetType,
    name: &str,
) -> CodeSnippet {
    CodeSnippet {
        content: content[start..end].to_string(),
        file_path: file_path.to_string(),
        language,
        start_line: line_at(content, start),
        end_line: line_at(content, end),
        snippet_type,
        name: Some(name.to_string()),
        docstring: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnippetType;
    use tracing_test::traced_test;

    struct FailingStrategy;

    impl ExtractionStrategy for FailingStrategy {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _: &str, _: &str, _: Language) -> Result<Vec<CodeSnippet>> {
            Err(ExtractError::Strategy {
                message: "always fails".to_string(),
            })
        }
    }

    struct UnparseableStrategy;

    impl ExtractionStrategy for UnparseableStrategy {
        fn name(&self) -> &'static str {
            "unparseable"
        }

        fn extract(&self, _: &str, file_path: &str, _: Language) -> Result<Vec<CodeSnippet>> {
            Err(ExtractError::parse(file_path, "unexpected token"))
        }
    }

    #[test]
    fn test_line_at() {
        let text = "a\nbb\n\nccc";
        assert_eq!(line_at(text, 0), 1);
        assert_eq!(line_at(text, 2), 2);
        assert_eq!(line_at(text, 5), 3);
        assert_eq!(line_at(text, 6), 4);
        assert_eq!(line_at(text, 100), 4);
    }

    #[test]
    fn test_match_braces() {
        let text = "{ a { b } c } tail";
        assert_eq!(&text[..match_braces(text, 1)], "{ a { b } c }");
        // Unbalanced input runs to the end
        assert_eq!(match_braces("{ {", 1), 3);
        // Braces in strings are counted
        let text = "{ let s = \"}\"; }";
        assert_eq!(&text[..match_braces(text, 1)], "{ let s = \"}");
    }

    #[test]
    fn test_unregistered_language_uses_chunks() {
        let extractor = SnippetExtractor::default();
        assert!(!extractor.has_strategy(Language::Rust));
        let snippets = extractor.extract("fn main() {}\n", "main.rs", Language::Rust);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].snippet_type, SnippetType::Chunk);
        assert_eq!(snippets[0].name.as_deref(), Some("chunk_1"));
    }

    #[test]
    #[traced_test]
    fn test_parse_failure_falls_back() {
        let mut extractor = SnippetExtractor::default();
        extractor.register(Language::Rust, UnparseableStrategy);
        let snippets = extractor.extract("fn main() {}\n", "main.rs", Language::Rust);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].snippet_type, SnippetType::Chunk);
        assert!(logs_contain("falling back to line chunks"));
    }

    #[test]
    fn test_malformed_python_falls_back_to_chunks() {
        let extractor = SnippetExtractor::default();
        let source = "def broken(:\n    return 1\n";
        let snippets = extractor.extract(source, "broken.py", Language::Python);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].snippet_type, SnippetType::Chunk);
        assert_eq!(snippets[0].name.as_deref(), Some("chunk_1"));
        assert_eq!(snippets[0].content, source);
    }

    #[test]
    fn test_other_failure_yields_nothing() {
        let mut extractor = SnippetExtractor::default();
        extractor.register(Language::Rust, FailingStrategy);
        assert!(extractor.extract("fn main() {}\n", "main.rs", Language::Rust).is_empty());
    }

    #[test]
    fn test_registered_strategy_replaces_default() {
        let mut extractor = SnippetExtractor::without_strategies(ExtractorConfig::default());
        assert!(!extractor.has_strategy(Language::Python));
        extractor.register(Language::Python, PythonExtractor::new());
        assert!(extractor.has_strategy(Language::Python));
    }

    #[test]
    fn test_chunk_lines_config() {
        let extractor = SnippetExtractor::new(ExtractorConfig::default().with_chunk_lines(10));
        assert_eq!(extractor.chunk_lines(), 10);
        let content = (1..=25).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let snippets = extractor.extract(&content, "notes.txt", Language::Unknown);
        assert_eq!(snippets.len(), 3);
    }
}
