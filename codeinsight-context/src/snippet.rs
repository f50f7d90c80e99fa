//! The extraction result type.

use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of code unit a snippet covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetType {
    ModuleDocstring,
    Function,
    Class,
    Struct,
    Chunk,
}

impl SnippetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetType::ModuleDocstring => "module_docstring",
            SnippetType::Function => "function",
            SnippetType::Class => "class",
            SnippetType::Struct => "struct",
            SnippetType::Chunk => "chunk",
        }
    }
}

impl fmt::Display for SnippetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed, line-addressed fragment of a source file.
///
/// Snippets are produced by [`SnippetExtractor`](crate::SnippetExtractor) and
/// are not modified afterwards. `start_line` and `end_line` are 1-based and
/// inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    /// Exact text taken from the source file
    pub content: String,
    /// Where the source came from; not necessarily a real path
    pub file_path: String,
    pub language: Language,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet_type: SnippetType,
    /// Identifier of the unit, `chunk_<n>` for chunks, `module` for module docstrings
    pub name: Option<String>,
    /// Documentation attached to a function or class, if any
    pub docstring: Option<String>,
}

impl CodeSnippet {
    /// Number of source lines covered by this snippet.
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }
}
