//! Regex-driven extraction for JavaScript.
//!
//! Each pattern family is scanned independently and every match is extended to
//! its closing brace with [`match_braces`]. Matches from different families may
//! cover the same code and are all kept.

use super::{ExtractionStrategy, match_braces, span_snippet};
use crate::error::Result;
use crate::language::Language;
use crate::snippet::{CodeSnippet, SnippetType};
use regex::Regex;
use std::sync::LazyLock;

/// `function name(...) {`, `const name = (...) => {`, `const name = function(...) {`
static FUNCTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"function\s+(\w+)\s*\([^)]*\)\s*\{",
        r"const\s+(\w+)\s*=\s*\([^)]*\)\s*=>\s*\{",
        r"const\s+(\w+)\s*=\s*function\s*\([^)]*\)\s*\{",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid function pattern"))
    .collect()
});

static CLASS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)\s*(?:extends\s+\w+\s*)?\{").expect("valid class pattern")
});

/// Brace-delimited extraction rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaScriptExtractor;

impl JavaScriptExtractor {
    pub fn new() -> Self {
        Self
    }

    fn scan(
        pattern: &Regex,
        content: &str,
        file_path: &str,
        language: Language,
        snippet_type: SnippetType,
        snippets: &mut Vec<CodeSnippet>,
    ) {
        for captures in pattern.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let end = match_braces(content, whole.end());
            snippets.push(span_snippet(
                content,
                whole.start(),
                end,
                file_path,
                language,
                snippet_type,
                name.as_str(),
            ));
        }
    }
}

impl ExtractionStrategy for JavaScriptExtractor {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn extract(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeSnippet>> {
        let mut snippets = Vec::new();
        for pattern in FUNCTION_PATTERNS.iter() {
            Self::scan(
                pattern,
                content,
                file_path,
                language,
                SnippetType::Function,
                &mut snippets,
            );
        }
        Self::scan(
            &CLASS_PATTERN,
            content,
            file_path,
            language,
            SnippetType::Class,
            &mut snippets,
        );
        Ok(snippets)
    }
}
