//! Keyword-driven extraction for Go.

use super::{ExtractionStrategy, match_braces, span_snippet};
use crate::error::Result;
use crate::language::Language;
use crate::snippet::{CodeSnippet, SnippetType};
use regex::Regex;
use std::sync::LazyLock;

/// `func [(recv T)] name(params) [(results)]` followed by `{` or the end of the line.
static FUNC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)func\s+(?:\(\w+\s+\*?\w+\)\s+)?(\w+)\s*\([^)]*\)[ \t\r]*(?:\([^)]*\)[ \t\r]*)?(?:\{|$)")
        .expect("valid func pattern")
});

static STRUCT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"type\s+(\w+)\s+struct\s*\{").expect("valid struct pattern"));

/// Extracts `func` declarations and `type ... struct` definitions.
///
/// Functions whose signature ends in `{` are brace-matched. A signature with no
/// opening brace on its line (an interface method, say) spans to the end of that
/// line. Struct snippets start at the beginning of the line holding `type`.
///
/// Functions with a single unparenthesised result type (`func f() int {`) are
/// not matched and only show up through other snippets.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoExtractor;

impl GoExtractor {
    pub fn new() -> Self {
        Self
    }

    fn functions(content: &str, file_path: &str, language: Language, out: &mut Vec<CodeSnippet>) {
        for captures in FUNC_PATTERN.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let end = if whole.as_str().ends_with('{') {
                match_braces(content, whole.end())
            } else {
                let line_end = content[whole.end()..]
                    .find('\n')
                    .map_or(content.len(), |offset| whole.end() + offset);
                content[..line_end].trim_end_matches('\r').len()
            };
            out.push(span_snippet(
                content,
                whole.start(),
                end,
                file_path,
                language,
                SnippetType::Function,
                name.as_str(),
            ));
        }
    }

    fn structs(content: &str, file_path: &str, language: Language, out: &mut Vec<CodeSnippet>) {
        for captures in STRUCT_PATTERN.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let start = content[..whole.start()]
                .rfind('\n')
                .map_or(0, |newline| newline + 1);
            let end = match_braces(content, whole.end());
            out.push(span_snippet(
                content,
                start,
                end,
                file_path,
                language,
                SnippetType::Struct,
                name.as_str(),
            ));
        }
    }
}

impl ExtractionStrategy for GoExtractor {
    fn name(&self) -> &'static str {
        "go"
    }

    fn extract(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeSnippet>> {
        let mut snippets = Vec::new();
        Self::functions(content, file_path, language, &mut snippets);
        Self::structs(content, file_path, language, &mut snippets);
        Ok(snippets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = r#"package server

type Server struct {
	addr string
	opts map[string]struct{}
}

func NewServer(addr string) (*Server, error) {
	return &Server{addr: addr}, nil
}

func (s *Server) Start() {
	if s.addr == "" {
		panic("no addr")
	}
}
"#;

    fn extract(source: &str) -> Vec<CodeSnippet> {
        GoExtractor::new()
            .extract(source, "server.go", Language::Go)
            .unwrap()
    }

    #[test]
    fn test_functions_and_methods() {
        let snippets = extract(SERVER);
        let functions: Vec<&CodeSnippet> = snippets
            .iter()
            .filter(|s| s.snippet_type == SnippetType::Function)
            .collect();
        assert_eq!(functions.len(), 2);

        assert_eq!(functions[0].name.as_deref(), Some("NewServer"));
        assert_eq!((functions[0].start_line, functions[0].end_line), (8, 10));
        assert!(functions[0].content.ends_with("nil\n}"));

        assert_eq!(functions[1].name.as_deref(), Some("Start"));
        assert!(functions[1].content.starts_with("func (s *Server) Start() {"));
        assert_eq!((functions[1].start_line, functions[1].end_line), (12, 16));
    }

    #[test]
    fn test_struct_spans_from_line_start() {
        let source = "package p\n\n  type Point struct {\n\tX, Y int\n}\n";
        let snippets = extract(source);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].snippet_type, SnippetType::Struct);
        assert_eq!(snippets[0].name.as_deref(), Some("Point"));
        assert_eq!(snippets[0].content, "  type Point struct {\n\tX, Y int\n}");
        assert_eq!((snippets[0].start_line, snippets[0].end_line), (3, 5));
    }

    #[test]
    fn test_nested_braces_in_struct() {
        let snippets = extract(SERVER);
        let server = snippets
            .iter()
            .find(|s| s.snippet_type == SnippetType::Struct)
            .unwrap();
        assert_eq!(server.name.as_deref(), Some("Server"));
        assert_eq!((server.start_line, server.end_line), (3, 6));
    }

    #[test]
    fn test_signature_without_brace_spans_its_line() {
        let source = "package p\n\nfunc Reset()\n\nvar x = 1\n";
        let snippets = extract(source);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].content, "func Reset()");
        assert_eq!((snippets[0].start_line, snippets[0].end_line), (3, 3));
    }

    #[test]
    fn test_signature_without_brace_at_end_of_file() {
        let source = "package p\nfunc Flush(w Writer)";
        let snippets = extract(source);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].content, "func Flush(w Writer)");
        assert_eq!((snippets[0].start_line, snippets[0].end_line), (2, 2));
    }

    #[test]
    fn test_crlf_signature_without_brace() {
        let source = "func Reset()\r\nfunc Run() {\r\n}\r\n";
        let snippets = extract(source);
        let spans: Vec<(Option<&str>, usize, usize)> = snippets
            .iter()
            .map(|s| (s.name.as_deref(), s.start_line, s.end_line))
            .collect();
        assert_eq!(spans, vec![(Some("Reset"), 1, 1), (Some("Run"), 2, 3)]);
        assert_eq!(snippets[0].content, "func Reset()");
        assert_eq!(snippets[1].content, "func Run() {\r\n}");
    }

    #[test]
    fn test_single_result_type_is_not_matched() {
        let source = "package p\n\nfunc Count() int {\n\treturn 1\n}\n";
        assert!(extract(source).is_empty());
    }
}
