//! Python extraction backed by the tree-sitter grammar.
//!
//! The whole file is parsed; any error node in the tree rejects the file with
//! [`ExtractError::Parse`] so the caller can chunk it instead. On a clean parse
//! the extractor emits:
//!
//! - a `module_docstring` snippet named `module` when the first statement is a
//!   string literal,
//! - one snippet per `def`/`async def` and `class`, nested ones included, in
//!   preorder. Each carries the verbatim source lines of the definition and its
//!   cleaned docstring.

use super::ExtractionStrategy;
use crate::error::{ExtractError, Result};
use crate::language::Language;
use crate::snippet::{CodeSnippet, SnippetType};
use tree_sitter::{Node, Parser};

/// Lines assumed for a function whose end cannot be read from the tree.
const FUNCTION_FALLBACK_LINES: usize = 10;
/// Lines assumed for a class whose end cannot be read from the tree.
const CLASS_FALLBACK_LINES: usize = 20;

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonExtractor;

impl PythonExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parser() -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
            .map_err(|e| ExtractError::Strategy {
                message: format!("Python grammar rejected: {e}"),
            })?;
        Ok(parser)
    }

    fn module_docstring(
        root: Node,
        source: &[u8],
        file_path: &str,
        language: Language,
    ) -> Option<CodeSnippet> {
        let literal = leading_string(root)?;
        let text = docstring_text(literal, source)?;
        Some(CodeSnippet {
            content: text,
            file_path: file_path.to_string(),
            language,
            start_line: literal.start_position().row + 1,
            end_line: literal.end_position().row + 1,
            snippet_type: SnippetType::ModuleDocstring,
            name: Some("module".to_string()),
            docstring: None,
        })
    }

    fn definition(
        node: Node,
        snippet_type: SnippetType,
        lines: &[&str],
        source: &[u8],
        file_path: &str,
        language: Language,
    ) -> Result<CodeSnippet> {
        let start_row = node.start_position().row;
        let kind = snippet_type.as_str();

        let name = node
            .child_by_field_name("name")
            .ok_or_else(|| ExtractError::node(file_path, kind, start_row + 1, "missing name"))?
            .utf8_text(source)
            .map_err(|e| ExtractError::node(file_path, kind, start_row + 1, e.to_string()))?;

        let end_row = if node.end_byte() > node.start_byte() {
            node.end_position().row
        } else {
            let fallback = match snippet_type {
                SnippetType::Class => CLASS_FALLBACK_LINES,
                _ => FUNCTION_FALLBACK_LINES,
            };
            start_row + fallback
        };
        let last_row = lines.len().saturating_sub(1);
        let end_row = end_row.min(last_row).max(start_row);

        let content = lines
            .get(start_row..=end_row)
            .ok_or_else(|| {
                ExtractError::node(file_path, kind, start_row + 1, "span outside the file")
            })?
            .join("\n");

        let docstring = node
            .child_by_field_name("body")
            .and_then(leading_string)
            .and_then(|literal| docstring_text(literal, source));

        Ok(CodeSnippet {
            content,
            file_path: file_path.to_string(),
            language,
            start_line: start_row + 1,
            end_line: end_row + 1,
            snippet_type,
            name: Some(name.to_string()),
            docstring,
        })
    }
}

impl ExtractionStrategy for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extract(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeSnippet>> {
        let mut parser = Self::parser()?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ExtractError::parse(file_path, "parser returned no tree"))?;
        let root = tree.root_node();

        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            return Err(ExtractError::parse(
                file_path,
                format!("syntax error near line {line}"),
            ));
        }

        let source = content.as_bytes();
        let lines: Vec<&str> = content.split('\n').collect();
        let mut snippets = Vec::new();

        if let Some(docstring) = Self::module_docstring(root, source, file_path, language) {
            snippets.push(docstring);
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let snippet_type = match node.kind() {
                "function_definition" => Some(SnippetType::Function),
                "class_definition" => Some(SnippetType::Class),
                _ => None,
            };
            if let Some(snippet_type) = snippet_type {
                match Self::definition(node, snippet_type, &lines, source, file_path, language) {
                    Ok(snippet) => snippets.push(snippet),
                    Err(e) => tracing::warn!("Skipping definition: {e}"),
                }
            }

            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        Ok(snippets)
    }
}

/// The string literal opening `block`, if its first statement is one.
/// Implicitly concatenated literals count as one.
fn leading_string(block: Node) -> Option<Node> {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    first
        .named_child(0)
        .filter(|child| matches!(child.kind(), "string" | "concatenated_string"))
}

/// Cleaned docstring of a `string` or `concatenated_string` node.
fn docstring_text(literal: Node, source: &[u8]) -> Option<String> {
    if literal.kind() != "concatenated_string" {
        return clean_docstring(literal.utf8_text(source).ok()?);
    }
    let mut cursor = literal.walk();
    let mut body = String::new();
    for part in literal
        .named_children(&mut cursor)
        .filter(|part| part.kind() == "string")
    {
        body.push_str(literal_body(part.utf8_text(source).ok()?)?);
    }
    clean_body(&body)
}

/// 1-based line of the first error or missing node.
fn first_error_line(root: Node) -> Option<usize> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).filter(|c| c.has_error()).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Turns a string literal into docstring text.
///
/// The prefix and quotes are stripped, leading whitespace is removed from the
/// first line, the common indentation of the remaining lines is removed, and
/// blank lines at either end are dropped. Byte strings and f-strings are not
/// docstrings. Escape sequences are kept as written.
fn clean_docstring(literal: &str) -> Option<String> {
    clean_body(literal_body(literal)?)
}

/// Text between the quotes of a literal, or `None` for bytes and f-strings.
fn literal_body(literal: &str) -> Option<&str> {
    let prefix_len = literal
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(literal.len());
    let prefix = literal[..prefix_len].to_ascii_lowercase();
    if prefix.contains('b') || prefix.contains('f') {
        return None;
    }
    let quoted = &literal[prefix_len..];
    let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        3
    } else {
        1
    };
    if quoted.len() < quote_len * 2 {
        return None;
    }
    Some(&quoted[quote_len..quoted.len() - quote_len])
}

fn clean_body(body: &str) -> Option<String> {
    let expanded = body.replace('\t', "        ");
    let mut lines: Vec<&str> = expanded.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    cleaned.push(lines.remove(0).trim_start().to_string());
    for line in lines {
        let stripped = line.get(indent..).unwrap_or_else(|| line.trim_start());
        cleaned.push(stripped.trim_end().to_string());
    }
    if let Some(first) = cleaned.first_mut() {
        *first = first.trim_end().to_string();
    }

    while cleaned.first().is_some_and(|line| line.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|line| line.is_empty()) {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}
