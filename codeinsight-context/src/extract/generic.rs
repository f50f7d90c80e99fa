//! Fixed-size line chunking for languages without a dedicated strategy.

use super::{DEFAULT_CHUNK_LINES, ExtractionStrategy};
use crate::error::Result;
use crate::language::Language;
use crate::snippet::{CodeSnippet, SnippetType};

/// Splits content into runs of `chunk_lines` lines.
///
/// Chunks that are blank after trimming are skipped. Chunk names carry the
/// chunk's position in the file, so a skipped blank chunk leaves a gap in the
/// numbering.
///
/// Lines are split on `\n`, so content ending in a newline has a final empty
/// line. A 130-line file with a trailing newline gives a last chunk spanning
/// lines 101 to 131.
#[derive(Debug, Clone, Copy)]
pub struct GenericChunker {
    chunk_lines: usize,
}

impl Default for GenericChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LINES)
    }
}

impl GenericChunker {
    pub fn new(chunk_lines: usize) -> Self {
        Self {
            chunk_lines: chunk_lines.max(1),
        }
    }

    pub fn chunk_lines(&self) -> usize {
        self.chunk_lines
    }

    pub fn chunk(&self, content: &str, file_path: &str, language: Language) -> Vec<CodeSnippet> {
        let lines: Vec<&str> = content.split('\n').collect();

        lines
            .chunks(self.chunk_lines)
            .enumerate()
            .filter_map(|(index, chunk)| {
                let text = chunk.join("\n");
                if text.trim().is_empty() {
                    return None;
                }
                let start_line = index * self.chunk_lines + 1;
                Some(CodeSnippet {
                    content: text,
                    file_path: file_path.to_string(),
                    language,
                    start_line,
                    end_line: start_line + chunk.len() - 1,
                    snippet_type: SnippetType::Chunk,
                    name: Some(format!("chunk_{}", index + 1)),
                    docstring: None,
                })
            })
            .collect()
    }
}

impl ExtractionStrategy for GenericChunker {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extract(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeSnippet>> {
        Ok(self.chunk(content, file_path, language))
    }
}
