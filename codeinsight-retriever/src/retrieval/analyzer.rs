//! Turns files and directory trees into snippets.

use codeinsight_context::{CodeSnippet, ExtractorConfig, Language, SnippetExtractor};
use ignore::WalkBuilder;
use std::path::Path;

/// Files larger than this are not indexed.
pub const MAX_FILE_SIZE: u64 = 1 << 20;

/// Path fragments that exclude a file from directory walks.
pub const IGNORE_MARKERS: &[&str] = &[
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    "node_modules",
    ".idea",
    ".vscode",
    "dist",
    "build",
    ".egg-info",
    ".pytest_cache",
    ".mypy_cache",
];

/// True when `relative_path` contains any ignore marker as a substring.
pub fn is_ignored(relative_path: &str) -> bool {
    IGNORE_MARKERS
        .iter()
        .any(|marker| relative_path.contains(marker))
}

#[derive(Debug, Default)]
pub struct CodeAnalyzer {
    extractor: SnippetExtractor,
}

impl CodeAnalyzer {
    pub fn new(config: ExtractorConfig) -> Self {
        Self::with_extractor(SnippetExtractor::new(config))
    }

    pub fn with_extractor(extractor: SnippetExtractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &SnippetExtractor {
        &self.extractor
    }

    /// Extracts snippets from one file on disk.
    ///
    /// Oversized, binary and unreadable files yield no snippets.
    pub fn analyze_file(&self, path: &Path) -> Vec<CodeSnippet> {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.len() > MAX_FILE_SIZE => {
                tracing::debug!(
                    "Skipping {} ({} bytes exceeds the size limit)",
                    path.display(),
                    metadata.len()
                );
                return Vec::new();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Cannot stat {}: {e}", path.display());
                return Vec::new();
            }
        }

        let buf = match std::fs::read(path) {
            Ok(buf) => buf,
            Err(e) => {
                tracing::warn!("Cannot read {}: {e}", path.display());
                return Vec::new();
            }
        };
        if buf.contains(&0) {
            tracing::debug!("Skipping binary file {}", path.display());
            return Vec::new();
        }

        let content = String::from_utf8_lossy(&buf);
        let file_path = path.to_string_lossy();
        self.extractor
            .extract(&content, &file_path, Language::classify(path))
    }

    /// Extracts snippets from in-memory content named `file_name`.
    pub fn analyze_source(&self, file_name: &str, content: &str) -> Vec<CodeSnippet> {
        self.extractor
            .extract(content, file_name, Language::classify(file_name))
    }

    /// Walks `root` and extracts snippets from every file not under an ignore
    /// marker. Without `recursive` only the top level is visited.
    pub fn analyze_directory(&self, root: &Path, recursive: bool) -> Vec<CodeSnippet> {
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(if recursive { None } else { Some(1) })
            .threads(1)
            .build();

        let mut snippets = Vec::new();
        let mut files = 0usize;
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Error walking directory: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if is_ignored(&relative.to_string_lossy()) {
                tracing::debug!("Ignoring {}", path.display());
                continue;
            }

            files += 1;
            snippets.extend(self.analyze_file(path));
        }

        tracing::info!(
            "Extracted {} snippets from {} files under {}",
            snippets.len(),
            files,
            root.display()
        );
        snippets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeinsight_context::SnippetType;
    use std::collections::BTreeSet;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    const PY: &str = "def add(a, b):\n    \"\"\"Add two numbers.\"\"\"\n    return a + b\n";

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn names(snippets: &[CodeSnippet]) -> BTreeSet<String> {
        snippets.iter().filter_map(|s| s.name.clone()).collect()
    }

    #[test]
    fn test_ignore_markers_are_substrings() {
        assert!(is_ignored("node_modules/pkg/index.js"));
        assert!(is_ignored("src/__pycache__/mod.py"));
        assert!(is_ignored("rebuild.py"));
        assert!(!is_ignored("src/main.py"));
    }

    #[test]
    fn test_analyze_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "math.py", PY.as_bytes());

        let snippets = CodeAnalyzer::default().analyze_file(&dir.path().join("math.py"));
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].snippet_type, SnippetType::Function);
        assert_eq!(snippets[0].language, Language::Python);
        assert!(snippets[0].file_path.ends_with("math.py"));
    }

    #[traced_test]
    #[test]
    fn test_unreadable_and_binary_files_yield_nothing() {
        let dir = tempdir().unwrap();
        write(dir.path(), "blob.py", b"def f():\0\n    pass\n");
        let analyzer = CodeAnalyzer::default();

        assert!(analyzer.analyze_file(&dir.path().join("blob.py")).is_empty());
        assert!(analyzer.analyze_file(&dir.path().join("missing.py")).is_empty());
        assert!(logs_contain("Cannot stat"));
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let dir = tempdir().unwrap();
        let big = "x = 1\n".repeat((MAX_FILE_SIZE as usize / 6) + 1);
        write(dir.path(), "big.py", big.as_bytes());
        assert!(CodeAnalyzer::default().analyze_file(&dir.path().join("big.py")).is_empty());
    }

    #[test]
    fn test_analyze_source_classifies_by_name() {
        let analyzer = CodeAnalyzer::default();
        let snippets = analyzer.analyze_source("upload.py", PY);
        assert_eq!(names(&snippets), BTreeSet::from(["add".to_string()]));

        let snippets = analyzer.analyze_source("notes.txt", "hello\nworld\n");
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].language, Language::Unknown);
        assert_eq!(snippets[0].name.as_deref(), Some("chunk_1"));
    }

    #[test]
    fn test_analyze_directory() {
        let dir = tempdir().unwrap();
        write(dir.path(), "top.py", PY.as_bytes());
        write(
            dir.path(),
            "pkg/nested.go",
            b"package pkg\n\nfunc Nested() {\n}\n",
        );
        write(dir.path(), "node_modules/dep/index.js", b"function dep() {}\n");
        write(dir.path(), ".git/config", b"[core]\n");
        write(dir.path(), "broken.py", b"def broken(:\n    pass\n");

        let analyzer = CodeAnalyzer::default();

        let all = analyzer.analyze_directory(dir.path(), true);
        let found = names(&all);
        assert!(found.contains("add"));
        assert!(found.contains("Nested"));
        assert!(!found.contains("dep"));
        assert!(all.iter().all(|s| !s.file_path.contains(".git")));
        // Invalid Python still contributes a line chunk
        assert!(
            all.iter()
                .any(|s| s.file_path.ends_with("broken.py") && s.snippet_type == SnippetType::Chunk)
        );

        let top_level = analyzer.analyze_directory(dir.path(), false);
        let found = names(&top_level);
        assert!(found.contains("add"));
        assert!(!found.contains("Nested"));
    }
}
