//! Errors raised inside extraction strategies.
//!
//! None of these cross [`SnippetExtractor::extract`](crate::SnippetExtractor::extract):
//! parse failures trigger generic chunking and node failures are logged and
//! skipped by the strategy that hit them.

/// Result type for extraction strategies.
pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The structured parser rejected the file
    #[error("Failed to parse {file_path}: {message}")]
    Parse { file_path: String, message: String },

    /// A single definition could not be turned into a snippet
    #[error("Failed to extract {kind} at line {line} of {file_path}: {message}")]
    Node {
        file_path: String,
        kind: &'static str,
        line: usize,
        message: String,
    },

    /// The strategy could not be set up (grammar or pattern failure)
    #[error("Extraction strategy unavailable: {message}")]
    Strategy { message: String },
}

impl ExtractError {
    pub fn parse<S: Into<String>>(file_path: &str, message: S) -> Self {
        Self::Parse {
            file_path: file_path.to_string(),
            message: message.into(),
        }
    }

    pub fn node<S: Into<String>>(
        file_path: &str,
        kind: &'static str,
        line: usize,
        message: S,
    ) -> Self {
        Self::Node {
            file_path: file_path.to_string(),
            kind,
            line,
            message: message.into(),
        }
    }
}
