//! Source language classification by file extension.
//!
//! [`Language::classify`] is total: any name without a known extension maps to
//! [`Language::Unknown`], which the extractor treats with generic chunking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Declared source language of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Cpp,
    C,
    Rust,
    Ruby,
    Php,
    CSharp,
    Swift,
    Kotlin,
    Scala,
    R,
    Julia,
    Lua,
    Dart,
    Elixir,
    OCaml,
    Haskell,
    Perl,
    Bash,
    Sql,
    Html,
    Css,
    Xml,
    Json,
    Yaml,
    Markdown,
    ReStructuredText,
    Latex,
    Unknown,
}

/// Extension (lowercase, without the dot) to language table.
const EXTENSIONS: &[(&str, Language)] = &[
    ("py", Language::Python),
    ("js", Language::JavaScript),
    ("ts", Language::TypeScript),
    ("go", Language::Go),
    ("java", Language::Java),
    ("cpp", Language::Cpp),
    ("c", Language::C),
    ("rs", Language::Rust),
    ("rb", Language::Ruby),
    ("php", Language::Php),
    ("cs", Language::CSharp),
    ("swift", Language::Swift),
    ("kt", Language::Kotlin),
    ("scala", Language::Scala),
    ("r", Language::R),
    ("jl", Language::Julia),
    ("lua", Language::Lua),
    ("dart", Language::Dart),
    ("ex", Language::Elixir),
    ("ml", Language::OCaml),
    ("hs", Language::Haskell),
    ("pl", Language::Perl),
    ("sh", Language::Bash),
    ("sql", Language::Sql),
    ("html", Language::Html),
    ("css", Language::Css),
    ("xml", Language::Xml),
    ("json", Language::Json),
    ("yaml", Language::Yaml),
    ("yml", Language::Yaml),
    ("md", Language::Markdown),
    ("rst", Language::ReStructuredText),
    ("tex", Language::Latex),
];

impl Language {
    /// Classify a file name or path by its extension, case-insensitively.
    ///
    /// ```
    /// use codeinsight_context::Language;
    ///
    /// assert_eq!(Language::classify("src/app.PY"), Language::Python);
    /// assert_eq!(Language::classify("config.yml"), Language::Yaml);
    /// assert_eq!(Language::classify("Makefile"), Language::Unknown);
    /// ```
    pub fn classify(file_name: impl AsRef<Path>) -> Self {
        file_name
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Look up an extension without its leading dot.
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, language)| *language)
            .unwrap_or(Language::Unknown)
    }

    /// The tag stored in snippet metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::CSharp => "csharp",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::R => "r",
            Language::Julia => "julia",
            Language::Lua => "lua",
            Language::Dart => "dart",
            Language::Elixir => "elixir",
            Language::OCaml => "ocaml",
            Language::Haskell => "haskell",
            Language::Perl => "perl",
            Language::Bash => "bash",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Xml => "xml",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Markdown => "markdown",
            Language::ReStructuredText => "restructuredtext",
            Language::Latex => "latex",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Language::Unknown
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = std::convert::Infallible;

    /// Parses a tag back into a language; unrecognised tags become `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.to_ascii_lowercase();
        let language = EXTENSIONS
            .iter()
            .map(|(_, language)| *language)
            .find(|language| language.as_str() == tag)
            .unwrap_or(Language::Unknown);
        Ok(language)
    }
}
