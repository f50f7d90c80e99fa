use clap::Parser;
use codeinsight_context::{ExtractorConfig, Language, SnippetExtractor};
use std::fs;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

/// Extract code snippets from a source file and print them as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// File path recorded on the snippets and used to detect the language.
    /// Defaults to the input path.
    #[arg(short, long)]
    path: Option<String>,

    /// Language tag overriding detection (e.g. `python`, `go`).
    #[arg(short, long)]
    language: Option<Language>,

    /// Lines per chunk for languages without a dedicated strategy.
    #[arg(short, long, default_value_t = codeinsight_context::DEFAULT_CHUNK_LINES)]
    chunk_lines: usize,
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let file_content = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let path = args
        .path
        .or(args.input)
        .unwrap_or_else(|| "stdin".to_string());
    let language = args.language.unwrap_or_else(|| Language::classify(&path));

    let extractor =
        SnippetExtractor::new(ExtractorConfig::default().with_chunk_lines(args.chunk_lines));
    let snippets = extractor.extract(&file_content, &path, language);

    let json_output = serde_json::to_string_pretty(&snippets)?;
    println!("{}", json_output);

    Ok(())
}
