use clap::{Parser, Subcommand};
use codeinsight_context::ExtractorConfig;
use codeinsight_retriever::{
    CodeInsightConfig,
    retrieval::{
        analyzer::CodeAnalyzer, retrieval_engine::RetrievalEngine, vector_index::QueryResult,
    },
    storage::MetadataFilter,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Index source code and search it by meaning.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ~/.codeinsight/config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding codeinsight.db
    #[arg(long)]
    db: Option<PathBuf>,

    /// Index name
    #[arg(long)]
    index: Option<String>,

    /// Local embedding model, or "hashing" for offline embeddings
    #[arg(long)]
    embedding_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index one or more files
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Index every file in a directory
    AddDir {
        dir: PathBuf,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Search the index
    Query {
        text: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 5)]
        n_results: usize,
        /// Only return snippets from this file
        #[arg(long)]
        file: Option<String>,
        /// Only return snippets in this language
        #[arg(long)]
        language: Option<String>,
        /// Index this file or directory into a temporary index and search it
        /// instead of the stored one
        #[arg(long)]
        path: Option<PathBuf>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Remove every snippet of a file from the index
    Delete { file: String },
    /// Show index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Remove every snippet from the index
    Clear,
    /// Print the snippets extracted from a file without indexing them
    Extract {
        path: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<CodeInsightConfig> {
    let mut config = CodeInsightConfig::load(args.config.as_deref())?;
    if let Some(db) = &args.db {
        config.vector_db_path = db.clone();
    }
    if let Some(index) = &args.index {
        config.index_name = index.clone();
    }
    if let Some(model) = &args.embedding_model {
        config.embedding_model = model.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_query_result(result: &QueryResult, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Summary => {
            println!("Found {} snippets for '{}':", result.count, result.query);
            for hit in &result.results {
                println!(
                    "  Distance: {:.3} | {} | {} | Lines: {}-{}",
                    hit.distance,
                    hit.metadata.get("name").map(String::as_str).unwrap_or("-"),
                    hit.metadata.get("file_path").map(String::as_str).unwrap_or("-"),
                    hit.metadata.get("start_line").map(String::as_str).unwrap_or("?"),
                    hit.metadata.get("end_line").map(String::as_str).unwrap_or("?"),
                );
            }
        }
        OutputFormat::Full => {
            for hit in &result.results {
                println!("Distance: {:.3}", hit.distance);
                println!("ID: {}", hit.id);
                for (key, value) in &hit.metadata {
                    println!("{key}: {value}");
                }
                println!("Content:\n{}", hit.document);
                println!("---");
            }
        }
    }
    Ok(())
}

fn extract(path: &Path, format: &OutputFormat, config: &CodeInsightConfig) -> anyhow::Result<()> {
    let analyzer =
        CodeAnalyzer::new(ExtractorConfig::default().with_chunk_lines(config.chunk_lines));
    let snippets = analyzer.analyze_file(path);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snippets)?),
        OutputFormat::Summary => {
            println!("Extracted {} snippets from {}:", snippets.len(), path.display());
            for snippet in &snippets {
                println!(
                    "  {} {} | Lines: {}-{}",
                    snippet.snippet_type,
                    snippet.name.as_deref().unwrap_or("-"),
                    snippet.start_line,
                    snippet.end_line
                );
            }
        }
        OutputFormat::Full => {
            for snippet in &snippets {
                println!(
                    "{} {} ({}-{})",
                    snippet.snippet_type,
                    snippet.name.as_deref().unwrap_or("-"),
                    snippet.start_line,
                    snippet.end_line
                );
                if let Some(docstring) = &snippet.docstring {
                    println!("Docstring: {docstring}");
                }
                println!("Content:\n{}", snippet.content);
                println!("---");
            }
        }
    }
    Ok(())
}

/// Engine over a temporary index holding only `path`.
async fn scratch_engine(path: &Path, config: &CodeInsightConfig) -> anyhow::Result<RetrievalEngine> {
    let engine = RetrievalEngine::in_memory(config).await?;
    let report = if path.is_dir() {
        engine.add_directory(path, true).await?
    } else {
        engine.add_file(path).await?
    };
    tracing::info!(
        "Indexed {} snippets from {} files under {}",
        report.snippets,
        report.files,
        path.display()
    );
    Ok(engine)
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if let Commands::Extract { path, format } = &args.command {
        return extract(path, format, &config);
    }

    let engine = match &args.command {
        Commands::Query {
            path: Some(path), ..
        } => scratch_engine(path, &config).await?,
        _ => RetrievalEngine::from_config(&config).await?,
    };
    match args.command {
        Commands::Add { paths } => {
            let report = engine.add_files(&paths).await?;
            println!(
                "Added {} snippets from {} files",
                report.snippets, report.files
            );
        }
        Commands::AddDir { dir, recursive } => {
            let report = engine.add_directory(&dir, recursive).await?;
            println!(
                "Added {} snippets from {} files under {}",
                report.snippets,
                report.files,
                dir.display()
            );
        }
        Commands::Query {
            text,
            n_results,
            file,
            language,
            format,
            ..
        } => {
            let mut filter = MetadataFilter::new();
            if let Some(file) = file {
                filter = filter.with("file_path", file);
            }
            if let Some(language) = language {
                filter = filter.with("language", language.to_lowercase());
            }
            let result = engine
                .index()
                .search(&text, n_results, (!filter.is_empty()).then_some(&filter))
                .await?;
            print_query_result(&result, &format)?;
        }
        Commands::Delete { file } => {
            let deleted = engine.delete_by_file(&file).await?;
            println!("Deleted {deleted} snippets for {file}");
        }
        Commands::Stats { format } => {
            let stats = engine.stats().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Index: {}", stats.index_name);
                    println!("Location: {}", stats.location);
                    println!("Snippets: {}", stats.count);
                    println!(
                        "Embeddings: {} ({} dimensions)",
                        engine.index().provider().provider_name(),
                        engine.index().provider().embedding_dimension()
                    );
                }
            }
        }
        Commands::Clear => {
            let removed = engine.clear().await?;
            println!("Removed {removed} snippets from {}", config.index_name);
        }
        Commands::Extract { .. } => {}
    }
    Ok(())
}
