use anyhow::Result;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MATH_PY: &str = "def add(a, b):\n    \"\"\"Add two numbers.\"\"\"\n    return a + b\n\n\ndef sub(a, b):\n    \"\"\"Subtract two numbers.\"\"\"\n    return a - b\n";

/// Helper to run the CLI binary against an index in `temp_dir`
fn run_cli(temp_dir: &TempDir, args: &[&str]) -> Result<Output> {
    let config = temp_dir.path().join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "embedding_model = \"hashing\"\n")?;
    }

    let output = Command::new(env!("CARGO_BIN_EXE_codeinsight"))
        .arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(temp_dir.path().join("vectordb"))
        .args(args)
        .env("RUST_LOG", "error")
        .env_remove("CODEINSIGHT_VECTOR_DB_PATH")
        .env_remove("EMBEDDING_MODEL")
        .env_remove("USE_MISTRAL_EMBEDDINGS")
        .output()?;
    Ok(output)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn write_source(temp_dir: &TempDir) -> Result<String> {
    let path = temp_dir.path().join("math.py");
    std::fs::write(&path, MATH_PY)?;
    Ok(path_str(&path))
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn test_add_query_delete_roundtrip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = write_source(&temp_dir)?;

    let output = run_cli(&temp_dir, &["add", &source])?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Added 2 snippets from 1 files"));

    let output = run_cli(&temp_dir, &["query", "subtract two numbers", "-n", "1", "-f", "json"])?;
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["metadata"]["name"], "sub");

    let output = run_cli(&temp_dir, &["stats", "-f", "json"])?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["count"], 2);
    assert_eq!(json["index_name"], "codeinsight_codebase");

    let output = run_cli(&temp_dir, &["delete", &source])?;
    assert!(stdout(&output).contains("Deleted 2 snippets"));

    let output = run_cli(&temp_dir, &["query", "subtract", "-f", "json"])?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["count"], 0);
    Ok(())
}

#[test]
fn test_add_dir_and_clear() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let repo = temp_dir.path().join("repo");
    std::fs::create_dir_all(repo.join("pkg"))?;
    std::fs::write(repo.join("math.py"), MATH_PY)?;
    std::fs::write(repo.join("pkg/app.js"), "function start() {\n  return 1;\n}\n")?;

    let output = run_cli(&temp_dir, &["add-dir", &path_str(&repo)])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Added 2 snippets from 1 files"));

    let output = run_cli(&temp_dir, &["add-dir", &path_str(&repo), "--recursive"])?;
    assert!(stdout(&output).contains("Added 3 snippets from 2 files"));

    let output = run_cli(&temp_dir, &["query", "start", "--language", "JavaScript", "-f", "json"])?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["metadata"]["name"], "start");

    let output = run_cli(&temp_dir, &["clear"])?;
    assert!(stdout(&output).contains("Removed 3 snippets"));
    Ok(())
}

#[test]
fn test_extract_prints_snippets() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = write_source(&temp_dir)?;

    let output = run_cli(&temp_dir, &["extract", &source, "-f", "json"])?;
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let snippets = json.as_array().unwrap();
    assert_eq!(snippets.len(), 2);
    assert_eq!(snippets[0]["name"], "add");
    assert_eq!(snippets[0]["snippet_type"], "function");
    assert_eq!(snippets[1]["docstring"], "Subtract two numbers.");
    assert!(!temp_dir.path().join("vectordb").exists());
    Ok(())
}

#[test]
fn test_query_path_uses_temporary_index() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = write_source(&temp_dir)?;

    let output = run_cli(
        &temp_dir,
        &["query", "subtract two numbers", "--path", &source, "-n", "1", "-f", "json"],
    )?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["metadata"]["name"], "sub");
    assert!(!temp_dir.path().join("vectordb").exists());
    Ok(())
}

#[test]
fn test_invalid_format_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_cli(&temp_dir, &["stats", "-f", "xml"])?;
    assert!(!output.status.success());
    Ok(())
}
