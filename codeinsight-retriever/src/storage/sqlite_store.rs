//! SQLite implementation of the storage traits
//!
//! All collections share one `entries` table in `codeinsight.db`:
//!
//! ```sql
//! CREATE TABLE entries (
//!     collection TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     document TEXT NOT NULL,
//!     metadata TEXT NOT NULL,      -- JSON object of strings
//!     file_path TEXT,              -- denormalized from metadata
//!     embedding BLOB NOT NULL,     -- f16 vector
//!     created_at TIMESTAMP NOT NULL,
//!     updated_at TIMESTAMP NOT NULL,
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! Similarity search is a linear scan in memory over the collection.

use super::{
    CombinedStore, EmbeddingStore, Entry, EntryStore, EntryUpdate, FILE_PATH_KEY, Metadata,
    MetadataFilter, cosine_distance,
};
use crate::error::{Result, RetrieverError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use half::f16;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

/// File name of the database inside the index location.
pub const DB_FILE_NAME: &str = "codeinsight.db";

const SELECT_COLUMNS: &str = "SELECT id, document, metadata, embedding, updated_at FROM entries";

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    /// Database file, or None for an in-memory store
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (creating if needed) `<location>/codeinsight.db`.
    pub async fn open(location: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(location).await?;
        let db_path = location.join(DB_FILE_NAME);

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true)
                .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Full)
                .page_size(1 << 16)
                .optimize_on_close(true, 1 << 10),
        )
        .await?;
        tracing::debug!("Opened index database at {}", db_path.display());
        Self::new_with_pool(pool, Some(db_path)).await
    }

    /// In-memory store for tests. A single connection keeps the database alive.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool, None).await
    }

    async fn new_with_pool(pool: SqlitePool, db_path: Option<PathBuf>) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool, db_path })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL,
                file_path TEXT,
                embedding BLOB NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entries_file_path ON entries(collection, file_path)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Names of all collections holding at least one entry.
    pub async fn collections(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT collection FROM entries ORDER BY collection",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Rows of `collection`, narrowed in SQL by `file_path` when the filter has one.
    async fn fetch_rows(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Entry>> {
        let file_path = filter.get(FILE_PATH_KEY);
        let sql = match file_path {
            Some(_) => format!(
                "{SELECT_COLUMNS} WHERE collection = ?1 AND file_path = ?2 ORDER BY created_at, id"
            ),
            None => format!("{SELECT_COLUMNS} WHERE collection = ?1 ORDER BY created_at, id"),
        };

        let mut query = sqlx::query(&sql).bind(collection);
        if let Some(file_path) = file_path {
            query = query.bind(file_path);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut entries = Vec::new();
        for row in &rows {
            let entry = decode_entry(row)?;
            if filter.matches(&entry.metadata) {
                entries.push(entry);
                if limit.is_some_and(|limit| entries.len() >= limit) {
                    break;
                }
            }
        }
        Ok(entries)
    }

    async fn rank(
        &self,
        collection: &str,
        query: &[f16],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(Entry, f32)>> {
        let candidates = self.fetch_rows(collection, filter, None).await?;

        let mut scored = Vec::with_capacity(candidates.len());
        for entry in candidates {
            if entry.embedding.len() != query.len() {
                tracing::warn!(
                    "Skipping entry {} with embedding dimension {} (query has {})",
                    entry.id,
                    entry.embedding.len(),
                    query.len()
                );
                continue;
            }
            let distance = cosine_distance(query, &entry.embedding);
            scored.push((entry, distance));
        }

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn embedding_bytes(embedding: &[f16]) -> &[u8] {
    bytemuck::cast_slice::<f16, u8>(embedding)
}

fn decode_embedding(id: &str, bytes: &[u8]) -> Result<Vec<f16>> {
    if bytes.len() % 2 != 0 {
        return Err(RetrieverError::corrupt(format!(
            "embedding of entry {id} has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(bytemuck::pod_read_unaligned::<f16>)
        .collect())
}

fn decode_entry(row: &SqliteRow) -> Result<Entry> {
    let id: String = row.try_get("id")?;
    let document: String = row.try_get("document")?;
    let metadata_json: String = row.try_get("metadata")?;
    let embedding: Vec<u8> = row.try_get("embedding")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| RetrieverError::corrupt(format!("metadata of entry {id}: {e}")))?;
    let embedding = decode_embedding(&id, &embedding)?;

    Ok(Entry {
        id,
        document,
        metadata,
        embedding,
        updated_at: Some(updated_at),
    })
}

fn encode_metadata(metadata: &Metadata) -> Result<String> {
    serde_json::to_string(metadata)
        .map_err(|e| RetrieverError::corrupt(format!("unencodable metadata: {e}")))
}

#[async_trait]
impl EntryStore for SqliteStore {
    async fn upsert_entries(&self, collection: &str, entries: Vec<Entry>) -> Result<Vec<String>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let metadata = encode_metadata(&entry.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO entries
                    (collection, id, document, metadata, file_path, embedding, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    metadata = excluded.metadata,
                    file_path = excluded.file_path,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(collection)
            .bind(&entry.id)
            .bind(&entry.document)
            .bind(metadata)
            .bind(entry.file_path())
            .bind(embedding_bytes(&entry.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(entry.id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn get_entry(&self, collection: &str, id: &str) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE collection = ?1 AND id = ?2"
        ))
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_entry).transpose()
    }

    async fn update_entry(&self, collection: &str, id: &str, update: EntryUpdate) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE collection = ?1 AND id = ?2"
        ))
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(RetrieverError::not_found(id));
        };
        let mut entry = decode_entry(&row)?;

        if let Some(document) = update.document {
            entry.document = document;
        }
        if let Some(metadata) = update.metadata {
            entry.metadata = metadata;
        }
        if let Some(embedding) = update.embedding {
            entry.embedding = embedding;
        }

        sqlx::query(
            r#"
            UPDATE entries
            SET document = ?1, metadata = ?2, file_path = ?3, embedding = ?4, updated_at = ?5
            WHERE collection = ?6 AND id = ?7
            "#,
        )
        .bind(&entry.document)
        .bind(encode_metadata(&entry.metadata)?)
        .bind(entry.file_path())
        .bind(embedding_bytes(&entry.embedding))
        .bind(Utc::now())
        .bind(collection)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_file(&self, collection: &str, file_path: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM entries WHERE collection = ?1 AND file_path = ?2")
            .bind(collection)
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn list_entries(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Entry>> {
        self.fetch_rows(collection, filter, limit).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn clear(&self, collection: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM entries WHERE collection = ?1")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl EmbeddingStore for SqliteStore {
    async fn get_embedding(&self, collection: &str, id: &str) -> Result<Option<Vec<f16>>> {
        let bytes: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT embedding FROM entries WHERE collection = ?1 AND id = ?2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        bytes.map(|bytes| decode_embedding(id, &bytes)).transpose()
    }

    async fn search_similar(
        &self,
        collection: &str,
        query: &[f16],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(String, f32)>> {
        let ranked = self.rank(collection, query, limit, filter).await?;
        Ok(ranked
            .into_iter()
            .map(|(entry, distance)| (entry.id, distance))
            .collect())
    }
}

#[async_trait]
impl CombinedStore for SqliteStore {
    async fn search_entries(
        &self,
        collection: &str,
        query: &[f16],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(Entry, f32)>> {
        self.rank(collection, query, limit, filter).await
    }
}
