//! SQLite storage backend for the Loam embedding cache.
//!
//! rusqlite is synchronous, so the connection lives behind a
//! `parking_lot::Mutex` and every trait method hops onto the blocking
//! pool. All writes go through this single serialized path.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use loam_core::{EmbeddingCache, LoamError, Result, StoredEmbedding};

/// Local persistent embedding store, one row per note id.
#[derive(Clone)]
pub struct SqliteEmbeddingCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEmbeddingCache {
    /// Open (or create) the cache at the given path. Parent directories
    /// are created idempotently.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LoamError::io(parent, e))?;
        }
        let conn = Connection::open(path).map_err(cache_err)?;
        Self::migrate(&conn)?;
        debug!("opened embedding cache at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An in-memory cache, for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(cache_err)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embeddings (
                note_id TEXT PRIMARY KEY,
                chunk_hash TEXT NOT NULL,
                model TEXT NOT NULL,
                vector_encoded TEXT NOT NULL,
                created_at_epoch_seconds INTEGER NOT NULL,
                content_preview TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_embeddings_note_model
                ON embeddings (note_id, model);",
        )
        .map_err(cache_err)
    }

    fn fetch_sync(conn: &Connection, note_id: &str) -> Result<Option<StoredEmbedding>> {
        conn.query_row(
            "SELECT note_id, chunk_hash, model, vector_encoded,
                    created_at_epoch_seconds, content_preview
             FROM embeddings WHERE note_id = ?1",
            params![note_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()
        .map_err(cache_err)?
        .map(|(note_id, chunk_hash, model, encoded, epoch, content_preview)| {
            let vector: Vec<f32> = serde_json::from_str(&encoded)
                .map_err(|e| LoamError::Cache(format!("corrupt vector for {note_id}: {e}")))?;
            let created_at = Utc
                .timestamp_opt(epoch, 0)
                .single()
                .ok_or_else(|| LoamError::Cache(format!("corrupt timestamp for {note_id}")))?;
            Ok(StoredEmbedding {
                note_id,
                chunk_hash,
                model,
                vector,
                created_at,
                content_preview,
            })
        })
        .transpose()
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            op(&guard)
        })
        .await
        .map_err(|e| LoamError::Cache(format!("blocking task failed: {e}")))?
    }
}

fn cache_err(e: rusqlite::Error) -> LoamError {
    LoamError::Cache(e.to_string())
}

#[async_trait]
impl EmbeddingCache for SqliteEmbeddingCache {
    async fn get(&self, note_id: &str) -> Result<Option<StoredEmbedding>> {
        let note_id = note_id.to_string();
        self.with_conn(move |conn| Self::fetch_sync(conn, &note_id))
            .await
    }

    async fn put(&self, embedding: &StoredEmbedding) -> Result<()> {
        let record = embedding.clone();
        self.with_conn(move |conn| {
            let encoded = serde_json::to_string(&record.vector)?;
            conn.execute(
                "INSERT OR REPLACE INTO embeddings
                    (note_id, chunk_hash, model, vector_encoded,
                     created_at_epoch_seconds, content_preview)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.note_id,
                    record.chunk_hash,
                    record.model,
                    encoded,
                    record.created_at.timestamp(),
                    record.content_preview,
                ],
            )
            .map_err(cache_err)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, note_id: &str) -> Result<()> {
        let note_id = note_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM embeddings WHERE note_id = ?1", params![note_id])
                .map_err(cache_err)?;
            Ok(())
        })
        .await
    }

    async fn is_fresh(
        &self,
        note_id: &str,
        model: &str,
        chunk_hash: &str,
        max_age_days: i64,
    ) -> Result<bool> {
        let note_id = note_id.to_string();
        let model = model.to_string();
        let chunk_hash = chunk_hash.to_string();
        self.with_conn(move |conn| {
            Ok(Self::fetch_sync(conn, &note_id)?
                .map(|record| record.is_fresh(&model, &chunk_hash, max_age_days))
                .unwrap_or(false))
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .map_err(cache_err)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(note_id: &str, chunk_hash: &str, model: &str) -> StoredEmbedding {
        StoredEmbedding {
            note_id: note_id.to_string(),
            chunk_hash: chunk_hash.to_string(),
            model: model.to_string(),
            vector: vec![0.25, -0.5, 0.125],
            created_at: Utc::now(),
            content_preview: "preview text".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_the_record() {
        let cache = SqliteEmbeddingCache::in_memory().unwrap();
        cache.put(&record("a", "h1", "m1")).await.unwrap();

        let stored = cache.get("a").await.unwrap().unwrap();
        assert_eq!(stored.note_id, "a");
        assert_eq!(stored.vector, vec![0.25, -0.5, 0.125]);
        assert_eq!(stored.content_preview, "preview text");
    }

    #[tokio::test]
    async fn put_replaces_existing_row() {
        let cache = SqliteEmbeddingCache::in_memory().unwrap();
        cache.put(&record("a", "h1", "m1")).await.unwrap();
        cache.put(&record("a", "h2", "m1")).await.unwrap();

        assert_eq!(cache.count().await.unwrap(), 1);
        assert_eq!(cache.get("a").await.unwrap().unwrap().chunk_hash, "h2");
    }

    #[tokio::test]
    async fn freshness_checks_model_and_hash() {
        let cache = SqliteEmbeddingCache::in_memory().unwrap();
        cache.put(&record("a", "h1", "m1")).await.unwrap();

        assert!(cache.is_fresh("a", "m1", "h1", 30).await.unwrap());
        assert!(!cache.is_fresh("a", "m2", "h1", 30).await.unwrap());
        assert!(!cache.is_fresh("a", "m1", "h2", 30).await.unwrap());
        assert!(!cache.is_fresh("missing", "m1", "h1", 30).await.unwrap());
    }

    #[tokio::test]
    async fn remove_deletes_the_row() {
        let cache = SqliteEmbeddingCache::in_memory().unwrap();
        cache.put(&record("a", "h1", "m1")).await.unwrap();
        cache.remove("a").await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("cache.db");
        let cache = SqliteEmbeddingCache::open(&db_path).unwrap();
        cache.put(&record("a", "h1", "m1")).await.unwrap();

        // Reopen and read back through a fresh connection.
        drop(cache);
        let reopened = SqliteEmbeddingCache::open(&db_path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
