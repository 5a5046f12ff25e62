use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ErrorCode, RelayError, Result};
use super::KvStore;

/// Embedded single-file engine.
///
/// rusqlite is blocking, so every call runs on the blocking pool while the
/// connection sits behind a mutex.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    bucket: String,
}

impl SqliteStore {
    pub async fn open(path: impl Into<PathBuf>, bucket: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let bucket = bucket.into();
        info!("Opening sqlite store at {}", path.display());

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path).map_err(|e| {
                RelayError::new(ErrorCode::StoreUnavailable, format!("Failed to open {}: {}", path.display(), e))
            })?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    bucket TEXT NOT NULL,
                    key    TEXT NOT NULL,
                    value  BLOB NOT NULL,
                    PRIMARY KEY (bucket, key)
                )",
            )?;
            Ok(conn)
        })
        .await
        .map_err(join_error)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            bucket,
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| RelayError::new(ErrorCode::InternalServerError, "sqlite connection mutex poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(join_error)?
    }
}

fn join_error(e: tokio::task::JoinError) -> RelayError {
    RelayError::new(ErrorCode::InternalServerError, format!("sqlite task failed: {}", e))
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM kv WHERE bucket = ?1 AND key = ?2",
                    params![bucket, key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RelayError::new(ErrorCode::StoreReadFailed, e.to_string()))?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        debug!("Writing {} bytes under {}/{}", value.len(), self.bucket, key);
        let bucket = self.bucket.clone();
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (bucket, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT (bucket, key) DO UPDATE SET value = excluded.value",
                params![bucket, key, &value[..]],
            )
            .map_err(|e| RelayError::new(ErrorCode::StoreWriteFailed, e.to_string()))?;
            Ok(())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
