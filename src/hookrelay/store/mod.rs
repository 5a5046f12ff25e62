//! Pluggable persistent key-value engines.
//!
//! Every engine stores opaque byte values under string keys inside a single
//! logical bucket. The relay only ever reads a record once at startup and
//! rewrites it in full on every mutation, so the trait stays minimal.

pub mod memory;
pub mod redis_store;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use log::info;

use crate::error::{ErrorCode, RelayError, Result};
use crate::hookrelay::config::{RelayConfig, StoreEngine};

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;
pub use self::sqlite::SqliteStore;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` when the key has never been written
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Opens the configured engine, bounded by the connect timeout
pub async fn open_store(config: &RelayConfig) -> Result<Arc<dyn KvStore>> {
    let timeout = config.connect_timeout();
    let bucket = config.bucket.clone();
    let target = config.db_path.first().cloned();

    let opening = async move {
        let store: Arc<dyn KvStore> = match config.store {
            StoreEngine::Memory => Arc::new(MemoryStore::new()),
            StoreEngine::Sqlite => {
                let path = target.ok_or_else(|| missing_target(config.store))?;
                Arc::new(SqliteStore::open(path, bucket).await?)
            }
            StoreEngine::Redis => {
                let url = target.ok_or_else(|| missing_target(config.store))?;
                Arc::new(RedisStore::connect(&url, bucket).await?)
            }
        };
        Ok::<_, RelayError>(store)
    };

    let store = tokio::time::timeout(timeout, opening)
        .await
        .map_err(|_| RelayError::new(
            ErrorCode::StoreUnavailable,
            format!("Timed out after {:?} opening {} store", timeout, config.store),
        ))??;

    info!("Opened {} store (bucket {})", store.name(), config.bucket);
    Ok(store)
}

fn missing_target(engine: StoreEngine) -> RelayError {
    RelayError::new(ErrorCode::ConfigInvalid, format!("No dbpath configured for {} store", engine))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_memory_engine() {
        let config = RelayConfig {
            store: StoreEngine::Memory,
            db_path: Vec::new(),
            ..RelayConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
        assert!(store.get("chat_ids").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn opens_sqlite_engine_at_first_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");
        let config = RelayConfig {
            store: StoreEngine::Sqlite,
            db_path: vec![path.to_string_lossy().into_owned()],
            ..RelayConfig::default()
        };

        let store = open_store(&config).await.unwrap();
        store.put("chat_ids", Bytes::from_static(b"1,2")).await.unwrap();
        assert_eq!(store.get("chat_ids").await.unwrap(), Some(Bytes::from_static(b"1,2")));
    }

    #[tokio::test]
    async fn missing_target_is_a_config_error() {
        let config = RelayConfig {
            store: StoreEngine::Redis,
            db_path: Vec::new(),
            ..RelayConfig::default()
        };
        let err = open_store(&config).await.err().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::ConfigInvalid));
    }
}
