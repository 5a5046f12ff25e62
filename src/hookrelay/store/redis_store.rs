use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::error::{ErrorCode, RelayError, Result};
use super::KvStore;

/// Networked engine on a single multiplexed connection.
///
/// Keys are namespaced as `{bucket}:{key}`.
pub struct RedisStore {
    conn: MultiplexedConnection,
    bucket: String,
}

impl RedisStore {
    pub async fn connect(url: &str, bucket: impl Into<String>) -> Result<Self> {
        info!("Connecting to redis store at {}", url);
        let client = redis::Client::open(url)
            .map_err(|e| RelayError::new(ErrorCode::ConfigInvalid, format!("Invalid redis url {}: {}", url, e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RelayError::new(ErrorCode::StoreUnavailable, format!("Failed to connect to {}: {}", url, e)))?;

        Ok(Self {
            conn,
            bucket: bucket.into(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.bucket, key)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn
            .get(self.namespaced(key))
            .await
            .map_err(|e| RelayError::new(ErrorCode::StoreReadFailed, e.to_string()))?;
        Ok(value.map(Bytes::from))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let key = self.namespaced(key);
        debug!("Writing {} bytes under {}", value.len(), key);
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, &value[..])
            .await
            .map_err(|e| RelayError::new(ErrorCode::StoreWriteFailed, e.to_string()))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
