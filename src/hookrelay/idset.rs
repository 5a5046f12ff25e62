//! Durable ordered set of chat identities.
//!
//! The whole set lives in one record as a comma-joined list. Mutations are
//! serialized through a single async writer lock and follow write-then-update:
//! the new list is persisted first and only then published to readers, so a
//! failed write leaves the in-memory view equal to what is stored.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::error::{ErrorCode, RelayError, Result};
use crate::hookrelay::store::KvStore;
use crate::hookrelay::types::ChatId;

pub struct IdSet {
    key: &'static str,
    store: Arc<dyn KvStore>,
    ids: RwLock<Vec<ChatId>>,
    writer: Mutex<()>,
}

impl IdSet {
    /// Reads the record under `key`. A missing or unreadable record yields
    /// an empty set.
    pub async fn load(store: Arc<dyn KvStore>, key: &'static str) -> Self {
        let ids = match store.get(key).await {
            Ok(Some(raw)) => decode(&raw),
            Ok(None) => {
                debug!("No record under {}, starting empty", key);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to read {} from {} store, starting empty: {}", key, store.name(), e);
                Vec::new()
            }
        };
        debug!("Loaded {} ids from {}", ids.len(), key);

        Self {
            key,
            store,
            ids: RwLock::new(ids),
            writer: Mutex::new(()),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().iter().any(|existing| existing == id)
    }

    /// Current members in insertion order
    pub fn snapshot(&self) -> Vec<ChatId> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Appends `id` unless present. Returns whether the set changed.
    ///
    /// Ids that would not survive a reload unchanged are refused with
    /// `MalformedId`.
    pub async fn insert(&self, id: &str) -> Result<bool> {
        if !is_storable(id) {
            return Err(RelayError::new(ErrorCode::MalformedId, format!("{:?} is not a storable id", id)));
        }
        let _writer = self.writer.lock().await;

        let mut next = self.snapshot();
        if next.iter().any(|existing| existing == id) {
            return Ok(false);
        }
        next.push(id.to_string());

        self.persist(next).await?;
        Ok(true)
    }

    /// Removes `id` if present. Returns whether the set changed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _writer = self.writer.lock().await;

        let mut next = self.snapshot();
        let Some(pos) = next.iter().position(|existing| existing == id) else {
            return Ok(false);
        };
        next.remove(pos);

        self.persist(next).await?;
        Ok(true)
    }

    async fn persist(&self, next: Vec<ChatId>) -> Result<()> {
        self.store.put(self.key, encode(&next)).await?;
        *self.write() = next;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ChatId>> {
        self.ids.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ChatId>> {
        self.ids.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Non-empty, no record delimiter, no whitespace
pub fn is_storable(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c == ',' || c.is_whitespace())
}

pub fn encode(ids: &[ChatId]) -> Bytes {
    Bytes::from(ids.join(","))
}

/// Splits a stored record, dropping empty segments and repeated ids
pub fn decode(raw: &[u8]) -> Vec<ChatId> {
    let mut ids: Vec<ChatId> = Vec::new();
    for part in String::from_utf8_lossy(raw).split(',') {
        if !part.is_empty() && !ids.iter().any(|existing| existing == part) {
            ids.push(part.to_string());
        }
    }
    ids
}
