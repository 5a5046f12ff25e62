use std::sync::Arc;

use log::{debug, info};

use crate::error::Result;
use crate::hookrelay::idset::IdSet;
use crate::hookrelay::store::KvStore;
use crate::hookrelay::types::{ChatId, SUBSCRIBERS_KEY};

/// Durable set of chats receiving fan-out
pub struct SubscriptionManager {
    inner: IdSet,
}

impl SubscriptionManager {
    pub async fn load(store: Arc<dyn KvStore>) -> Self {
        let inner = IdSet::load(store, SUBSCRIBERS_KEY).await;
        info!("Loaded {} subscribers", inner.len());
        Self { inner }
    }

    pub fn is_subscribed(&self, chat_id: &str) -> bool {
        self.inner.contains(chat_id)
    }

    /// Adds a subscription. Returns `false` if it already existed.
    pub async fn subscribe(&self, chat_id: &str) -> Result<bool> {
        debug!("Adding subscription for chat {}", chat_id);
        let added = self.inner.insert(chat_id).await?;
        if added {
            info!("New subscriber: {}", chat_id);
        }
        Ok(added)
    }

    /// Removes a subscription. Returns `false` if there was none.
    pub async fn unsubscribe(&self, chat_id: &str) -> Result<bool> {
        debug!("Removing subscription for chat {}", chat_id);
        let removed = self.inner.remove(chat_id).await?;
        if removed {
            info!("Removed subscriber: {}", chat_id);
        }
        Ok(removed)
    }

    /// Snapshot used by a single fan-out pass
    pub fn subscribers(&self) -> Vec<ChatId> {
        self.inner.snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
