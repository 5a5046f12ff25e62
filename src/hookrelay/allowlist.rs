use std::sync::Arc;

use log::{info, warn};

use crate::error::Result;
use crate::hookrelay::idset::IdSet;
use crate::hookrelay::store::KvStore;
use crate::hookrelay::types::{ChatId, ALLOWLIST_KEY};

/// Outcome of an allow-list edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowOutcome {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
    /// Caller is not the privileged identity, nothing changed
    Rejected,
}

/// Identities permitted to subscribe, edited only by the privileged identity
pub struct AllowList {
    inner: IdSet,
    admin_id: Option<ChatId>,
    enforce: bool,
}

impl AllowList {
    pub async fn load(store: Arc<dyn KvStore>, admin_id: Option<ChatId>, enforce: bool) -> Self {
        let inner = IdSet::load(store, ALLOWLIST_KEY).await;
        if enforce && admin_id.is_none() {
            warn!("Allow-list is enforced but no admin id is configured; it can only be edited in the store");
        }
        info!("Loaded {} allow-listed ids (enforced: {})", inner.len(), enforce);
        Self { inner, admin_id, enforce }
    }

    /// Whether a privileged identity is configured at all
    pub fn has_admin(&self) -> bool {
        self.admin_id.is_some()
    }

    pub fn is_privileged(&self, id: &str) -> bool {
        self.admin_id.as_deref() == Some(id)
    }

    pub fn is_allowed(&self, id: &str) -> bool {
        self.inner.contains(id)
    }

    /// Whether `id` may become a subscriber. The privileged identity always may.
    pub fn permits_subscription(&self, id: &str) -> bool {
        !self.enforce || self.is_privileged(id) || self.is_allowed(id)
    }

    pub async fn allow(&self, caller: &str, id: &str) -> Result<AllowOutcome> {
        if !self.is_privileged(caller) {
            warn!("Rejected allow-list edit by {}", caller);
            return Ok(AllowOutcome::Rejected);
        }
        if self.inner.insert(id).await? {
            info!("Allow-listed {}", id);
            Ok(AllowOutcome::Added)
        } else {
            Ok(AllowOutcome::AlreadyPresent)
        }
    }

    pub async fn disallow(&self, caller: &str, id: &str) -> Result<AllowOutcome> {
        if !self.is_privileged(caller) {
            warn!("Rejected allow-list edit by {}", caller);
            return Ok(AllowOutcome::Rejected);
        }
        if self.inner.remove(id).await? {
            info!("Removed {} from allow-list", id);
            Ok(AllowOutcome::Removed)
        } else {
            Ok(AllowOutcome::NotPresent)
        }
    }

    pub fn ids(&self) -> Vec<ChatId> {
        self.inner.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hookrelay::store::MemoryStore;

    async fn list(enforce: bool) -> AllowList {
        AllowList::load(Arc::new(MemoryStore::new()), Some("1".into()), enforce).await
    }

    #[tokio::test]
    async fn only_admin_can_edit() {
        let list = list(true).await;

        assert_eq!(list.allow("2", "3").await.unwrap(), AllowOutcome::Rejected);
        assert!(list.ids().is_empty());

        assert_eq!(list.allow("1", "3").await.unwrap(), AllowOutcome::Added);
        assert_eq!(list.allow("1", "3").await.unwrap(), AllowOutcome::AlreadyPresent);
        assert_eq!(list.disallow("3", "3").await.unwrap(), AllowOutcome::Rejected);
        assert!(list.is_allowed("3"));

        assert_eq!(list.disallow("1", "3").await.unwrap(), AllowOutcome::Removed);
        assert_eq!(list.disallow("1", "3").await.unwrap(), AllowOutcome::NotPresent);
    }

    #[tokio::test]
    async fn gating_only_applies_when_enforced() {
        let open = list(false).await;
        assert!(open.permits_subscription("9"));

        let gated = list(true).await;
        assert!(!gated.permits_subscription("9"));
        assert!(gated.permits_subscription("1"));
        gated.allow("1", "9").await.unwrap();
        assert!(gated.permits_subscription("9"));
    }

    #[tokio::test]
    async fn persists_under_auth_ids() {
        let store = Arc::new(MemoryStore::new());
        let list = AllowList::load(store.clone(), Some("1".into()), true).await;
        list.allow("1", "5").await.unwrap();

        assert_eq!(store.get(ALLOWLIST_KEY).await.unwrap().as_deref(), Some(&b"5"[..]));
    }
}
