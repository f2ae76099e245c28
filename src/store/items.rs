use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItem {
    pub id: i64,
    pub owner_id: i64,
    pub content: String,
    #[serde(default)]
    pub is_public: bool,
}

impl VaultItem {
    pub fn new(id: i64, owner_id: i64, content: impl Into<String>, is_public: bool) -> Self {
        Self {
            id,
            owner_id,
            content: content.into(),
            is_public,
        }
    }
}

// items present when the process starts
pub fn default_items() -> Vec<VaultItem> {
    vec![
        VaultItem::new(1, 1, "user1's private note", false),
        VaultItem::new(2, 2, "user2's secret recovery codes", false),
        VaultItem::new(3, 1, "Welcome to the vault!", true),
        VaultItem::new(4, 3, "admin deployment credentials", false),
    ]
}

/// In-memory item store shared across requests. Contents are lost on restart.
///
/// Each method takes the lock once; callers composing several calls get no
/// atomicity across them.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Arc<RwLock<Vec<VaultItem>>>,
}

impl ItemStore {
    pub fn new(seed: Vec<VaultItem>) -> Self {
        Self {
            items: Arc::new(RwLock::new(seed)),
        }
    }

    pub async fn all(&self) -> Vec<VaultItem> {
        self.items.read().await.clone()
    }

    // insertion order
    pub async fn filter<F>(&self, predicate: F) -> Vec<VaultItem>
    where
        F: Fn(&VaultItem) -> bool,
    {
        let items = self.items.read().await;
        items.iter().filter(|item| predicate(item)).cloned().collect()
    }

    pub async fn get(&self, id: i64) -> Option<VaultItem> {
        let items = self.items.read().await;
        items.iter().find(|item| item.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn append(&self, item: VaultItem) {
        let mut items = self.items.write().await;
        items.push(item);
    }

    // first match only; `None` leaves the store untouched
    pub async fn publish(&self, id: i64) -> Option<VaultItem> {
        let mut items = self.items.write().await;
        let item = items.iter_mut().find(|item| item.id == id)?;
        item.is_public = true;
        Some(item.clone())
    }
}
