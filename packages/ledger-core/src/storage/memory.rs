use super::{Edit, KeyValueStore, Preferences, SnapshotCell};
use crate::error::StorageError;
use async_trait::async_trait;
use tokio::sync::watch;

/// Preferences held in process memory only
pub struct MemoryStore {
    cell: SnapshotCell,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_preferences(Preferences::default())
    }

    /// Start from existing content, e.g. a fixture in tests
    pub fn with_preferences(prefs: Preferences) -> Self {
        Self {
            cell: SnapshotCell::loaded(prefs),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn snapshot(&self) -> Result<Preferences, StorageError> {
        self.cell.read(|| async { Ok(Preferences::default()) }).await
    }

    async fn edit(&self, edits: Vec<Edit>) -> Result<(), StorageError> {
        self.cell
            .write(&edits, || async { Ok(Preferences::default()) }, |_| async { Ok(()) })
            .await
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.cell.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("token").await.unwrap(), None);

        store.set("token", "abc").await.unwrap();
        assert_eq!(store.get("token").await.unwrap().as_deref(), Some("abc"));

        store.remove("token").await.unwrap();
        assert_eq!(store.get("token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscribers_notified_only_on_change() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set("k", "v").await.unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.set("k", "v").await.unwrap();
        store.remove("other").await.unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_batch_is_visible_as_a_whole() {
        let store = std::sync::Arc::new(MemoryStore::new());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let v = i.to_string();
                    store
                        .edit(vec![Edit::set("a", v.clone()), Edit::set("b", v)])
                        .await
                        .unwrap();
                }
            })
        };

        for _ in 0..200 {
            let prefs = store.snapshot().await.unwrap();
            assert_eq!(prefs.get("a"), prefs.get("b"));
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }
}
