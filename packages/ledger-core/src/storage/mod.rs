//! Key-value persistence for session credentials and client preferences.
//!
//! Backends:
//! - [`MemoryStore`]: in-process only (tests, ephemeral sessions)
//! - [`FileStore`]: JSON file in the user's config directory
//! - `KeyringStore`: platform keychain (`keyring-storage` feature)
//!
//! Every backend hands out whole [`Preferences`] snapshots, so a reader never
//! observes a batch of [`Edit`]s half applied.
//!
//! The persistent backends can be shared with other processes. They check
//! the backing store again on every read and, while anyone is subscribed,
//! poll it in the background so changes made elsewhere are published too.

mod file;
#[cfg(feature = "keyring-storage")]
mod keyring;
mod memory;

pub use file::FileStore;
#[cfg(feature = "keyring-storage")]
pub use self::keyring::KeyringStore;
pub use memory::MemoryStore;

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::MissedTickBehavior;

/// Immutable view of every key held by a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences {
    entries: BTreeMap<String, String>,
}

impl Preferences {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply edits in order. Returns false when the content is unchanged.
    fn apply(&mut self, edits: &[Edit]) -> bool {
        let mut changed = false;
        for edit in edits {
            match edit {
                Edit::Set { key, value } => {
                    if self.get(key) != Some(value.as_str()) {
                        self.entries.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
                Edit::Remove { key } => {
                    changed |= self.entries.remove(key).is_some();
                }
            }
        }
        changed
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Preferences {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A single change inside an atomic [`KeyValueStore::edit`] batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Set { key: String, value: String },
    Remove { key: String },
}

impl Edit {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Edit::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Edit::Remove { key: key.into() }
    }
}

/// Persistence collaborator the session core is built on.
///
/// Implementations serialize `edit` calls (single writer) and publish the
/// result atomically: `snapshot` returns either the state before or after a
/// batch, never something in between.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a consistent view of every key.
    async fn snapshot(&self) -> Result<Preferences, StorageError>;

    /// Apply a batch of edits atomically.
    ///
    /// Subscribers are notified once per batch that changed the content.
    async fn edit(&self, edits: Vec<Edit>) -> Result<(), StorageError>;

    /// Change notifications. The value is a generation counter bumped after
    /// every batch that changed the content.
    fn subscribe(&self) -> watch::Receiver<u64>;

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.snapshot().await?.get(key).map(str::to_owned))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.edit(vec![Edit::set(key, value)]).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.edit(vec![Edit::remove(key)]).await
    }
}

/// Open the preference store for this device.
///
/// Uses the platform keyring when the `keyring-storage` feature is enabled,
/// otherwise a JSON file (`path` when given, the default location if not).
pub fn open_default(path: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    #[cfg(feature = "keyring-storage")]
    {
        let _ = path;
        Ok(Arc::new(KeyringStore::new()?))
    }

    #[cfg(not(feature = "keyring-storage"))]
    {
        let store = match path {
            Some(path) => FileStore::new(path),
            None => FileStore::open_default()?,
        };
        Ok(Arc::new(store))
    }
}

/// Human readable description of where preferences live
pub fn get_storage_info(path: Option<PathBuf>) -> String {
    #[cfg(all(feature = "keyring-storage", target_os = "windows"))]
    {
        let _ = path;
        "Windows Credential Manager".to_string()
    }
    #[cfg(all(feature = "keyring-storage", target_os = "macos"))]
    {
        let _ = path;
        "macOS Keychain".to_string()
    }
    #[cfg(all(
        feature = "keyring-storage",
        not(any(target_os = "windows", target_os = "macos"))
    ))]
    {
        let _ = path;
        "Linux Secret Service (GNOME Keyring/KWallet)".to_string()
    }
    #[cfg(not(feature = "keyring-storage"))]
    {
        let path = path
            .or_else(FileStore::default_path)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/ledger/preferences.json".to_string());
        format!("File-based storage: {}", path)
    }
}

/// Loaded snapshot plus writer lock and change notifier, shared by the
/// concrete backends.
///
/// Writers hold `writer` for the whole load-apply-persist sequence; readers
/// only touch `current`, so they keep seeing the previous snapshot while a
/// write is being persisted.
pub(crate) struct SnapshotCell {
    current: RwLock<Option<Preferences>>,
    writer: Mutex<()>,
    generation: watch::Sender<u64>,
}

impl SnapshotCell {
    /// Cell that loads its content lazily on first access
    pub(crate) fn unloaded() -> Self {
        Self::from_state(None)
    }

    pub(crate) fn loaded(prefs: Preferences) -> Self {
        Self::from_state(Some(prefs))
    }

    fn from_state(state: Option<Preferences>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            current: RwLock::new(state),
            writer: Mutex::new(()),
            generation,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub(crate) fn receiver_count(&self) -> usize {
        self.generation.receiver_count()
    }

    fn bump(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Cached snapshot, loaded on first access
    pub(crate) async fn read<L, F>(&self, load: L) -> Result<Preferences, StorageError>
    where
        L: FnOnce() -> F,
        F: Future<Output = Result<Preferences, StorageError>>,
    {
        if let Some(prefs) = self.current.read().await.as_ref() {
            return Ok(prefs.clone());
        }

        let mut slot = self.current.write().await;
        if let Some(prefs) = slot.as_ref() {
            return Ok(prefs.clone());
        }
        let prefs = load().await?;
        *slot = Some(prefs.clone());
        Ok(prefs)
    }

    /// Read the backing store again and publish its content.
    ///
    /// Subscribers are notified when the content differs from an earlier
    /// loaded snapshot. The first load of an unloaded cell is not a change.
    pub(crate) async fn reload<L, F>(&self, load: L) -> Result<Preferences, StorageError>
    where
        L: FnOnce() -> F,
        F: Future<Output = Result<Preferences, StorageError>>,
    {
        let _writer = self.writer.lock().await;
        let prefs = load().await?;

        let mut slot = self.current.write().await;
        let changed = slot.as_ref().is_some_and(|old| *old != prefs);
        *slot = Some(prefs.clone());
        drop(slot);

        if changed {
            tracing::debug!("Preferences changed outside this store");
            self.bump();
        }
        Ok(prefs)
    }

    pub(crate) async fn write<L, LF, P, PF>(
        &self,
        edits: &[Edit],
        load: L,
        persist: P,
    ) -> Result<(), StorageError>
    where
        L: FnOnce() -> LF,
        LF: Future<Output = Result<Preferences, StorageError>>,
        P: FnOnce(Preferences) -> PF,
        PF: Future<Output = Result<(), StorageError>>,
    {
        let _writer = self.writer.lock().await;

        let mut next = self.read(load).await?;
        if !next.apply(edits) {
            return Ok(());
        }

        persist(next.clone()).await?;
        *self.current.write().await = Some(next);
        self.bump();
        Ok(())
    }
}

/// A backend whose content can change underneath it
#[async_trait]
pub(crate) trait Revalidate: Send + Sync + 'static {
    fn cell(&self) -> &SnapshotCell;

    /// Set while a background poller runs for this backend
    fn polling(&self) -> &AtomicBool;

    /// Re-read the backing store if it may have changed
    async fn revalidate(&self) -> Result<(), StorageError>;
}

/// Make sure a background task revalidates `backing` every `every` while it
/// has subscribers. The task stops once the last receiver is gone or the
/// backend is dropped.
pub(crate) fn follow_external_changes<B: Revalidate>(backing: &Arc<B>, every: Duration) {
    if backing.polling().swap(true, Ordering::AcqRel) {
        return;
    }

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        backing.polling().store(false, Ordering::Release);
        tracing::debug!("No async runtime, outside changes are only seen on read");
        return;
    };

    let weak: Weak<B> = Arc::downgrade(backing);
    runtime.spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(backing) = weak.upgrade() else {
                break;
            };

            if backing.cell().receiver_count() == 0 {
                backing.polling().store(false, Ordering::Release);
                // A subscriber may have arrived between the check and the store
                if backing.cell().receiver_count() == 0
                    || backing.polling().swap(true, Ordering::AcqRel)
                {
                    break;
                }
            }

            if let Err(e) = backing.revalidate().await {
                tracing::debug!("Preference revalidation failed: {}", e);
            }
        }

        tracing::trace!("Preference poller stopped");
    });
}
