//! Platform keyring preference storage.
//!
//! The serialized preference map is held as the secret of a single keyring
//! entry. Windows: Credential Manager, macOS: Keychain, Linux: Secret Service.

use super::{Edit, KeyValueStore, Preferences, Revalidate, SnapshotCell, follow_external_changes};
use crate::error::StorageError;
use async_trait::async_trait;
use keyring::Entry;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::sync::watch;

/// Service name used for keyring storage
const KEYRING_SERVICE: &str = "ledger-client";
/// Username used for keyring entry
const KEYRING_USER: &str = "preferences";

/// The keyring has no cheap change marker, so subscribers poll less often
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Preferences persisted in the platform keyring
pub struct KeyringStore {
    shared: Arc<Shared>,
}

struct Shared {
    entry: Arc<Entry>,
    cell: SnapshotCell,
    polling: AtomicBool,
}

impl KeyringStore {
    pub fn new() -> Result<Self, StorageError> {
        tracing::trace!(
            "Creating keyring entry for service='{}', user='{}'",
            KEYRING_SERVICE,
            KEYRING_USER
        );

        let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(|e| {
            tracing::error!(
                "Failed to create keyring entry (service='{}', user='{}'): {}",
                KEYRING_SERVICE,
                KEYRING_USER,
                e
            );
            StorageError::Keyring(e)
        })?;

        Ok(Self {
            shared: Arc::new(Shared {
                entry: Arc::new(entry),
                cell: SnapshotCell::unloaded(),
                polling: AtomicBool::new(false),
            }),
        })
    }
}

impl Shared {
    async fn load(&self) -> Result<Preferences, StorageError> {
        let entry = Arc::clone(&self.entry);
        tokio::task::spawn_blocking(move || load_entry(&entry)).await?
    }

    async fn persist(&self, prefs: Preferences) -> Result<(), StorageError> {
        let entry = Arc::clone(&self.entry);
        tokio::task::spawn_blocking(move || persist_entry(&entry, &prefs)).await?
    }
}

#[async_trait]
impl Revalidate for Shared {
    fn cell(&self) -> &SnapshotCell {
        &self.cell
    }

    fn polling(&self) -> &AtomicBool {
        &self.polling
    }

    async fn revalidate(&self) -> Result<(), StorageError> {
        self.cell.reload(|| self.load()).await.map(|_| ())
    }
}

fn load_entry(entry: &Entry) -> Result<Preferences, StorageError> {
    match entry.get_password() {
        Ok(json) => {
            tracing::debug!("Preferences loaded from keyring");
            serde_json::from_str(&json)
                .map_err(|e| StorageError::serialize("Failed to parse preferences from keyring", e))
        }
        Err(keyring::Error::NoEntry) => {
            tracing::debug!("No preferences in keyring, starting empty");
            Ok(Preferences::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn persist_entry(entry: &Entry, prefs: &Preferences) -> Result<(), StorageError> {
    if prefs.is_empty() {
        return match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        };
    }

    let json = serde_json::to_string(prefs)
        .map_err(|e| StorageError::serialize("Failed to serialize preferences", e))?;
    entry.set_password(&json)?;
    tracing::debug!("Preferences saved to keyring");
    Ok(())
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    // Always read through: another process may have changed the entry
    async fn snapshot(&self) -> Result<Preferences, StorageError> {
        let shared = &self.shared;
        shared.cell.reload(|| shared.load()).await
    }

    async fn edit(&self, edits: Vec<Edit>) -> Result<(), StorageError> {
        let shared = &self.shared;
        shared.revalidate().await?;
        shared
            .cell
            .write(&edits, || shared.load(), |prefs| shared.persist(prefs))
            .await
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        let rx = self.shared.cell.subscribe();
        follow_external_changes(&self.shared, POLL_INTERVAL);
        rx
    }
}
