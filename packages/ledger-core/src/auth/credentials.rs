//! Session credential storage on top of a [`KeyValueStore`].
//!
//! The token and its type are kept under two keys that are always written and
//! removed in a single atomic edit, so readers see either the old pair or the
//! new pair.

use crate::error::StorageError;
use crate::storage::{Edit, KeyValueStore, Preferences};
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Preference key holding the access token
pub const TOKEN_KEY: &str = "access_token";
/// Preference key holding the token type reported by the auth endpoint
pub const TOKEN_TYPE_KEY: &str = "token_type";

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// The token pair representing an authenticated session
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub token_type: String,
}

impl Credential {
    pub fn new(token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: token_type.into(),
        }
    }

    /// Read the pair out of a snapshot. An empty token means no session.
    fn from_preferences(prefs: &Preferences) -> Option<Self> {
        let token = prefs.get(TOKEN_KEY).filter(|t| !t.is_empty())?;
        let token_type = prefs
            .get(TOKEN_TYPE_KEY)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TOKEN_TYPE);
        Some(Self::new(token, token_type))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Stream of credential values, see [`CredentialStore::observe`]
pub type CredentialStream = BoxStream<'static, Result<Option<Credential>, StorageError>>;

/// Owner of the active session credential for one device context.
///
/// Cheap to clone; clones share the same backend and write lock.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    writer: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying preference store
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Observe the credential.
    ///
    /// The stream yields the current value when first polled and again after
    /// every change to the backing store. Each call returns an independent
    /// stream; nothing is shared between observers.
    pub fn observe(&self) -> CredentialStream {
        let backend = Arc::clone(&self.backend);
        let changes = backend.subscribe();

        stream::unfold(
            (backend, changes, true),
            |(backend, mut changes, first)| async move {
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                // Mark this generation seen before reading so a write racing
                // with the read triggers one more emission.
                changes.borrow_and_update();

                let item = backend
                    .snapshot()
                    .await
                    .map(|prefs| Credential::from_preferences(&prefs));
                Some((item, (backend, changes, false)))
            },
        )
        .boxed()
    }

    /// The credential as the first value of a fresh [`observe`](Self::observe)
    /// stream.
    pub async fn current(&self) -> Result<Option<Credential>, StorageError> {
        match self.observe().next().await {
            Some(item) => item,
            None => Ok(None),
        }
    }

    /// Replace any stored credential with this pair.
    pub async fn save(&self, token: &str, token_type: &str) -> Result<(), StorageError> {
        let _writer = self.writer.lock().await;
        self.backend
            .edit(vec![
                Edit::set(TOKEN_KEY, token),
                Edit::set(TOKEN_TYPE_KEY, token_type),
            ])
            .await?;
        tracing::debug!("Credential saved (type: {})", token_type);
        Ok(())
    }

    /// Remove the stored credential. Clearing an empty store is a no-op.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _writer = self.writer.lock().await;
        self.backend
            .edit(vec![Edit::remove(TOKEN_KEY), Edit::remove(TOKEN_TYPE_KEY)])
            .await?;
        tracing::debug!("Credential cleared");
        Ok(())
    }
}
