//! JSON-file preference storage.
//!
//! The whole key space lives in one JSON object. Writes go to a sibling temp
//! file which is then renamed over the original, so a crash mid-write leaves
//! the previous content intact.
//!
//! Other processes may write the same file. Every read compares the file's
//! metadata with what was last loaded and reloads when it moved; subscribers
//! are served by a poller doing the same check in the background. There is
//! no cross-process lock, so two processes editing at the same instant can
//! still lose one of the two batches.

use super::{Edit, KeyValueStore, Preferences, Revalidate, SnapshotCell, follow_external_changes};
use crate::error::StorageError;
use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, watch};

const PREFERENCES_FILE: &str = "preferences.json";

/// How often subscribers' poller looks at the file
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Identity of one version of the file on disk.
///
/// The rename in `persist` always produces a new inode, so on unix a rewrite
/// is detected even when size and mtime happen to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
    #[cfg(unix)]
    inode: u64,
}

impl FileStamp {
    fn of(meta: &fs::Metadata) -> Self {
        #[cfg(unix)]
        use std::os::unix::fs::MetadataExt;

        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
            #[cfg(unix)]
            inode: meta.ino(),
        }
    }

    /// `None` when the file does not exist
    fn read(path: &Path) -> io::Result<Option<Self>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(Self::of(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Preferences persisted to a JSON file
pub struct FileStore {
    shared: Arc<Shared>,
    poll_interval: Duration,
}

struct Shared {
    path: PathBuf,
    cell: SnapshotCell,
    /// Stamp of the file content currently held by `cell`
    stamp: Mutex<Option<FileStamp>>,
    polling: AtomicBool,
}

impl FileStore {
    /// Store backed by `path`. Nothing is read until first access.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                cell: SnapshotCell::unloaded(),
                stamp: Mutex::new(None),
                polling: AtomicBool::new(false),
            }),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How often to look for outside changes while subscribed
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Store at the default location for this platform
    pub fn open_default() -> Result<Self, StorageError> {
        let path = Self::default_path().ok_or_else(|| {
            StorageError::Unavailable("failed to find config directory".to_string())
        })?;
        Ok(Self::new(path))
    }

    /// `<config_dir>/ledger/preferences.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .map(|p| p.join("ledger").join(PREFERENCES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

impl Shared {
    async fn load(&self) -> Result<Preferences, StorageError> {
        let path = self.path.clone();
        let (prefs, stamp) = tokio::task::spawn_blocking(move || load_file(&path)).await??;
        *self.stamp.lock().await = stamp;
        Ok(prefs)
    }

    async fn persist(&self, prefs: Preferences) -> Result<(), StorageError> {
        let path = self.path.clone();
        let stamp = tokio::task::spawn_blocking(move || persist_file(&path, &prefs)).await??;
        *self.stamp.lock().await = stamp;
        Ok(())
    }

    /// True when the file on disk is not the version held in memory
    async fn is_stale(&self) -> bool {
        let path = self.path.clone();
        let on_disk = match tokio::task::spawn_blocking(move || FileStamp::read(&path)).await {
            Ok(Ok(stamp)) => stamp,
            // Let the reload surface the error
            _ => return true,
        };
        *self.stamp.lock().await != on_disk
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
        if self.is_stale().await {
            self.cell.reload(|| self.load()).await?;
        }
        Ok(())
    }
}

fn load_file(path: &Path) -> Result<(Preferences, Option<FileStamp>), StorageError> {
    // Stamp first: a write racing with the read then shows up as stale later
    let stamp = FileStamp::read(path)
        .map_err(|e| StorageError::io("Failed to inspect preferences file", e))?;
    if stamp.is_none() {
        tracing::debug!("No preferences file at {:?}, starting empty", path);
        return Ok((Preferences::default(), None));
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok((Preferences::default(), None));
        }
        Err(e) => return Err(StorageError::io("Failed to read preferences file", e)),
    };
    let prefs: Preferences = serde_json::from_str(&content)
        .map_err(|e| StorageError::serialize("Failed to parse preferences file", e))?;

    tracing::debug!("Loaded {} preference keys from {:?}", prefs.len(), path);
    Ok((prefs, stamp))
}

fn persist_file(path: &Path, prefs: &Preferences) -> Result<Option<FileStamp>, StorageError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| StorageError::io("Failed to create config directory", e))?;
        }
    }

    let json = serde_json::to_string_pretty(prefs)
        .map_err(|e| StorageError::serialize("Failed to serialize preferences", e))?;

    let tmp_path = path.with_extension("json.tmp");
    write_private(&tmp_path, json.as_bytes())?;
    fs::rename(&tmp_path, path)
        .map_err(|e| StorageError::io("Failed to replace preferences file", e))?;

    tracing::debug!("Preferences saved to file: {:?}", path);
    FileStamp::read(path).map_err(|e| StorageError::io("Failed to inspect preferences file", e))
}

/// Write a file readable by the owner only
fn write_private(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| StorageError::io("Failed to create preferences file", e))?;
        let mut file = std::io::BufWriter::new(file);
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| StorageError::io("Failed to write preferences", e))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, bytes)
            .map_err(|e| StorageError::io("Failed to write preferences file", e))?;
    }

    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn snapshot(&self) -> Result<Preferences, StorageError> {
        let shared = &self.shared;
        if shared.is_stale().await {
            return shared.cell.reload(|| shared.load()).await;
        }
        shared.cell.read(|| shared.load()).await
    }

    async fn edit(&self, edits: Vec<Edit>) -> Result<(), StorageError> {
        let shared = &self.shared;
        // Apply on top of whatever another process wrote last
        shared.revalidate().await?;
        shared
            .cell
            .write(&edits, || shared.load(), |prefs| shared.persist(prefs))
            .await
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        let rx = self.shared.cell.subscribe();
        follow_external_changes(&self.shared, self.poll_interval);
        rx
    }
}
