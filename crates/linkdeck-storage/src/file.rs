//! File-based storage implementation
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a temporary file that
//! is renamed over the target, so a crash mid-write leaves either the old
//! or the new value, never a torn one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::StorageError;
use crate::{KeyValueStore, StorageChange};

/// Persistent implementation of KeyValueStore
#[derive(Debug)]
pub struct FileKvStore {
    dir: PathBuf,
    changes: broadcast::Sender<StorageChange>,
    /// Whether to fsync before renaming (durability vs performance)
    sync_writes: bool,
}

impl FileKvStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_options(dir, true).await
    }

    pub async fn with_options(dir: impl AsRef<Path>, sync_writes: bool) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        debug!(path = ?dir, "Opened file store");

        let (changes, _) = broadcast::channel(256);
        Ok(Self {
            dir,
            changes,
            sync_writes,
        })
    }

    /// Directory holding the value files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StorageError::invalid_key(key));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(value.as_bytes()).await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        drop(file);
        fs::rename(&tmp, &path).await?;

        trace!(key, bytes = value.len(), "Wrote value file");
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            value: Some(value),
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                let _ = self.changes.send(StorageChange {
                    key: key.to_string(),
                    value: None,
                });
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
